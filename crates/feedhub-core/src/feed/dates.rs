use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

enum Layout {
    /// Format with a numeric offset
    Offset(&'static str),
    /// RFC 2822 with numeric offset or named zone (GMT, UT, EST, ...)
    Rfc2822,
    Rfc3339,
    /// Format whose zone abbreviation is skipped and read as UTC
    Naive(&'static str),
}

/// Publication date layouts seen in the wild, tried in order.
const PUB_DATE_LAYOUTS: &[(&str, Layout)] = &[
    ("RFC1123Z", Layout::Offset("%a, %d %b %Y %H:%M:%S %z")),
    ("RFC1123", Layout::Rfc2822),
    ("RFC1123", Layout::Naive("%a, %d %b %Y %H:%M:%S %Z")),
    ("RFC3339", Layout::Rfc3339),
    ("RFC822", Layout::Naive("%d %b %y %H:%M %Z")),
    ("RFC822Z", Layout::Offset("%d %b %y %H:%M %z")),
    ("RFC850", Layout::Naive("%A, %d-%b-%y %H:%M:%S %Z")),
    ("ANSIC", Layout::Naive("%a %b %e %H:%M:%S %Y")),
    ("UnixDate", Layout::Naive("%a %b %e %H:%M:%S %Z %Y")),
    ("RubyDate", Layout::Offset("%a %b %d %H:%M:%S %z %Y")),
];

impl Layout {
    fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Offset(fmt) => DateTime::parse_from_str(raw, fmt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc2822 => DateTime::parse_from_rfc2822(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Naive(fmt) => NaiveDateTime::parse_from_str(raw, fmt)
                .ok()
                .map(|naive| naive.and_utc()),
        }
    }
}

/// Parse a feed publication date, returning the first layout that matches
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();

    PUB_DATE_LAYOUTS
        .iter()
        .find_map(|(name, layout)| {
            let parsed = layout.parse(trimmed)?;
            tracing::trace!(layout = name, raw = trimmed, "Parsed publication date");
            Some(parsed)
        })
        .ok_or_else(|| Error::DateParse(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_rfc1123_with_offset() {
        let parsed = parse_pub_date("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
        assert_eq!(parsed, utc(2006, 1, 2, 22, 4, 5));
    }

    #[test]
    fn test_rfc1123_with_named_zone() {
        let parsed = parse_pub_date("Mon, 02 Jan 2006 15:04:05 GMT").unwrap();
        assert_eq!(parsed, utc(2006, 1, 2, 15, 4, 5));
    }

    #[test]
    fn test_rfc1123_with_unknown_zone_reads_as_utc() {
        for raw in [
            "Mon, 02 Jan 2006 15:04:05 CEST",
            "Mon, 02 Jan 2006 15:04:05 MSK",
        ] {
            assert_eq!(parse_pub_date(raw).unwrap(), utc(2006, 1, 2, 15, 4, 5), "{raw}");
        }
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            parse_pub_date("2006-01-02T15:04:05Z").unwrap(),
            utc(2006, 1, 2, 15, 4, 5)
        );
        assert_eq!(
            parse_pub_date("2006-01-02T15:04:05+02:00").unwrap(),
            utc(2006, 1, 2, 13, 4, 5)
        );
    }

    #[test]
    fn test_ruby_date() {
        let parsed = parse_pub_date("Mon Jan 02 15:04:05 -0700 2006").unwrap();
        assert_eq!(parsed, utc(2006, 1, 2, 22, 4, 5));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let parsed = parse_pub_date("\n   Mon, 02 Jan 2006 15:04:05 +0000  ").unwrap();
        assert_eq!(parsed, utc(2006, 1, 2, 15, 4, 5));
    }

    #[test]
    fn test_unknown_format_fails() {
        for raw in ["", "yesterday", "2006/01/02", "32 Foo 2006"] {
            assert!(
                matches!(parse_pub_date(raw), Err(Error::DateParse(_))),
                "expected {raw:?} to fail"
            );
        }
    }
}
