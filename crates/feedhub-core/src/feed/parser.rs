use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::models::{FeedItem, ParsedFeed};
use crate::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Description,
    PubDate,
    DcDate,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" => Some(Field::Description),
            b"pubDate" => Some(Field::PubDate),
            b"dc:date" => Some(Field::DcDate),
            _ => None,
        }
    }
}

/// Parse feed content into structured data.
///
/// RSS 2.0 is read directly so that each item's `pubDate` survives verbatim
/// for [`super::parse_pub_date`]. Anything else (Atom, RSS 1.0, JSON Feed) goes
/// through feed-rs, with dates rendered as RFC 3339.
pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed> {
    match parse_rss2(content)? {
        Some(feed) => Ok(feed),
        None => parse_other(content),
    }
}

/// Returns `Ok(None)` when the document root is not `<rss>`
fn parse_rss2(content: &[u8]) -> Result<Option<ParsedFeed>> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut feed = ParsedFeed::default();
    let mut seen_root = false;
    let mut seen_channel = false;
    let mut item: Option<FeedItem> = None;
    let mut field: Option<(Field, usize)> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::FeedParse(format!("Failed to parse RSS XML: {}", e)))?;

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();

                if stack.is_empty() {
                    if name != b"rss" {
                        return Ok(None);
                    }
                    seen_root = true;
                }

                let parent = stack.last().map(Vec::as_slice);
                match (parent, name.as_slice()) {
                    (Some(b"rss"), b"channel") => seen_channel = true,
                    (Some(b"channel"), b"item") => item = Some(FeedItem::default()),
                    (Some(b"channel"), _) | (Some(b"item"), _) if field.is_none() => {
                        if let Some(f) = Field::from_name(&name) {
                            field = Some((f, stack.len() + 1));
                            text.clear();
                        }
                    }
                    _ => {}
                }

                stack.push(name);
            }
            Event::Empty(_) if stack.is_empty() => return Ok(None),
            Event::Text(e) => {
                if field.is_some() {
                    let chunk = e
                        .unescape()
                        .map(|s| s.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    text.push_str(&chunk);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                let depth = stack.len();

                if let Some((f, field_depth)) = field {
                    if field_depth == depth {
                        let value = text.trim().to_string();
                        match item.as_mut() {
                            Some(current) => assign_item_field(current, f, value),
                            None => assign_channel_field(&mut feed, f, value),
                        }
                        field = None;
                        text.clear();
                    }
                }

                if e.name().as_ref() == b"item" {
                    if let Some(finished) = item.take() {
                        feed.items.push(finished);
                    }
                }

                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    if !seen_root {
        return Ok(None);
    }

    if !seen_channel {
        return Err(Error::FeedParse("RSS document has no <channel>".to_string()));
    }

    Ok(Some(feed))
}

fn assign_item_field(item: &mut FeedItem, field: Field, value: String) {
    match field {
        Field::Title => item.title = value,
        Field::Link => item.link = value,
        Field::Description => item.description = value,
        Field::PubDate => item.pub_date = Some(value),
        Field::DcDate => {
            if item.pub_date.is_none() {
                item.pub_date = Some(value);
            }
        }
    }
}

fn assign_channel_field(feed: &mut ParsedFeed, field: Field, value: String) {
    match field {
        Field::Title => feed.title = value,
        Field::Link => feed.link = value,
        Field::Description => feed.description = value,
        Field::PubDate | Field::DcDate => {}
    }
}

fn parse_other(content: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| FeedItem {
            title: entry.title.map(|t| t.content).unwrap_or_default(),
            link: entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            description: entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default(),
            pub_date: entry.published.or(entry.updated).map(|dt| dt.to_rfc3339()),
        })
        .collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        link: feed
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        description: feed.description.map(|d| d.content).unwrap_or_default(),
        items,
    })
}
