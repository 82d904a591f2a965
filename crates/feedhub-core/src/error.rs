use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for URL: {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Could not parse date: {0}")]
    DateParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid interval {0:?}: expected <integer><s|m|h|d>")]
    InvalidInterval(String),

    #[error("Invalid worker count {0}: must be at least 1")]
    InvalidWorkerCount(i64),

    #[error("Invalid limit {0}: must not be negative")]
    InvalidLimit(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Feed already exists: {0}")]
    FeedExists(String),

    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("{0} is not running")]
    NotRunning(String),
}

pub type Result<T> = std::result::Result<T, Error>;
