use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediaCrawlerError>;

#[derive(Debug, Error)]
pub enum MediaCrawlerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("MediaCrawler request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode MediaCrawler response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid MediaCrawler URL: {0}")]
    InvalidUrl(String),
}
