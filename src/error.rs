use thiserror::Error;

/// Errors produced while capturing pages and writing artifacts
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to WebDriver at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("could not decode base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("unexpected WebDriver response: {0}")]
    Protocol(String),

    #[error("no images could be loaded")]
    NoImages,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn url(url: &str, source: url::ParseError) -> Self {
        Self::Url {
            url: url.to_string(),
            source,
        }
    }
}
