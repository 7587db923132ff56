use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Everything captured from a single page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// URL of the page
    pub url: String,

    /// Where the browser ended up after redirects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    /// Link hops from the seed page (0 for the seed)
    pub depth: usize,

    /// HTTP status of the main document, when the browser exposes it
    pub status_code: Option<u16>,

    /// Title of the page (if available)
    pub title: Option<String>,

    /// Rendered page source
    pub html: Option<String>,

    /// Markdown derived from the page source
    pub markdown: Option<String>,

    /// Absolute links discovered on the page
    pub links: Vec<String>,

    /// PNG screenshot bytes
    #[serde(
        default,
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub screenshot: Option<Vec<u8>>,

    /// Printed PDF bytes
    #[serde(skip)]
    pub pdf: Option<Vec<u8>>,

    /// Why the page could not be captured
    pub error: Option<String>,
}

impl CrawlResult {
    /// Create an empty result for a URL at a depth
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
            ..Self::default()
        }
    }

    /// Create a result recording a capture failure
    pub fn failed(url: impl Into<String>, depth: usize, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(url, depth)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The landed URL, or the requested one when no redirect was recorded
    pub fn effective_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }
}

fn serialize_base64<S: Serializer>(
    bytes: &Option<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_base64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<u8>>, D::Error> {
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    encoded
        .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
        .transpose()
}
