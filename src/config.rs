use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use url::Url;

/// What to capture from every loaded page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Take a PNG screenshot of the page
    pub screenshot: bool,

    /// Print the page to PDF through the browser
    pub pdf: bool,

    /// Scroll through the whole document before capturing so lazy content loads
    pub scan_full_page: bool,

    /// Wait until every `<img>` has finished loading
    pub wait_for_images: bool,

    /// Maximum time for navigation to complete
    pub page_load_timeout_ms: u64,

    /// Maximum time spent waiting for images
    pub wait_for_images_timeout_ms: u64,

    /// Pause between scroll steps while scanning
    pub scroll_delay_ms: u64,

    /// Browser viewport width
    pub window_width: u32,

    /// Browser viewport height
    pub window_height: u32,

    /// Upper bound for the full-page screenshot height
    pub max_screenshot_height: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            screenshot: true,
            pdf: true,
            scan_full_page: true,
            wait_for_images: true,
            page_load_timeout_ms: 30_000,
            wait_for_images_timeout_ms: 15_000,
            scroll_delay_ms: 200,
            window_width: 1280,
            window_height: 800,
            max_screenshot_height: 16_384,
        }
    }
}

/// Breadth-first deep crawl settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepCrawlConfig {
    /// Number of link hops followed from the seed page
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Whether links to other hosts are followed
    #[serde(default)]
    pub include_external: bool,

    /// Stop after this many pages have been fetched
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Regex patterns for URLs to include
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for DeepCrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            include_external: false,
            max_pages: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Top level crawler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Number of browser sessions used in parallel
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Folder the artifacts are written to
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Run the browser without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default)]
    pub capture: CaptureOptions,

    #[serde(default)]
    pub deep: DeepCrawlConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            max_concurrency: default_max_concurrency(),
            output_dir: None,
            headless: default_headless(),
            capture: CaptureOptions::default(),
            deep: DeepCrawlConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Override the WebDriver URL with `WEBDRIVER_URL` if it is set
    pub fn apply_env(&mut self) {
        self.override_webdriver_url(std::env::var("WEBDRIVER_URL").ok());
    }

    /// Replace the WebDriver URL unless the override is missing or empty
    fn override_webdriver_url(&mut self, webdriver_url: Option<String>) {
        if let Some(webdriver_url) = webdriver_url.filter(|u| !u.is_empty()) {
            self.webdriver_url = webdriver_url;
        }
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Url::parse(&self.webdriver_url).map_err(|e| Error::url(&self.webdriver_url, e))?;
        Ok(())
    }

    /// Output folder, falling back to `default` under the current directory
    pub fn output_dir_or(&self, default: &str) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?.join(default)),
        }
    }
}

/// Parse a start URL, accepting only absolute http(s) URLs
pub fn parse_start_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| Error::url(url, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::Config(format!(
            "unsupported scheme '{}' in start URL {}",
            other, url
        ))),
    }
}

fn default_max_depth() -> usize {
    2
}

fn default_max_concurrency() -> usize {
    4
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = CrawlerConfig::from_json(r#"{"max_concurrency": 2}"#).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert_eq!(config.deep.max_depth, 2);
        assert!(!config.deep.include_external);
        assert!(config.capture.screenshot);
        assert!(config.capture.pdf);
        assert!(config.headless);
    }

    #[test]
    fn test_partial_capture_section() {
        let config =
            CrawlerConfig::from_json(r#"{"capture": {"pdf": false, "scroll_delay_ms": 50}}"#)
                .unwrap();
        assert!(!config.capture.pdf);
        assert!(config.capture.screenshot);
        assert_eq!(config.capture.scroll_delay_ms, 50);
        assert_eq!(config.capture.page_load_timeout_ms, 30_000);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"deep": {"max_depth": 1, "include_external": true, "max_pages": 10}}"#,
        )
        .unwrap();

        let config = CrawlerConfig::from_file(&path).unwrap();
        assert_eq!(config.deep.max_depth, 1);
        assert!(config.deep.include_external);
        assert_eq!(config.deep.max_pages, Some(10));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = CrawlerConfig {
            max_concurrency: 0,
            ..CrawlerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(CrawlerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_webdriver_url() {
        let config = CrawlerConfig {
            webdriver_url: "not a url".to_string(),
            ..CrawlerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Url { .. })));
    }

    #[test]
    fn test_webdriver_url_override() {
        let mut config = CrawlerConfig::default();
        config.override_webdriver_url(None);
        assert_eq!(config.webdriver_url, "http://localhost:4444");

        config.override_webdriver_url(Some(String::new()));
        assert_eq!(config.webdriver_url, "http://localhost:4444");

        config.override_webdriver_url(Some("http://grid.test:4444/wd/hub".to_string()));
        assert_eq!(config.webdriver_url, "http://grid.test:4444/wd/hub");
    }

    #[test]
    fn test_parse_start_url() {
        assert!(parse_start_url("https://example.com/").is_ok());
        assert!(matches!(
            parse_start_url("ftp://example.com/"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_start_url("not a url"),
            Err(Error::Url { .. })
        ));
    }
}
