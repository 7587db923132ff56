//! WebDriver-backed page capture.
//!
//! A [`WebDriverSession`] wraps one fantoccini client and knows how to turn a
//! URL into a [`CrawlResult`]. A [`SessionPool`] shares several sessions
//! between concurrent crawl tasks.

use crate::config::{CaptureOptions, CrawlerConfig};
use crate::error::{Error, Result};
use crate::parsers;
use crate::results::CrawlResult;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fantoccini::wd::{TimeoutConfiguration, WebDriverCompatibleCommand};
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{sleep, timeout};
use url::Url;

/// Alternative endpoints tried when the configured WebDriver is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 3] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // geckodriver / Selenium default
    "http://127.0.0.1:4444",
];

/// Stop scanning documents that keep growing (infinite scroll)
const MAX_SCROLL_STEPS: usize = 200;

const IMAGE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Slack on top of the browser's own page-load timeout before giving up locally
const NAVIGATION_GRACE: Duration = Duration::from_secs(5);

const STATUS_SCRIPT: &str = r#"
    const nav = performance.getEntriesByType('navigation')[0];
    return nav && nav.responseStatus ? nav.responseStatus : null;
"#;

const DIMENSIONS_SCRIPT: &str = r#"
    return [
        Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0),
        window.innerHeight
    ];
"#;

const IMAGES_COMPLETE_SCRIPT: &str =
    "return Array.from(document.images).every(img => img.complete);";

/// Anything that can load a URL and capture it
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, depth: usize, options: &CaptureOptions)
    -> Result<CrawlResult>;
}

/// WebDriver `print` command, returning a base64 encoded PDF
#[derive(Debug, Clone)]
struct PrintPage {
    background: bool,
}

impl WebDriverCompatibleCommand for PrintPage {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> std::result::Result<url::Url, url::ParseError> {
        base_url.join(&format!("session/{}/print", session_id.unwrap_or_default()))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        let body = json!({ "background": self.background, "shrinkToFit": true });
        (http::Method::POST, Some(body.to_string()))
    }
}

/// A single browser session
#[derive(Debug, Clone)]
pub struct WebDriverSession {
    client: Client,
}

impl WebDriverSession {
    /// Connect to the WebDriver server, trying common fallback URLs on failure
    pub async fn connect(config: &CrawlerConfig) -> Result<Self> {
        let caps = capabilities(config);

        match connect_once(&config.webdriver_url, caps.clone()).await {
            Ok(client) => return Self::configure(client, config).await,
            Err(reason) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    config.webdriver_url,
                    reason
                );
            }
        }

        for url in FALLBACK_WEBDRIVER_URLS
            .iter()
            .filter(|u| **u != config.webdriver_url)
        {
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = connect_once(url, caps.clone()).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Self::configure(client, config).await;
            }
        }

        Err(Error::Connect {
            url: config.webdriver_url.clone(),
            reason: "no WebDriver server reachable; start one or set WEBDRIVER_URL".to_string(),
        })
    }

    /// Make the browser itself enforce the page-load timeout
    async fn configure(client: Client, config: &CrawlerConfig) -> Result<Self> {
        client.update_timeouts(session_timeouts(&config.capture)).await?;
        Ok(Self { client })
    }

    /// Load a URL and capture it according to `options`
    pub async fn capture(
        &self,
        url: &Url,
        depth: usize,
        options: &CaptureOptions,
    ) -> Result<CrawlResult> {
        let started = Instant::now();
        ::log::debug!("Capturing: {}", url);

        timeout(navigation_deadline(options), self.client.goto(url.as_str()))
        .await
        .map_err(|_| Error::Timeout(options.page_load_timeout_ms))??;

        // Links resolve against where the browser landed, not what was requested
        let landed = self.client.current_url().await?;
        if landed.as_str() != url.as_str() {
            ::log::info!("{} redirected to {}", url, landed);
        }

        let mut result = CrawlResult::new(url.as_str(), depth);
        result.final_url = Some(landed.to_string());
        result.status_code = self.status_code().await;

        if options.scan_full_page {
            self.scan_full_page(options).await?;
        }

        if options.wait_for_images {
            self.wait_for_images(options).await?;
        }

        let html = self.client.source().await?;
        let parsed = parsers::parse(&html, &landed);
        result.title = parsed.title;
        result.links = parsed.links;
        result.markdown = Some(parsed.markdown).filter(|m| !m.trim().is_empty());
        result.html = Some(html).filter(|h| !h.is_empty());

        if options.screenshot {
            result.screenshot = match self.screenshot(options).await {
                Ok(png) => Some(png),
                Err(e) => {
                    ::log::warn!("Screenshot failed for {}: {}", url, e);
                    None
                }
            };
        }

        if options.pdf {
            result.pdf = match self.print_pdf().await {
                Ok(pdf) => Some(pdf),
                Err(e) => {
                    ::log::warn!("PDF printing failed for {}: {}", url, e);
                    None
                }
            };
        }

        ::log::debug!(
            "Captured {} in {:.2} seconds",
            url,
            started.elapsed().as_secs_f64()
        );
        Ok(result)
    }

    /// End the browser session
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }

    async fn status_code(&self) -> Option<u16> {
        match self.client.execute(STATUS_SCRIPT, vec![]).await {
            Ok(value) => value.as_u64().and_then(|v| u16::try_from(v).ok()),
            Err(e) => {
                ::log::debug!("Status code unavailable: {}", e);
                None
            }
        }
    }

    async fn dimensions(&self) -> Result<(u64, u64)> {
        let value = self.client.execute(DIMENSIONS_SCRIPT, vec![]).await?;
        let height = value.get(0).and_then(Value::as_u64);
        let viewport = value.get(1).and_then(Value::as_u64);
        match (height, viewport) {
            (Some(h), Some(v)) => Ok((h, v.max(1))),
            _ => Err(Error::Protocol(format!("bad document dimensions: {}", value))),
        }
    }

    /// Scroll to the bottom step by step so lazily loaded content appears
    async fn scan_full_page(&self, options: &CaptureOptions) -> Result<()> {
        let delay = Duration::from_millis(options.scroll_delay_ms);
        let mut offset = 0;

        for _ in 0..MAX_SCROLL_STEPS {
            let (height, viewport) = self.dimensions().await?;
            if offset >= height {
                break;
            }
            offset += viewport;
            self.client
                .execute("window.scrollTo(0, arguments[0]);", vec![json!(offset)])
                .await?;
            sleep(delay).await;
        }

        self.client.execute("window.scrollTo(0, 0);", vec![]).await?;
        Ok(())
    }

    async fn wait_for_images(&self, options: &CaptureOptions) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(options.wait_for_images_timeout_ms);
        loop {
            let complete = self
                .client
                .execute(IMAGES_COMPLETE_SCRIPT, vec![])
                .await?
                .as_bool()
                .unwrap_or(true);
            if complete {
                return Ok(());
            }
            if Instant::now() >= deadline {
                ::log::warn!(
                    "Images still loading after {} ms, capturing anyway",
                    options.wait_for_images_timeout_ms
                );
                return Ok(());
            }
            sleep(IMAGE_POLL_INTERVAL).await;
        }
    }

    /// Full page screenshot: grow the window to the document height, then restore it
    async fn screenshot(&self, options: &CaptureOptions) -> Result<Vec<u8>> {
        if !options.scan_full_page {
            return Ok(self.client.screenshot().await?);
        }

        let (height, _) = self.dimensions().await?;
        let target = u32::try_from(height)
            .unwrap_or(u32::MAX)
            .min(options.max_screenshot_height)
            .max(options.window_height);

        self.client
            .set_window_size(options.window_width, target)
            .await?;
        sleep(Duration::from_millis(options.scroll_delay_ms)).await;
        let png = self.client.screenshot().await;
        self.client
            .set_window_size(options.window_width, options.window_height)
            .await?;

        Ok(png?)
    }

    async fn print_pdf(&self) -> Result<Vec<u8>> {
        let value = self.client.issue_cmd(PrintPage { background: true }).await?;
        let encoded = value
            .as_str()
            .or_else(|| value.get("value").and_then(Value::as_str))
            .ok_or_else(|| Error::Protocol("print did not return base64 data".to_string()))?;
        Ok(STANDARD.decode(encoded)?)
    }
}

#[async_trait]
impl PageFetcher for WebDriverSession {
    async fn fetch(
        &self,
        url: &Url,
        depth: usize,
        options: &CaptureOptions,
    ) -> Result<CrawlResult> {
        self.capture(url, depth, options).await
    }
}

/// A fixed set of sessions shared between concurrent fetches.
///
/// Idle sessions wait in a channel; a fetch receives one, uses it and sends it
/// back, so no session ever serves two pages at once.
#[derive(Debug)]
pub struct SessionPool<S = WebDriverSession> {
    idle_tx: mpsc::Sender<S>,
    idle_rx: Mutex<mpsc::Receiver<S>>,
    size: usize,
}

impl SessionPool<WebDriverSession> {
    /// Open up to `config.max_concurrency` sessions; at least one must succeed
    pub async fn connect(config: &CrawlerConfig) -> Result<Self> {
        let first = WebDriverSession::connect(config).await?;
        let mut sessions = vec![first];

        for i in 1..config.max_concurrency {
            match WebDriverSession::connect(config).await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    ::log::warn!(
                        "Could only open {} of {} browser sessions: {}",
                        i,
                        config.max_concurrency,
                        e
                    );
                    break;
                }
            }
        }

        ::log::debug!("Opened {} browser sessions", sessions.len());
        Self::from_sessions(sessions)
    }

    /// Close every session, logging failures
    pub async fn close(self) {
        for session in self.into_idle() {
            if let Err(e) = session.close().await {
                ::log::warn!("Failed to close browser session: {}", e);
            }
        }
    }
}

impl<S: PageFetcher> SessionPool<S> {
    /// Pool over already opened sessions
    pub fn from_sessions(sessions: Vec<S>) -> Result<Self> {
        let size = sessions.len();
        if size == 0 {
            return Err(Error::Config("session pool needs at least one session".to_string()));
        }

        let (idle_tx, idle_rx) = mpsc::channel(size);
        for session in sessions {
            idle_tx
                .try_send(session)
                .map_err(|_| Error::Protocol("session pool channel full".to_string()))?;
        }

        Ok(Self {
            idle_tx,
            idle_rx: Mutex::new(idle_rx),
            size,
        })
    }

    /// Number of sessions owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Take back every idle session
    fn into_idle(self) -> Vec<S> {
        let mut idle_rx = self.idle_rx.into_inner();
        let mut sessions = Vec::with_capacity(self.size);
        while let Ok(session) = idle_rx.try_recv() {
            sessions.push(session);
        }
        if sessions.len() < self.size {
            ::log::warn!(
                "{} of {} browser sessions were not returned to the pool",
                self.size - sessions.len(),
                self.size
            );
        }
        sessions
    }
}

#[async_trait]
impl<S: PageFetcher + 'static> PageFetcher for SessionPool<S> {
    async fn fetch(
        &self,
        url: &Url,
        depth: usize,
        options: &CaptureOptions,
    ) -> Result<CrawlResult> {
        let session = self
            .idle_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| Error::Protocol("session pool closed".to_string()))?;

        let result = session.fetch(url, depth, options).await;

        if self.idle_tx.send(session).await.is_err() {
            ::log::warn!("Session pool closed while {} was being captured", url);
        }
        result
    }
}

async fn connect_once(
    url: &str,
    caps: serde_json::Map<String, Value>,
) -> std::result::Result<Client, String> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(caps);
    builder.connect(url).await.map_err(|e| e.to_string())
}

fn capabilities(config: &CrawlerConfig) -> serde_json::Map<String, Value> {
    let window = format!(
        "--window-size={},{}",
        config.capture.window_width, config.capture.window_height
    );
    let mut chrome_args = vec![window, "--hide-scrollbars".to_string()];
    let mut firefox_args = Vec::new();
    if config.headless {
        chrome_args.push("--headless=new".to_string());
        chrome_args.push("--disable-gpu".to_string());
        firefox_args.push("-headless".to_string());
    }

    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({ "args": chrome_args }),
    );
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({ "args": firefox_args }),
    );
    caps
}

/// Session timeouts; only the page load limit is changed from the driver's defaults
fn session_timeouts(options: &CaptureOptions) -> TimeoutConfiguration {
    let page_load = Duration::from_millis(options.page_load_timeout_ms);
    TimeoutConfiguration::new(None, Some(page_load), None)
}

fn navigation_deadline(options: &CaptureOptions) -> Duration {
    Duration::from_millis(options.page_load_timeout_ms) + NAVIGATION_GRACE
}
