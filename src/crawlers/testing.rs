use crate::browser::PageFetcher;
use crate::config::CaptureOptions;
use crate::error::{Error, Result};
use crate::results::CrawlResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// In-memory site used in place of a browser
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    redirects: HashMap<String, String>,
    delays: HashMap<String, u64>,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page and the hrefs it links to
    pub fn page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url.to_string(),
            links.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    /// Make the browser land on `to` when asked for `from`
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn delay(mut self, url: &str, millis: u64) -> Self {
        self.delays.insert(url.to_string(), millis);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &Url,
        depth: usize,
        options: &CaptureOptions,
    ) -> Result<CrawlResult> {
        self.fetched.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(url.as_str()).copied().unwrap_or(1);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(url.as_str()) {
            return Err(Error::Protocol(format!("mock failure for {}", url)));
        }
        if self.panicking.contains(url.as_str()) {
            panic!("mock panic for {}", url);
        }

        let landed = match self.redirects.get(url.as_str()) {
            Some(to) => Url::parse(to).map_err(|e| Error::url(to, e))?,
            None => url.clone(),
        };

        let mut result = CrawlResult::new(url.as_str(), depth);
        if landed != *url {
            result.final_url = Some(landed.to_string());
        }
        result.status_code = Some(200);
        result.html = Some(format!("<html><body>{}</body></html>", landed));
        result.links = self
            .pages
            .get(landed.as_str())
            .into_iter()
            .flatten()
            .filter_map(|href| landed.join(href).ok())
            .map(|u| u.to_string())
            .collect();
        if options.screenshot {
            result.screenshot = Some(url.as_str().as_bytes().to_vec());
        }
        Ok(result)
    }
}
