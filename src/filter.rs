use crate::config::DeepCrawlConfig;
use regex::Regex;
use url::Url;

/// Static assets that never render as a page worth capturing
const ASSET_PATTERN: &str =
    r"(?i)\.(jpg|jpeg|png|gif|webp|bmp|css|js|ico|svg|woff|woff2|ttf|eot|pdf|zip|gz|tar|mp3|mp4|webm)$";

/// Decides which discovered links a deep crawl follows
#[derive(Debug)]
pub struct UrlFilter {
    include_external: bool,
    seed_host: Option<String>,
    asset_regex: Regex,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Build a filter scoped to the seed URL's host
    pub fn for_seed(seed: &Url, config: &DeepCrawlConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_external: config.include_external,
            seed_host: seed.host_str().map(bare_host),
            asset_regex: Regex::new(ASSET_PATTERN)?,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Determine if a URL should be crawled based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_host_scope(url) {
            return false;
        }

        // Query strings may name files without the page being one
        if self.asset_regex.is_match(url.path()) {
            return false;
        }

        // Exclusions take precedence over inclusions
        if self.exclude_regexes.iter().any(|r| r.is_match(url.as_str())) {
            return false;
        }

        self.include_regexes.is_empty()
            || self.include_regexes.iter().any(|r| r.is_match(url.as_str()))
    }

    /// Whether the URL's host is one the crawl may visit
    pub fn is_in_host_scope(&self, url: &Url) -> bool {
        if self.include_external {
            return true;
        }
        match (&self.seed_host, url.host_str()) {
            (Some(seed), Some(host)) => bare_host(host) == *seed,
            _ => false,
        }
    }
}

/// Create a normalized version of the URL (e.g., removing fragments)
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

fn bare_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}
