use crate::browser::PageFetcher;
use crate::config::{CaptureOptions, DeepCrawlConfig};
use crate::error::{Error, Result};
use crate::filter::{UrlFilter, normalize_url};
use crate::results::CrawlResult;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Breadth-first, depth-limited crawl from a seed URL.
///
/// Every page of depth `d` is fetched before any page of depth `d + 1`.
/// Within a level at most `max_concurrency` fetches run at once, and results
/// come back in discovery order regardless of which fetch finishes first.
#[derive(Debug)]
pub struct BfsCrawler {
    seed: Url,
    config: DeepCrawlConfig,
    max_concurrency: usize,
    filter: UrlFilter,
}

impl BfsCrawler {
    pub fn new(seed: Url, config: DeepCrawlConfig, max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        let filter = UrlFilter::for_seed(&seed, &config)?;
        Ok(Self {
            seed,
            config,
            max_concurrency,
            filter,
        })
    }

    /// Crawl and return every page result, ordered by depth then discovery
    pub async fn run<F>(&self, fetcher: Arc<F>, options: &CaptureOptions) -> Vec<CrawlResult>
    where
        F: PageFetcher + ?Sized + 'static,
    {
        let seed = normalize_url(&self.seed);
        let mut visited = HashSet::from([seed.to_string()]);
        let mut frontier = vec![seed];
        let mut results: Vec<CrawlResult> = Vec::new();

        for depth in 0..=self.config.max_depth {
            if let Some(max_pages) = self.config.max_pages {
                frontier.truncate(max_pages.saturating_sub(results.len()));
            }
            if frontier.is_empty() {
                break;
            }

            ::log::info!("Crawling depth {}: {} pages", depth, frontier.len());
            let level: Vec<CrawlResult> = self
                .fetch_level(&fetcher, &frontier, depth, options)
                .await
                .into_iter()
                .map(|result| self.check_landing(result, &mut visited))
                .collect();

            let mut next = Vec::new();
            if depth < self.config.max_depth {
                for result in &level {
                    next.extend(self.discover(result, &mut visited));
                }
            }

            results.extend(level);
            frontier = next;
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        ::log::info!(
            "Crawled {} pages in total, {} failed.",
            results.len(),
            failed
        );
        results
    }

    /// Flag a page whose redirect left the crawl's host scope.
    ///
    /// An in-scope landing URL is marked as visited so it is not fetched again.
    fn check_landing(&self, result: CrawlResult, visited: &mut HashSet<String>) -> CrawlResult {
        let Some(landed) = result.final_url.as_deref() else {
            return result;
        };
        let Ok(landed) = Url::parse(landed) else {
            return result;
        };

        if self.filter.is_in_host_scope(&landed) {
            visited.insert(normalize_url(&landed).to_string());
            return result;
        }

        ::log::warn!("{} redirected outside the crawl to {}", result.url, landed);
        CrawlResult {
            final_url: result.final_url,
            ..CrawlResult::failed(
                result.url,
                result.depth,
                format!("redirected outside crawl scope to {}", landed),
            )
        }
    }

    /// New in-scope links of a page, marked as visited
    fn discover(&self, result: &CrawlResult, visited: &mut HashSet<String>) -> Vec<Url> {
        let mut found = Vec::new();
        for link in &result.links {
            let Ok(url) = Url::parse(link) else {
                ::log::debug!("Skipping unparseable link: {}", link);
                continue;
            };
            if !self.filter.should_crawl(&url) {
                ::log::debug!("URL filter rejected: {}", url);
                continue;
            }
            let normalized = normalize_url(&url);
            if visited.insert(normalized.to_string()) {
                ::log::debug!("Queuing link for crawling: {}", normalized);
                found.push(normalized);
            }
        }
        found
    }

    async fn fetch_level<F>(
        &self,
        fetcher: &Arc<F>,
        frontier: &[Url],
        depth: usize,
        options: &CaptureOptions,
    ) -> Vec<CrawlResult>
    where
        F: PageFetcher + ?Sized + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, url) in frontier.iter().cloned().enumerate() {
            let fetcher = Arc::clone(fetcher);
            let semaphore = Arc::clone(&semaphore);
            let options = options.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = match fetcher.fetch(&url, depth, &options).await {
                    Ok(result) => result,
                    Err(e) => {
                        ::log::error!("Failed to crawl {}: {}", url, e);
                        CrawlResult::failed(url.as_str(), depth, e)
                    }
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<CrawlResult>> = vec![None; frontier.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => ::log::error!("Crawl task failed: {}", e),
            }
        }

        // A task that panicked still leaves a result for its URL
        slots
            .into_iter()
            .zip(frontier)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    CrawlResult::failed(url.as_str(), depth, "crawl task panicked")
                })
            })
            .collect()
    }
}
