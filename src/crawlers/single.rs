use crate::browser::PageFetcher;
use crate::config::CaptureOptions;
use crate::error::Result;
use crate::results::CrawlResult;
use url::Url;

/// Capture one page at depth 0
pub async fn capture_page<F>(fetcher: &F, url: &Url, options: &CaptureOptions) -> Result<CrawlResult>
where
    F: PageFetcher + ?Sized,
{
    ::log::info!("Crawling: {}", url);
    let result = fetcher.fetch(url, 0, options).await?;

    match result.status_code {
        Some(status) => ::log::info!("Page loaded with status: {}", status),
        None => ::log::info!("Page loaded, status code not reported by the browser"),
    }
    Ok(result)
}
