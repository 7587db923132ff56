pub mod browser;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod filter;
pub mod logging;
pub mod output;
pub mod parsers;
pub mod pdf;
pub mod results;

// Re-export commonly used types for convenience
pub use browser::{PageFetcher, SessionPool, WebDriverSession};
pub use config::{CaptureOptions, CrawlerConfig, DeepCrawlConfig};
pub use error::{Error, Result};
pub use results::CrawlResult;

use output::ManifestEntry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default folder for single page captures
pub const SINGLE_PAGE_OUTPUT_FOLDER: &str = "simple_crawl_output";
/// Default folder for deep crawls
pub const DEEP_CRAWL_OUTPUT_FOLDER: &str = "deep_crawling_output_folder";
/// Default name of the combined screenshot PDF
pub const PDF_OUTPUT_FILENAME: &str = "crawled_pages_screenshots.pdf";

/// What a single page capture produced
#[derive(Debug)]
pub struct SinglePageReport {
    pub output_dir: PathBuf,
    pub result: CrawlResult,
    pub files: Vec<PathBuf>,
}

/// What a deep crawl produced
#[derive(Debug)]
pub struct DeepCrawlReport {
    pub output_dir: PathBuf,
    pub pages: usize,
    pub screenshots: Vec<PathBuf>,
    pub pdf: Option<PathBuf>,
}

/// Capture one URL and write its HTML, Markdown, screenshot and PDF
pub async fn capture_single_page(config: &CrawlerConfig, url: &str) -> Result<SinglePageReport> {
    config.validate()?;
    let url = config::parse_start_url(url)?;
    let dir = config.output_dir_or(SINGLE_PAGE_OUTPUT_FOLDER)?;
    output::ensure_output_dir(&dir)?;

    let session = WebDriverSession::connect(config).await?;
    let captured = crawlers::capture_page(&session, &url, &config.capture).await;
    if let Err(e) = session.close().await {
        ::log::warn!("Failed to close browser session: {}", e);
    }

    save_single_outputs(&dir, captured?)
}

/// Persist a single page result into `dir`
pub fn save_single_outputs(dir: &Path, result: CrawlResult) -> Result<SinglePageReport> {
    let files = output::save_single_page(dir, &result)?;

    let mut entry = ManifestEntry::for_result(&result);
    entry.files = files.clone();
    output::write_manifest(dir, &[entry])?;

    Ok(SinglePageReport {
        output_dir: dir.to_path_buf(),
        result,
        files,
    })
}

/// Crawl from `url` breadth-first, save a screenshot per page and combine them
/// into `pdf_name`
pub async fn deep_crawl(
    config: &CrawlerConfig,
    url: &str,
    pdf_name: &str,
) -> Result<DeepCrawlReport> {
    config.validate()?;
    let url = config::parse_start_url(url)?;
    let dir = config.output_dir_or(DEEP_CRAWL_OUTPUT_FOLDER)?;
    output::ensure_output_dir(&dir)?;

    let crawler = crawlers::BfsCrawler::new(url, config.deep.clone(), config.max_concurrency)?;
    let pool = Arc::new(SessionPool::<WebDriverSession>::connect(config).await?);

    ::log::info!("Starting web crawling process...");
    let results = crawler.run(Arc::clone(&pool), &config.capture).await;

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.close().await,
        Err(_) => ::log::warn!("Browser sessions still in use, not closing them"),
    }

    save_deep_outputs(&dir, &results, pdf_name)
}

/// Persist deep crawl screenshots, the combined PDF and the manifest into `dir`
pub fn save_deep_outputs(
    dir: &Path,
    results: &[CrawlResult],
    pdf_name: &str,
) -> Result<DeepCrawlReport> {
    let (screenshots, entries) = output::save_screenshots(dir, results);

    ::log::info!("Attempting to combine captured screenshots into a PDF...");
    let pdf = if screenshots.is_empty() {
        ::log::warn!("No screenshots were captured during the crawl. Skipping PDF creation.");
        None
    } else {
        let path = dir.join(pdf_name);
        match pdf::combine_screenshots(&screenshots, &path) {
            Ok(_) => Some(path),
            Err(e) => {
                ::log::error!("Error combining screenshots into PDF: {}", e);
                None
            }
        }
    };

    output::write_manifest(dir, &entries)?;
    ::log::info!("Web crawling and PDF generation process completed.");

    Ok(DeepCrawlReport {
        output_dir: dir.to_path_buf(),
        pages: results.len(),
        screenshots,
        pdf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_save_deep_outputs_builds_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let mut seed = CrawlResult::new("https://site.test/", 0);
        seed.screenshot = Some(png(30, 20));
        let missing = CrawlResult::failed("https://site.test/gone", 1, "timed out");
        let mut child = CrawlResult::new("https://site.test/a", 1);
        child.screenshot = Some(png(30, 40));

        let report =
            save_deep_outputs(tmp.path(), &[seed, missing, child], PDF_OUTPUT_FILENAME).unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.screenshots.len(), 2);
        assert_eq!(report.pdf, Some(tmp.path().join(PDF_OUTPUT_FILENAME)));

        let doc = lopdf::Document::load(tmp.path().join(PDF_OUTPUT_FILENAME)).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let manifest: Vec<ManifestEntry> =
            serde_json::from_slice(&std::fs::read(tmp.path().join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest[1].error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_save_deep_outputs_without_screenshots() {
        let tmp = tempfile::tempdir().unwrap();
        let results = vec![CrawlResult::new("https://site.test/", 0)];

        let report = save_deep_outputs(tmp.path(), &results, PDF_OUTPUT_FILENAME).unwrap();
        assert!(report.pdf.is_none());
        assert!(!tmp.path().join(PDF_OUTPUT_FILENAME).exists());
    }

    #[test]
    fn test_save_single_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut result = CrawlResult::new("https://site.test/wiki", 0);
        result.markdown = Some("# Giant anteater".to_string());
        result.screenshot = Some(png(5, 5));

        let report = save_single_outputs(tmp.path(), result).unwrap();
        assert_eq!(
            report.files,
            vec![tmp.path().join("page.md"), tmp.path().join("page.png")]
        );
        assert!(tmp.path().join("manifest.json").exists());
    }
}
