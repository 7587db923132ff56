use crate::error::Result;
use crate::results::CrawlResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Longest URL fragment kept in a file name
const MAX_URL_CHARS: usize = 100;

/// One page's entry in `manifest.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub depth: usize,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub error: Option<String>,
    pub files: Vec<PathBuf>,
}

impl ManifestEntry {
    pub fn for_result(result: &CrawlResult) -> Self {
        Self {
            url: result.url.clone(),
            final_url: result.final_url.clone(),
            depth: result.depth,
            status_code: result.status_code,
            title: result.title.clone(),
            error: result.error.clone(),
            files: Vec::new(),
        }
    }
}

/// Replace every non-alphanumeric character with `_` and cap the length
pub fn sanitize_url(url: &str) -> String {
    url.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(MAX_URL_CHARS)
        .collect()
}

/// File name for the screenshot of the page at `index` (zero based)
pub fn screenshot_file_name(index: usize, url: &str) -> String {
    format!("page_{}_{}.png", index + 1, sanitize_url(url))
}

/// Create the output folder if needed
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        ::log::info!("Output directory already exists: {}", dir.display());
    } else {
        fs::create_dir_all(dir)?;
        ::log::info!("Created output directory: {}", dir.display());
    }
    Ok(())
}

/// Write `page.html`, `page.md`, `page.png` and `page.pdf` for whatever was captured
pub fn save_single_page(dir: &Path, result: &CrawlResult) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let artifacts: [(&str, &str, Option<&[u8]>); 4] = [
        ("page.html", "HTML", result.html.as_deref().map(str::as_bytes)),
        ("page.md", "Markdown", result.markdown.as_deref().map(str::as_bytes)),
        ("page.png", "Screenshot", result.screenshot.as_deref()),
        ("page.pdf", "PDF", result.pdf.as_deref()),
    ];

    for (file_name, label, contents) in artifacts {
        match contents {
            Some(bytes) => {
                let path = dir.join(file_name);
                fs::write(&path, bytes)?;
                ::log::info!("{} saved to: {}", label, path.display());
                written.push(path);
            }
            None => ::log::warn!("No {} content available for {}", label, result.url),
        }
    }

    Ok(written)
}

/// Write each captured screenshot and return the saved paths in result order.
///
/// A page without a screenshot, or whose file cannot be written, is logged and
/// skipped. The returned entries line up with `results`.
pub fn save_screenshots(
    dir: &Path,
    results: &[CrawlResult],
) -> (Vec<PathBuf>, Vec<ManifestEntry>) {
    let mut saved = Vec::new();
    let mut entries = Vec::with_capacity(results.len());

    for (i, result) in results.iter().enumerate() {
        let mut entry = ManifestEntry::for_result(result);

        match &result.screenshot {
            Some(png) => {
                let path = dir.join(screenshot_file_name(i, &result.url));
                match fs::write(&path, png) {
                    Ok(()) => {
                        ::log::info!(
                            "Screenshot saved for {} to: {}",
                            result.url,
                            path.display()
                        );
                        entry.files.push(path.clone());
                        saved.push(path);
                    }
                    Err(e) => {
                        ::log::error!("Error saving screenshot file for {}: {}", result.url, e);
                    }
                }
            }
            None => ::log::warn!("No screenshot captured for URL: {}", result.url),
        }

        entries.push(entry);
    }

    (saved, entries)
}

/// Write `manifest.json` describing every page of the run
pub fn write_manifest(dir: &Path, entries: &[ManifestEntry]) -> Result<PathBuf> {
    let path = dir.join("manifest.json");
    fs::write(&path, serde_json::to_vec_pretty(entries)?)?;
    ::log::debug!("Manifest written to: {}", path.display());
    Ok(path)
}
