use clap::{Args as ClapArgs, Parser, Subcommand};
use page_capture::{CrawlerConfig, PDF_OUTPUT_FILENAME};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "page-capture")]
#[command(about = "Capture web pages as HTML, Markdown, screenshots and PDFs through WebDriver")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture a single page
    Page {
        /// URL to capture
        url: String,

        /// Output folder (defaults to ./simple_crawl_output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Breadth-first crawl, one screenshot per page combined into a PDF
    Deep {
        /// Seed URL
        url: String,

        /// Output folder (defaults to ./deep_crawling_output_folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Link hops followed from the seed page
        #[arg(long)]
        max_depth: Option<usize>,

        /// Also follow links to other hosts
        #[arg(long)]
        include_external: bool,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,

        /// Only follow URLs matching this regex (repeatable)
        #[arg(long = "include")]
        include_patterns: Vec<String>,

        /// Never follow URLs matching this regex (repeatable)
        #[arg(long = "exclude")]
        exclude_patterns: Vec<String>,

        /// File name of the combined screenshot PDF
        #[arg(long, default_value = PDF_OUTPUT_FILENAME)]
        pdf_name: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct GlobalArgs {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// WebDriver server URL (also read from WEBDRIVER_URL)
    #[arg(long, global = true)]
    pub webdriver_url: Option<String>,

    /// Number of browser sessions used in parallel
    #[arg(short, long, global = true)]
    pub concurrency: Option<usize>,

    /// Skip screenshots
    #[arg(long, global = true)]
    pub no_screenshot: bool,

    /// Skip printing pages to PDF
    #[arg(long, global = true)]
    pub no_pdf: bool,

    /// Do not scroll through the page before capturing
    #[arg(long, global = true)]
    pub no_scan_full_page: bool,

    /// Do not wait for images to finish loading
    #[arg(long, global = true)]
    pub no_wait_for_images: bool,

    /// Navigation timeout in milliseconds
    #[arg(long, global = true)]
    pub page_load_timeout: Option<u64>,

    /// Show the browser window
    #[arg(long, global = true)]
    pub headed: bool,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_to(&self, config: &mut CrawlerConfig) {
        let global = &self.global;
        if let Some(url) = &global.webdriver_url {
            config.webdriver_url = url.clone();
        }
        if let Some(concurrency) = global.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(timeout) = global.page_load_timeout {
            config.capture.page_load_timeout_ms = timeout;
        }
        config.capture.screenshot &= !global.no_screenshot;
        config.capture.pdf &= !global.no_pdf;
        config.capture.scan_full_page &= !global.no_scan_full_page;
        config.capture.wait_for_images &= !global.no_wait_for_images;
        config.headless &= !global.headed;

        match &self.command {
            Command::Page { output, .. } => {
                if let Some(dir) = output {
                    config.output_dir = Some(dir.clone());
                }
            }
            Command::Deep {
                output,
                max_depth,
                include_external,
                max_pages,
                include_patterns,
                exclude_patterns,
                ..
            } => {
                if let Some(dir) = output {
                    config.output_dir = Some(dir.clone());
                }
                if let Some(depth) = max_depth {
                    config.deep.max_depth = *depth;
                }
                config.deep.include_external |= *include_external;
                if max_pages.is_some() {
                    config.deep.max_pages = *max_pages;
                }
                config.deep.include_patterns.extend(include_patterns.iter().cloned());
                config.deep.exclude_patterns.extend(exclude_patterns.iter().cloned());
            }
        }
    }

    /// Log file for this run; deep crawls log to `crawler.log` unless told otherwise
    pub fn log_file(&self) -> Option<PathBuf> {
        match (&self.global.log_file, &self.command) {
            (Some(path), _) => Some(path.clone()),
            (None, Command::Deep { .. }) => Some(PathBuf::from("crawler.log")),
            (None, Command::Page { .. }) => None,
        }
    }
}
