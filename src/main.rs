use clap::Parser;
use page_capture::{CrawlerConfig, Result};
use std::process::ExitCode;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    if let Err(e) = page_capture::logging::init(args.log_file().as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    let mut config = match &args.global.config {
        Some(path) => CrawlerConfig::from_file(path)?,
        None => CrawlerConfig::default(),
    };
    config.apply_env();
    args.apply_to(&mut config);

    ::log::debug!("Using WebDriver at {}", config.webdriver_url);
    let start_time = std::time::Instant::now();

    match &args.command {
        Command::Page { url, .. } => {
            let report = page_capture::capture_single_page(&config, url).await?;
            ::log::info!(
                "Wrote {} files to {}",
                report.files.len(),
                report.output_dir.display()
            );
        }
        Command::Deep { url, pdf_name, .. } => {
            let report = page_capture::deep_crawl(&config, url, pdf_name).await?;
            ::log::info!(
                "Crawl complete - {} pages, {} screenshots in {}",
                report.pages,
                report.screenshots.len(),
                report.output_dir.display()
            );
        }
    }

    ::log::info!(
        "Finished in {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
