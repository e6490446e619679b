use listing_harvester::{AqarScraper, HarvestConfig, PageFetcher, ReqwestTransport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HarvestConfig::from_env()?;

    info!("Listing Harvester - sa.aqar.fm");
    info!(
        root_url = %config.root_url,
        max_pages = config.max_pages,
        concurrency = config.concurrency,
        "Loaded configuration"
    );

    let transport = Arc::new(ReqwestTransport::new(&config.cookies)?);
    let fetcher = Arc::new(PageFetcher::with_policy(transport, config.retry.clone()));
    let scraper = AqarScraper::new(fetcher).with_concurrency(config.concurrency);

    let harvest = scraper.run(&config.root_url, config.max_pages).await;

    if harvest.is_blocked() {
        error!("Run stopped early by a block page; refresh the cookies and try again");
    }
    info!(
        listings = harvest.records.len(),
        pages = harvest.pages,
        failed_pages = harvest.failed_pages,
        elapsed_secs = (harvest.finished_at - harvest.started_at).num_seconds(),
        "Scraped listings"
    );

    // Save to JSON file
    let json = serde_json::to_string_pretty(&harvest.records)?;
    tokio::fs::write(&config.output_path, json).await?;
    info!("Saved {} listings to {}", harvest.records.len(), config.output_path);

    Ok(())
}
