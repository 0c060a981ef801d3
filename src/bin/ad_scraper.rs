//! Scrapes the configured channels once, storing every new rental ad.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use rental_scout::ad_store::AdStore;
use rental_scout::config::ScraperConfig;
use rental_scout::llm::OpenAiClient;
use rental_scout::logging::init_tracing;
use rental_scout::message_source::{MessageSource, TelegramExportSource};
use rental_scout::telegram_source::TelegramLiveSource;
use rental_scout::pipeline::{check_channels, run_channels, AdRegistry, IngestionPipeline, PipelineConfig};
use rental_scout::similarity::SimilarityMatcher;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = ScraperConfig::from_env()?;
    info!(
        channels = ?config.channels,
        live = config.telegram.is_some(),
        store_path = %config.store_path.display(),
        "Starting ad scraper"
    );

    let store = AdStore::load(&config.store_path)
        .with_context(|| format!("Failed to open ad store {}", config.store_path.display()))?;
    info!(stored_ads = store.len(), "Ad store loaded");

    let llm = Arc::new(OpenAiClient::new(config.llm.clone())?);
    let pipeline_config = PipelineConfig {
        similarity_threshold: config.similarity_threshold,
        scrape_limit: config.scrape_limit,
        recovery: config.llm.recovery.clone(),
    };
    let registry = AdRegistry::new(store, SimilarityMatcher::default());
    let pipeline = Arc::new(IngestionPipeline::new(
        llm.clone(),
        llm,
        registry,
        pipeline_config,
    ));

    let source: Arc<dyn MessageSource> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramLiveSource::connect(telegram).await?),
        None => {
            info!(export_dir = %config.export_dir.display(), "API_ID not set, reading channel exports");
            Arc::new(TelegramExportSource::new(&config.export_dir))
        }
    };
    let channels = check_channels(source.as_ref(), &config.channels).await;
    if channels.is_empty() {
        warn!("None of the configured channels is accessible, nothing to do");
        return Ok(());
    }

    let stats = run_channels(Arc::clone(&pipeline), source, channels).await;
    info!(
        processed = stats.processed,
        stored = stats.stored,
        duplicates = stats.duplicates,
        skipped = stats.skipped,
        failures = stats.failures,
        backoff_pauses = stats.backoff_pauses,
        total_ads = pipeline.registry().len().await,
        "Scraping finished"
    );

    Ok(())
}
