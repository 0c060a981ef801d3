//! # Ingestion Pipeline Module
//!
//! Per-message flow: classify → extract → vectorize → similarity check →
//! store. Every failure is caught at its boundary and turned into a logged
//! [`IngestOutcome`]; nothing here aborts the processing of later messages
//! or other channels.
//!
//! The Ad Store is shared by all channel tasks through [`AdRegistry`], whose
//! [`AdRegistry::admit`] runs the similarity check and the append under one
//! lock, so two tasks cannot both admit the same ad. The file write runs on
//! the blocking pool.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{spawn_blocking, JoinSet};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::ad_model::AdRecord;
use crate::ad_store::{AdStore, StoreRecord};
use crate::classification_cache::ClassificationCache;
use crate::config::RecoveryConfig;
use crate::errors::{ExtractionError, LlmError, SourceError};
use crate::llm::{AdClassifier, AdExtractor};
use crate::message_source::{MessageSource, ScrapedMessage};
use crate::similarity::{SimilarityMatcher, DEFAULT_SIMILARITY_THRESHOLD};
use crate::vectorizer::vectorize;

/// Public link to a channel post
pub fn canonical_url(channel: &str, message_id: i64) -> String {
    format!("https://t.me/{channel}/{message_id}")
}

/// Result of offering a candidate to the registry
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// No similar ad was stored; the candidate is now in the store
    Accepted(StoreRecord),
    /// Stored ads similar to the candidate, in store order
    Duplicate(Vec<StoreRecord>),
}

/// Single point of access to the shared [`AdStore`]
#[derive(Debug, Clone)]
pub struct AdRegistry {
    store: Arc<Mutex<AdStore>>,
    matcher: Arc<SimilarityMatcher>,
}

impl AdRegistry {
    pub fn new(store: AdStore, matcher: SimilarityMatcher) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            matcher: Arc::new(matcher),
        }
    }

    /// Store `candidate` unless a similar ad is already present.
    ///
    /// The lookup and the append happen while holding the store lock, on a
    /// blocking-pool thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file cannot be rewritten; the candidate
    /// is then not kept.
    pub async fn admit(&self, candidate: StoreRecord, threshold: f64) -> Result<Admission> {
        let mut store = Arc::clone(&self.store).lock_owned().await;
        let matcher = Arc::clone(&self.matcher);

        spawn_blocking(move || -> Result<Admission> {
            let matches = store.find_similar(&matcher, &candidate.vector, threshold);
            if !matches.is_empty() {
                return Ok(Admission::Duplicate(matches));
            }

            store.append(candidate.clone())?;
            Ok(Admission::Accepted(candidate))
        })
        .await
        .context("Ad store task did not complete")?
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every stored record, in insertion order
    pub async fn records(&self) -> Vec<StoreRecord> {
        self.store.lock().await.all().to_vec()
    }
}

/// What happened to one scraped message
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    EmptyText,
    NotAnAd,
    ClassificationFailed(String),
    ExtractionFailed(String),
    Duplicate { url: String, matches: Vec<StoreRecord> },
    Stored(StoreRecord),
    StoreFailed(String),
}

/// Pipeline tuning knobs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub similarity_threshold: f64,
    /// Messages read per channel
    pub scrape_limit: usize,
    pub recovery: RecoveryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            scrape_limit: crate::config::DEFAULT_SCRAPE_LIMIT,
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Counters for a pipeline run
#[derive(Debug, Default)]
pub struct PipelineStats {
    processed: AtomicU64,
    stored: AtomicU64,
    duplicates: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    backoff_pauses: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub stored: u64,
    pub duplicates: u64,
    /// Empty or non-ad messages
    pub skipped: u64,
    /// Classification, extraction or store failures
    pub failures: u64,
    pub backoff_pauses: u64,
}

impl PipelineStats {
    fn record(&self, outcome: &IngestOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            IngestOutcome::EmptyText | IngestOutcome::NotAnAd => &self.skipped,
            IngestOutcome::Duplicate { .. } => &self.duplicates,
            IngestOutcome::Stored(_) => &self.stored,
            IngestOutcome::ClassificationFailed(_)
            | IngestOutcome::ExtractionFailed(_)
            | IngestOutcome::StoreFailed(_) => &self.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            backoff_pauses: self.backoff_pauses.load(Ordering::Relaxed),
        }
    }
}

/// Classify → extract → vectorize → deduplicate → store
pub struct IngestionPipeline {
    classifier: Arc<dyn AdClassifier>,
    extractor: Arc<dyn AdExtractor>,
    registry: AdRegistry,
    cache: ClassificationCache,
    config: PipelineConfig,
    stats: PipelineStats,
}

impl IngestionPipeline {
    pub fn new(
        classifier: Arc<dyn AdClassifier>,
        extractor: Arc<dyn AdExtractor>,
        registry: AdRegistry,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier,
            extractor,
            registry,
            cache: ClassificationCache::default(),
            config,
            stats: PipelineStats::default(),
        }
    }

    /// Replace the classification cache (capacity 0 disables it)
    pub fn with_cache(mut self, cache: ClassificationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn registry(&self) -> &AdRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one message through the pipeline. Never fails; the outcome says what happened.
    pub async fn process_message(&self, message: &ScrapedMessage, channel: &str) -> IngestOutcome {
        let outcome = self.ingest(message, channel).await;
        self.stats.record(&outcome);
        log_outcome(&outcome, message, channel);
        outcome
    }

    async fn ingest(&self, message: &ScrapedMessage, channel: &str) -> IngestOutcome {
        let text = match message.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text,
            _ => return IngestOutcome::EmptyText,
        };

        match self.classify(text).await {
            Ok(true) => {}
            Ok(false) => return IngestOutcome::NotAnAd,
            Err(e) => return IngestOutcome::ClassificationFailed(e.to_string()),
        }

        let ad = match self.extract(text).await {
            Ok(ad) => ad,
            Err(e) => return IngestOutcome::ExtractionFailed(e.to_string()),
        };

        let url = canonical_url(channel, message.id);
        let candidate = StoreRecord {
            message_id: message.id,
            channel_id: message.chat_id,
            url: url.clone(),
            vector: vectorize(&ad),
        };

        match self
            .registry
            .admit(candidate, self.config.similarity_threshold)
            .await
        {
            Ok(Admission::Accepted(record)) => IngestOutcome::Stored(record),
            Ok(Admission::Duplicate(matches)) => IngestOutcome::Duplicate { url, matches },
            Err(e) => IngestOutcome::StoreFailed(format!("{e:#}")),
        }
    }

    /// Classification with a bounded rate-limit retry loop and a per-call timeout
    async fn classify(&self, text: &str) -> Result<bool, LlmError> {
        if let Some(cached) = self.cache.get(text) {
            debug!(is_ad = cached, "Classification served from cache");
            return Ok(cached);
        }

        let recovery = &self.config.recovery;
        let mut attempt: u32 = 0;
        loop {
            let result = match timeout(
                recovery.operation_timeout(),
                self.classifier.is_rental_ad(text),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(format!(
                    "classification exceeded {}s",
                    recovery.operation_timeout_secs
                ))),
            };

            match result {
                Ok(is_ad) => {
                    self.cache.insert(text, is_ad);
                    return Ok(is_ad);
                }
                Err(LlmError::RateLimited(retry_after))
                    if attempt < recovery.max_rate_limit_retries =>
                {
                    attempt += 1;
                    self.stats.backoff_pauses.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        attempt,
                        max_retries = recovery.max_rate_limit_retries,
                        backoff_ms = recovery.rate_limit_backoff_ms,
                        retry_after_secs = ?retry_after,
                        "Language model rate limit reached, backing off"
                    );
                    sleep(recovery.rate_limit_backoff()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn extract(&self, text: &str) -> Result<AdRecord, ExtractionError> {
        let recovery = &self.config.recovery;
        match timeout(recovery.operation_timeout(), self.extractor.extract_ad(text)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Llm(LlmError::Timeout(format!(
                "extraction exceeded {}s",
                recovery.operation_timeout_secs
            )))),
        }
    }

    /// Process a channel backlog in source order
    ///
    /// # Errors
    ///
    /// Returns the source error when the channel cannot be read; message
    /// level failures are reported in the outcomes instead.
    pub async fn process_channel(
        &self,
        source: &dyn MessageSource,
        channel: &str,
    ) -> Result<Vec<IngestOutcome>, SourceError> {
        info!(channel, "Starting to process channel");

        let messages = source
            .fetch_messages(channel, self.config.scrape_limit)
            .await?;

        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.process_message(message, channel).await);
        }

        info!(channel, messages = messages.len(), "Finished processing channel");
        Ok(outcomes)
    }
}

fn log_outcome(outcome: &IngestOutcome, message: &ScrapedMessage, channel: &str) {
    let message_id = message.id;
    match outcome {
        IngestOutcome::EmptyText => {
            debug!(channel, message_id, "Message has no text, skipped")
        }
        IngestOutcome::NotAnAd => {
            info!(channel, message_id, "Message is not an apartment rental advertisement")
        }
        IngestOutcome::ClassificationFailed(e) => {
            error!(channel, message_id, error = %e, "Could not classify message, skipped")
        }
        IngestOutcome::ExtractionFailed(e) => {
            warn!(channel, message_id, error = %e, "Failed to extract data from advertisement")
        }
        IngestOutcome::Duplicate { url, matches } => info!(
            channel,
            message_id,
            url = %url,
            similar_to = %matches.first().map(|m| m.url.as_str()).unwrap_or(""),
            matches = matches.len(),
            "Similar advertisement already exists"
        ),
        IngestOutcome::Stored(record) => {
            info!(channel, message_id, url = %record.url, "Saved new advertisement");
            debug!(channel, message_id, features = %record.vector, "Stored feature vector");
        }
        IngestOutcome::StoreFailed(e) => {
            error!(channel, message_id, error = %e, "Failed to save advertisement")
        }
    }
}

/// Log access to every channel and return the readable ones
pub async fn check_channels(source: &dyn MessageSource, channels: &[String]) -> Vec<String> {
    info!("Checking access to channels...");
    let mut reachable = Vec::with_capacity(channels.len());
    for channel in channels {
        match source.check_access(channel).await {
            Ok(()) => {
                info!(channel = %channel, "Access to channel granted");
                reachable.push(channel.clone());
            }
            Err(e) => error!(channel = %channel, error = %e, "Failed to access channel"),
        }
    }
    reachable
}

/// Process every channel as its own task and wait for all of them.
///
/// A failing channel is logged and does not affect the others.
pub async fn run_channels(
    pipeline: Arc<IngestionPipeline>,
    source: Arc<dyn MessageSource>,
    channels: Vec<String>,
) -> StatsSnapshot {
    let mut tasks = JoinSet::new();

    for channel in channels {
        let pipeline = Arc::clone(&pipeline);
        let source = Arc::clone(&source);
        tasks.spawn(async move {
            if let Err(e) = pipeline.process_channel(source.as_ref(), &channel).await {
                error!(channel = %channel, error = %e, "Error while processing channel");
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Channel task ended abnormally");
        }
    }

    pipeline.stats()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_url() {
        assert_eq!(canonical_url("arenda_msk", 42), "https://t.me/arenda_msk/42");
    }

    #[test]
    fn test_stats_record() {
        let stats = PipelineStats::default();
        stats.record(&IngestOutcome::NotAnAd);
        stats.record(&IngestOutcome::EmptyText);
        stats.record(&IngestOutcome::ExtractionFailed("bad".to_string()));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.skipped, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.stored, 0);
    }
}
