//! # Pipeline Tests
//!
//! End-to-end ingestion with scripted language-model capabilities and an
//! in-memory message source.

mod common;

use async_trait::async_trait;
use rental_scout::ad_model::AdRecord;
use rental_scout::ad_store::{AdStore, StoreRecord};
use rental_scout::config::RecoveryConfig;
use rental_scout::errors::{ExtractionError, LlmError, SourceError};
use rental_scout::llm::{AdClassifier, AdExtractor};
use rental_scout::message_source::{MessageSource, ScrapedMessage};
use rental_scout::pipeline::{
    check_channels, run_channels, Admission, AdRegistry, IngestOutcome, IngestionPipeline,
    PipelineConfig,
};
use rental_scout::similarity::SimilarityMatcher;
use rental_scout::vectorizer::vectorize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use common::{moscow_flat, moscow_flat_repost, petersburg_flat};

const MOSCOW_TEXT: &str = "Сдаю 2к квартиру у метро Сокол, 50 000 в месяц";
const REPOST_TEXT: &str = "Сдаю 2к у Сокола, 50 001 руб";
const PETERSBURG_TEXT: &str = "Сдаю 2к в Петербурге, 150 000";
const GREETING_TEXT: &str = "С праздником, подписчики!";

/// Answers from a script first, then `fallback` for every call after
struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<bool, LlmError>>>,
    fallback: bool,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn always(answer: bool) -> Self {
        Self::scripted(vec![], answer)
    }

    fn scripted(script: Vec<Result<bool, LlmError>>, fallback: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdClassifier for ScriptedClassifier {
    async fn is_rental_ad(&self, _text: &str) -> Result<bool, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(self.fallback))
    }
}

/// Looks the message text up in a fixed table of ads
struct TableExtractor {
    ads: HashMap<&'static str, AdRecord>,
    calls: AtomicUsize,
}

impl TableExtractor {
    fn new() -> Self {
        let ads = HashMap::from([
            (MOSCOW_TEXT, moscow_flat()),
            (REPOST_TEXT, moscow_flat_repost()),
            (PETERSBURG_TEXT, petersburg_flat()),
        ]);
        Self {
            ads,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdExtractor for TableExtractor {
    async fn extract_ad(&self, text: &str) -> Result<AdRecord, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give other channel tasks a chance to interleave
        tokio::task::yield_now().await;
        self.ads
            .get(text)
            .cloned()
            .ok_or_else(|| ExtractionError::Malformed("expected a JSON object".to_string()))
    }
}

/// Never answers for `stalled_text`; any other text is an ad
struct StallingClassifier {
    stalled_text: &'static str,
}

#[async_trait]
impl AdClassifier for StallingClassifier {
    async fn is_rental_ad(&self, text: &str) -> Result<bool, LlmError> {
        if text == self.stalled_text {
            std::future::pending::<()>().await;
        }
        Ok(true)
    }
}

/// Never answers for `stalled_text`; other texts go to a [`TableExtractor`]
struct StallingExtractor {
    stalled_text: &'static str,
    inner: TableExtractor,
}

#[async_trait]
impl AdExtractor for StallingExtractor {
    async fn extract_ad(&self, text: &str) -> Result<AdRecord, ExtractionError> {
        if text == self.stalled_text {
            std::future::pending::<()>().await;
        }
        self.inner.extract_ad(text).await
    }
}

struct MemorySource {
    channels: HashMap<String, Vec<ScrapedMessage>>,
}

impl MemorySource {
    fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    fn with_channel(mut self, name: &str, chat_id: i64, messages: &[(i64, &str)]) -> Self {
        let messages = messages
            .iter()
            .map(|(id, text)| ScrapedMessage {
                id: *id,
                chat_id,
                text: Some(text.to_string()),
            })
            .collect();
        self.channels.insert(name.to_string(), messages);
        self
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn check_access(&self, channel: &str) -> Result<(), SourceError> {
        if self.channels.contains_key(channel) {
            Ok(())
        } else {
            Err(SourceError::UsernameNotFound(channel.to_string()))
        }
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedMessage>, SourceError> {
        let messages = self
            .channels
            .get(channel)
            .ok_or_else(|| SourceError::UsernameNotFound(channel.to_string()))?;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        similarity_threshold: 0.9,
        scrape_limit: 100,
        recovery: RecoveryConfig {
            max_rate_limit_retries: 1,
            rate_limit_backoff_ms: 1,
            operation_timeout_secs: 5,
            ..Default::default()
        },
    }
}

fn pipeline_with(
    dir: &TempDir,
    classifier: Arc<dyn AdClassifier>,
    extractor: Arc<dyn AdExtractor>,
) -> IngestionPipeline {
    let store = AdStore::load(dir.path().join("vector_store.json")).unwrap();
    let registry = AdRegistry::new(store, SimilarityMatcher::default());
    IngestionPipeline::new(classifier, extractor, registry, test_config())
}

fn candidate(message_id: i64, ad: &AdRecord) -> StoreRecord {
    StoreRecord {
        message_id,
        channel_id: -1001234567890,
        url: format!("https://t.me/arenda_msk/{message_id}"),
        vector: vectorize(ad),
    }
}

fn message(id: i64, text: &str) -> ScrapedMessage {
    ScrapedMessage {
        id,
        chat_id: -1001234567890,
        text: Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_an_ad_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let classifier = Arc::new(ScriptedClassifier::always(false));
        let extractor = Arc::new(TableExtractor::new());
        let pipeline = pipeline_with(&dir, classifier.clone(), extractor.clone());

        let outcome = pipeline
            .process_message(&message(1, GREETING_TEXT), "arenda_msk")
            .await;

        assert_eq!(outcome, IngestOutcome::NotAnAd);
        assert_eq!(extractor.calls(), 0);
        assert!(pipeline.registry().is_empty().await);
        assert!(!dir.path().join("vector_store.json").exists());
        assert_eq!(pipeline.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_skipped_without_classification() {
        let dir = TempDir::new().unwrap();
        let classifier = Arc::new(ScriptedClassifier::always(true));
        let pipeline = pipeline_with(&dir, classifier.clone(), Arc::new(TableExtractor::new()));

        let photo = ScrapedMessage {
            id: 1,
            chat_id: -1001234567890,
            text: None,
        };
        assert_eq!(
            pipeline.process_message(&photo, "arenda_msk").await,
            IngestOutcome::EmptyText
        );
        assert_eq!(
            pipeline.process_message(&message(2, "   "), "arenda_msk").await,
            IngestOutcome::EmptyText
        );
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_rate_limit_then_success() {
        let dir = TempDir::new().unwrap();
        let classifier = Arc::new(ScriptedClassifier::scripted(
            vec![Err(LlmError::RateLimited(Some(7))), Ok(true)],
            true,
        ));
        let pipeline = pipeline_with(&dir, classifier.clone(), Arc::new(TableExtractor::new()));

        let outcome = pipeline
            .process_message(&message(10, MOSCOW_TEXT), "arenda_msk")
            .await;

        let record = match outcome {
            IngestOutcome::Stored(record) => record,
            other => panic!("expected the ad to be stored, got {other:?}"),
        };
        assert_eq!(record.url, "https://t.me/arenda_msk/10");
        assert_eq!(record.message_id, 10);
        assert_eq!(record.channel_id, -1001234567890);
        assert_eq!(classifier.calls(), 2);
        assert_eq!(pipeline.stats().backoff_pauses, 1);
        assert_eq!(pipeline.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_gives_up() {
        let dir = TempDir::new().unwrap();
        let classifier = Arc::new(ScriptedClassifier::scripted(
            vec![Err(LlmError::RateLimited(None)), Err(LlmError::RateLimited(None))],
            true,
        ));
        let extractor = Arc::new(TableExtractor::new());
        let pipeline = pipeline_with(&dir, classifier.clone(), extractor.clone());

        let outcome = pipeline
            .process_message(&message(10, MOSCOW_TEXT), "arenda_msk")
            .await;

        assert!(matches!(outcome, IngestOutcome::ClassificationFailed(_)));
        assert_eq!(classifier.calls(), 2);
        assert_eq!(extractor.calls(), 0);
        assert_eq!(pipeline.stats().backoff_pauses, 1);
        assert_eq!(pipeline.stats().failures, 1);
        assert!(pipeline.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let dir = TempDir::new().unwrap();
        let classifier = Arc::new(ScriptedClassifier::scripted(
            vec![Err(LlmError::Api {
                status: 500,
                body: "internal".to_string(),
            })],
            true,
        ));
        let pipeline = pipeline_with(&dir, classifier.clone(), Arc::new(TableExtractor::new()));

        let outcome = pipeline
            .process_message(&message(10, MOSCOW_TEXT), "arenda_msk")
            .await;

        assert!(matches!(outcome, IngestOutcome::ClassificationFailed(_)));
        assert_eq!(classifier.calls(), 1);
        assert_eq!(pipeline.stats().backoff_pauses, 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_message() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_with(
            &dir,
            Arc::new(ScriptedClassifier::always(true)),
            Arc::new(TableExtractor::new()),
        );

        let outcome = pipeline
            .process_message(&message(3, "Сдаю комнату, подробности в ЛС"), "arenda_msk")
            .await;

        assert!(matches!(outcome, IngestOutcome::ExtractionFailed(_)));
        assert!(pipeline.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_near_duplicates_are_suppressed() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_with(
            &dir,
            Arc::new(ScriptedClassifier::always(true)),
            Arc::new(TableExtractor::new()),
        );
        let source = MemorySource::new().with_channel(
            "arenda_msk",
            -1001234567890,
            &[(1, MOSCOW_TEXT), (2, REPOST_TEXT), (3, PETERSBURG_TEXT), (4, GREETING_TEXT)],
        );

        let outcomes = pipeline.process_channel(&source, "arenda_msk").await.unwrap();

        assert_eq!(outcomes.len(), 4);
        assert!(matches!(&outcomes[0], IngestOutcome::Stored(r) if r.message_id == 1));
        match &outcomes[1] {
            IngestOutcome::Duplicate { url, matches } => {
                assert_eq!(url, "https://t.me/arenda_msk/2");
                assert_eq!(matches.len(), 1);
                assert_eq!(matches[0].url, "https://t.me/arenda_msk/1");
            }
            other => panic!("expected a duplicate, got {other:?}"),
        }
        assert!(matches!(&outcomes[2], IngestOutcome::Stored(r) if r.message_id == 3));
        // Classified as an ad but nothing could be extracted
        assert!(matches!(&outcomes[3], IngestOutcome::ExtractionFailed(_)));

        let urls: Vec<String> = pipeline
            .registry()
            .records()
            .await
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://t.me/arenda_msk/1", "https://t.me/arenda_msk/3"]);

        // The store file holds the same records
        assert_eq!(AdStore::load(dir.path().join("vector_store.json")).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_text_is_classified_once() {
        let dir = TempDir::new().unwrap();
        let classifier = Arc::new(ScriptedClassifier::always(false));
        let pipeline = pipeline_with(&dir, classifier.clone(), Arc::new(TableExtractor::new()));

        pipeline
            .process_message(&message(1, GREETING_TEXT), "arenda_msk")
            .await;
        pipeline
            .process_message(&message(2, GREETING_TEXT), "arenda_spb")
            .await;

        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_channels_store_one_copy() {
        let dir = TempDir::new().unwrap();
        let pipeline = Arc::new(pipeline_with(
            &dir,
            Arc::new(ScriptedClassifier::always(true)),
            Arc::new(TableExtractor::new()),
        ));
        let source: Arc<dyn MessageSource> = Arc::new(
            MemorySource::new()
                .with_channel("arenda_msk", -1001111111111, &[(1, MOSCOW_TEXT)])
                .with_channel("kvartiry_moskva", -1002222222222, &[(7, MOSCOW_TEXT)])
                .with_channel("snyat_bez_agenta", -1003333333333, &[(42, REPOST_TEXT)]),
        );
        let channels = vec![
            "arenda_msk".to_string(),
            "kvartiry_moskva".to_string(),
            "snyat_bez_agenta".to_string(),
        ];

        let stats = run_channels(Arc::clone(&pipeline), source, channels).await;

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(pipeline.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_unreachable_channel_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let pipeline = Arc::new(pipeline_with(
            &dir,
            Arc::new(ScriptedClassifier::always(true)),
            Arc::new(TableExtractor::new()),
        ));
        let source: Arc<dyn MessageSource> = Arc::new(MemorySource::new().with_channel(
            "arenda_msk",
            -1001234567890,
            &[(1, MOSCOW_TEXT)],
        ));
        let configured = vec!["private_chat".to_string(), "arenda_msk".to_string()];

        assert_eq!(
            check_channels(source.as_ref(), &configured).await,
            vec!["arenda_msk".to_string()]
        );

        let stats = run_channels(Arc::clone(&pipeline), source, configured).await;
        assert_eq!(stats.stored, 1);
        assert_eq!(pipeline.registry().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_classification_times_out_and_next_message_runs() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_with(
            &dir,
            Arc::new(StallingClassifier {
                stalled_text: PETERSBURG_TEXT,
            }),
            Arc::new(TableExtractor::new()),
        );
        let started = tokio::time::Instant::now();

        let stalled = pipeline
            .process_message(&message(1, PETERSBURG_TEXT), "arenda_msk")
            .await;
        match stalled {
            IngestOutcome::ClassificationFailed(e) => assert!(e.contains("exceeded 5s"), "{e}"),
            other => panic!("expected a classification timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_secs(5));

        let next = pipeline
            .process_message(&message(2, MOSCOW_TEXT), "arenda_msk")
            .await;
        assert!(matches!(next, IngestOutcome::Stored(r) if r.message_id == 2));
        assert_eq!(pipeline.stats().failures, 1);
        assert_eq!(pipeline.stats().stored, 1);
        assert_eq!(pipeline.registry().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_extraction_times_out_and_next_message_runs() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_with(
            &dir,
            Arc::new(ScriptedClassifier::always(true)),
            Arc::new(StallingExtractor {
                stalled_text: PETERSBURG_TEXT,
                inner: TableExtractor::new(),
            }),
        );
        let source = MemorySource::new().with_channel(
            "arenda_msk",
            -1001234567890,
            &[(1, PETERSBURG_TEXT), (2, MOSCOW_TEXT)],
        );

        let outcomes = pipeline.process_channel(&source, "arenda_msk").await.unwrap();

        match &outcomes[0] {
            IngestOutcome::ExtractionFailed(e) => assert!(e.contains("exceeded 5s"), "{e}"),
            other => panic!("expected an extraction timeout, got {other:?}"),
        }
        assert!(matches!(&outcomes[1], IngestOutcome::Stored(r) if r.message_id == 2));
    }

    #[tokio::test]
    async fn test_registry_rejects_similar_candidate() {
        let dir = TempDir::new().unwrap();
        let store = AdStore::load(dir.path().join("vector_store.json")).unwrap();
        let registry = AdRegistry::new(store, SimilarityMatcher::default());

        let first = registry.admit(candidate(1, &moscow_flat()), 0.9).await.unwrap();
        assert_eq!(first, Admission::Accepted(candidate(1, &moscow_flat())));

        match registry.admit(candidate(2, &moscow_flat_repost()), 0.9).await.unwrap() {
            Admission::Duplicate(matches) => assert_eq!(matches[0].message_id, 1),
            other => panic!("expected a duplicate, got {other:?}"),
        }
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_registry_write_failure_keeps_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DataStore").join("vector_store.json");
        let store = AdStore::load(&path).unwrap();
        let registry = AdRegistry::new(store, SimilarityMatcher::default());
        // A directory now sits where the store file should go
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(registry.admit(candidate(1, &moscow_flat()), 0.9).await.is_err());
        assert!(registry.is_empty().await);

        // The registry stays usable after the failure
        std::fs::remove_dir_all(&path).unwrap();
        assert!(matches!(
            registry.admit(candidate(1, &moscow_flat()), 0.9).await.unwrap(),
            Admission::Accepted(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_admits_keep_one_copy() {
        let dir = TempDir::new().unwrap();
        let store = AdStore::load(dir.path().join("vector_store.json")).unwrap();
        let registry = AdRegistry::new(store, SimilarityMatcher::default());

        let (a, b) = tokio::join!(
            registry.admit(candidate(1, &moscow_flat()), 0.9),
            registry.admit(candidate(2, &moscow_flat_repost()), 0.9),
        );
        let accepted = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|admission| matches!(admission, Admission::Accepted(_)))
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            AdStore::load(dir.path().join("vector_store.json")).unwrap().len(),
            1
        );
    }
}
