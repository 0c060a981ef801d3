//! # Ad Store Module
//!
//! Append-only table of previously seen ads, persisted as a JSON array of
//! `{message_id, channel_id, url, vector}` objects. The whole file is
//! rewritten after every append.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::similarity::SimilarityMatcher;
use crate::vectorizer::FeatureVector;

/// Default location of the persisted store
pub const DEFAULT_STORE_PATH: &str = "DataStore/vector_store.json";

/// One stored ad: where it was seen and how it encodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub message_id: i64,
    pub channel_id: i64,
    pub url: String,
    pub vector: FeatureVector,
}

/// In-memory ad table bound to its backing file
#[derive(Debug)]
pub struct AdStore {
    path: PathBuf,
    records: Vec<StoreRecord>,
}

impl AdStore {
    /// Load the store from `path`.
    ///
    /// A missing file is a first run and yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or does not
    /// hold a valid record list (including vectors of the wrong length).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            info!(path = %path.display(), "No existing ad store found, starting empty");
            return Ok(Self {
                path,
                records: Vec::new(),
            });
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read ad store {}", path.display()))?;
        let records: Vec<StoreRecord> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse ad store {}", path.display()))?
        };

        info!(path = %path.display(), records = records.len(), "Loaded ad store");
        Ok(Self { path, records })
    }

    /// Append a record and rewrite the backing file.
    ///
    /// If the file cannot be written the record is dropped again, so the
    /// in-memory table always matches what a reload would produce.
    pub fn append(&mut self, record: StoreRecord) -> Result<()> {
        self.records.push(record);
        if let Err(e) = self.flush() {
            self.records.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Every record, in insertion order
    pub fn all(&self) -> &[StoreRecord] {
        &self.records
    }

    /// Records whose vector is at least `threshold` similar to `vector`
    pub fn find_similar(
        &self,
        matcher: &SimilarityMatcher,
        vector: &FeatureVector,
        threshold: f64,
    ) -> Vec<StoreRecord> {
        matcher
            .find_similar(&self.records, vector, threshold)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the whole file through a temp file and rename
    fn flush(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;

        let json = serde_json::to_string_pretty(&self.records)
            .context("Failed to serialize ad store")?;

        let mut temp_file = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp_file
            .write_all(json.as_bytes())
            .context("Failed to write ad store")?;
        temp_file
            .persist(&self.path)
            .with_context(|| format!("Failed to replace ad store {}", self.path.display()))?;

        debug!(path = %self.path.display(), records = self.records.len(), "Ad store flushed");
        Ok(())
    }
}
