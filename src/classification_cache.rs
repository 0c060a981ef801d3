//! # Classification Cache Module
//!
//! Thread-safe memo of "is this a rental ad?" answers keyed by message text.
//! The same ad is often cross-posted to several channels; caching the answer
//! saves a model call per repeat.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Bounded text → answer cache with first-in first-out eviction
///
/// # Thread Safety
///
/// Uses a `Mutex` internally, so one cache can be shared by every channel task.
#[derive(Debug)]
pub struct ClassificationCache {
    inner: Mutex<CacheState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    answers: HashMap<String, bool>,
    order: VecDeque<String>,
}

impl ClassificationCache {
    /// Create a cache holding at most `capacity` answers (0 disables caching)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheState::default()),
            capacity,
        }
    }

    /// Cached answer for `text`, if any
    pub fn get(&self, text: &str) -> Option<bool> {
        let state = self.lock();
        state.answers.get(text).copied()
    }

    /// Remember the answer for `text`, evicting the oldest entry when full
    pub fn insert(&self, text: &str, is_ad: bool) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.lock();
        if state.answers.insert(text.to_string(), is_ad).is_some() {
            return;
        }
        state.order.push_back(text.to_string());

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.answers.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new(crate::config::CLASSIFICATION_CACHE_CAPACITY)
    }
}
