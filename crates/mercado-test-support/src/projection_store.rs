//! In-memory read-model store with a processed-event ledger.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mercado_core::error::DomainError;
use mercado_core::projection::{CommitOutcome, ProcessedEvent, ProjectionStore, ReadModel};
use uuid::Uuid;

#[derive(Debug)]
struct Inner<V> {
    views: HashMap<String, V>,
    ledger: Vec<ProcessedEvent>,
    fail_commits: bool,
}

/// An in-memory [`ProjectionStore`].
///
/// Writes the view first and the ledger entry last, so an injected failure
/// never leaves a ledger entry behind.
#[derive(Debug)]
pub struct InMemoryProjectionStore<V> {
    inner: Mutex<Inner<V>>,
}

impl<V> Default for InMemoryProjectionStore<V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                views: HashMap::new(),
                ledger: Vec::new(),
                fail_commits: false,
            }),
        }
    }
}

impl<V: ReadModel> InMemoryProjectionStore<V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail before writing anything.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_commits(&self, fail: bool) {
        self.inner.lock().unwrap().fail_commits = fail;
    }

    /// Puts a view in place without touching the ledger.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed_view(&self, view: V) {
        self.inner
            .lock()
            .unwrap()
            .views
            .insert(view.key().to_owned(), view);
    }

    /// Snapshot of one view.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn view(&self, key: &str) -> Option<V> {
        self.inner.lock().unwrap().views.get(key).cloned()
    }

    /// Snapshot of every view, in no particular order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn views(&self) -> Vec<V> {
        self.inner.lock().unwrap().views.values().cloned().collect()
    }

    /// Snapshot of the ledger, in commit order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn ledger(&self) -> Vec<ProcessedEvent> {
        self.inner.lock().unwrap().ledger.clone()
    }
}

#[async_trait]
impl<V: ReadModel + 'static> ProjectionStore<V> for InMemoryProjectionStore<V> {
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, DomainError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.ledger.iter().any(|p| p.event_id == event_id))
    }

    async fn load(&self, aggregate_id: &str) -> Result<Option<V>, DomainError> {
        Ok(self.inner.lock().unwrap().views.get(aggregate_id).cloned())
    }

    async fn commit(
        &self,
        view: Option<&V>,
        processed: &ProcessedEvent,
    ) -> Result<CommitOutcome, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.ledger.iter().any(|p| p.event_id == processed.event_id) {
            return Ok(CommitOutcome::AlreadyProcessed);
        }
        if inner.fail_commits {
            return Err(DomainError::Infrastructure("projection store unavailable".into()));
        }
        if let Some(view) = view {
            let newer = inner
                .views
                .get(view.key())
                .is_none_or(|current| current.version() <= view.version());
            if newer {
                inner.views.insert(view.key().to_owned(), view.clone());
            }
        }
        inner.ledger.push(processed.clone());
        Ok(CommitOutcome::Committed)
    }
}
