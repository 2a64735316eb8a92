//! Deterministic `EventFactory` for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use mercado_core::event_factory::EventFactory;
use uuid::Uuid;

/// Hands out sequential event IDs (`…0001`, `…0002`, …) and a settable time.
#[derive(Debug)]
pub struct FixedEventFactory {
    now: Mutex<DateTime<Utc>>,
    next_id: AtomicU64,
}

impl FixedEventFactory {
    /// Creates a factory whose clock reads `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            next_id: AtomicU64::new(1),
        }
    }

    /// Changes the time returned by subsequent `now()` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl EventFactory for FixedEventFactory {
    fn next_event_id(&self) -> Uuid {
        Uuid::from_u128(u128::from(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
