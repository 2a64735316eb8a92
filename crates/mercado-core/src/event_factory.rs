//! Event factory abstraction for determinism.
//!
//! Aggregates never mint identifiers or read the wall clock themselves. In
//! production this hands out random v4 UUIDs and system time; in tests a
//! fixed implementation is injected.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};

/// Supplies event identifiers and domain time to aggregates.
pub trait EventFactory: Send + Sync {
    /// Returns a fresh, never reused event identifier.
    fn next_event_id(&self) -> Uuid;

    /// Returns the current domain time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production event factory: random identifiers and the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEventFactory;

impl EventFactory for SystemEventFactory {
    fn next_event_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    fn now(&self) -> DateTime<Utc> {
        SystemClock.now()
    }
}
