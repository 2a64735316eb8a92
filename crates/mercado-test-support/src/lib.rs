//! Shared test mocks and utilities for the Mercado accounts backend.

mod clock;
mod command_store;
mod event_factory;
mod projection_store;
mod transport;

pub use clock::{FixedClock, ManualClock};
pub use command_store::InMemoryCommandStore;
pub use event_factory::FixedEventFactory;
pub use projection_store::InMemoryProjectionStore;
pub use transport::{FailingTransport, RecordingTransport};
