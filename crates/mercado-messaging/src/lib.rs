//! Mercado messaging: an in-process topic broker and the generic consumer
//! loop that feeds deliveries to handlers.

pub mod broker;
pub mod consumer;
pub mod topic;

pub use broker::InMemoryBroker;
pub use consumer::{DeliveryResult, consume, process_delivery, run_consumer};
pub use topic::matches;
