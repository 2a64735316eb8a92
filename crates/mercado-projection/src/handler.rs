//! Transport adapter feeding deliveries to a projector.

use async_trait::async_trait;
use mercado_core::event::EventEnvelope;
use mercado_core::transport::{Delivery, DeliveryHandler, HandlerError};
use tracing::debug;

use crate::projector::{Projection, ProjectionError, Projector};

/// Topic pattern the affiliation projection subscribes to.
pub const AFFILIATION_PROJECTION_PATTERN: &str = "affiliation.#";

/// Topic pattern the producer application projection subscribes to.
pub const PRODUCER_APPLICATION_PROJECTION_PATTERN: &str = "producer_application.#";

/// Decodes deliveries and hands them to a [`Projector`].
///
/// A decision that overtook its submission is reported as
/// [`HandlerError::Deferred`], so the consumer parks it until the submission
/// has been projected instead of dropping it.
pub struct ProjectionHandler<P: Projection> {
    projector: Projector<P>,
}

impl<P: Projection> ProjectionHandler<P> {
    /// Wraps `projector`.
    #[must_use]
    pub fn new(projector: Projector<P>) -> Self {
        Self { projector }
    }
}

fn decode<P: Projection>(delivery: &Delivery) -> Result<P::Event, ProjectionError> {
    let envelope = EventEnvelope::from_slice(&delivery.payload)
        .map_err(|e| ProjectionError::Decode(e.to_string()))?;
    P::decode(envelope).map_err(|e| ProjectionError::Decode(e.to_string()))
}

#[async_trait]
impl<P: Projection> DeliveryHandler for ProjectionHandler<P> {
    fn name(&self) -> &'static str {
        P::NAME
    }

    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let result = match decode::<P>(delivery) {
            Ok(event) => self.projector.apply(&event).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(outcome) => {
                debug!(routing_key = %delivery.routing_key, ?outcome, "delivery projected");
                Ok(())
            }
            Err(e) if e.is_transient() => Err(HandlerError::Transient(e.to_string())),
            Err(e) if e.is_deferred() => Err(HandlerError::Deferred(e.to_string())),
            Err(e) => Err(HandlerError::Permanent(e.to_string())),
        }
    }
}
