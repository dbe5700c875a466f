//! EventSubscriber port - inbound event routing.
//!
//! Badge awarded/revoked events from the issuance side reach the progress
//! engine through an `EventHandler` registered here.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for processing domain events.
///
/// Handlers must be idempotent: the same envelope may arrive more than once.
///
/// ```ignore
/// #[async_trait]
/// impl EventHandler for BadgeEventHandler {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
///         let payload: BadgeRevoked = event.payload_as()?;
///         // re-run the revocation cascade
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "BadgeEventHandler"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for subscribing handlers to event types.
pub trait EventSubscriber: Send + Sync {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    /// Subscribe one handler instance to several event types.
    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>);
}

/// Publishing plus subscribing.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
