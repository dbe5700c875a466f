//! In-memory event bus.
//!
//! Synchronous, in-process delivery: `publish` awaits every subscribed
//! handler before returning, which keeps tests and the demo binary
//! deterministic. Published envelopes are kept for inspection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

/// In-memory event bus.
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.subscribe_all(&[BADGE_AWARDED, BADGE_REVOKED], badge_handler);
/// bus.publish(envelope).await?;
/// assert!(bus.has_event("step.completed.v1"));
/// ```
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
        }
    }

    // A handler that panicked mid-publish leaves plain data behind, so a
    // poisoned lock is still safe to read.

    /// All published envelopes, oldest first.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .collect()
    }

    pub fn clear(&self) {
        self.published.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn event_count(&self) -> usize {
        self.published.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.event_type == event_type)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());

        // Clone handlers to release lock before await points
        let type_handlers: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            handlers.get(&event.event_type).cloned().unwrap_or_default()
        };

        let mut errors = Vec::new();
        for handler in type_handlers {
            if let Err(e) = handler.handle(event.clone()).await {
                tracing::warn!(handler = handler.name(), event_type = %event.event_type, error = %e, "event handler failed");
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Handler errors: {}", errors.join(", ")),
            ));
        }

        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        for event_type in event_types {
            handlers
                .entry(event_type.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn envelope(event_type: &str, aggregate_id: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, aggregate_id, "Test", json!({}))
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &'static str {
            "CountingHandler"
        }
    }

    #[tokio::test]
    async fn publish_stores_event() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("step.completed.v1", "p-1")).await.unwrap();

        assert_eq!(bus.event_count(), 1);
        assert!(bus.has_event("step.completed.v1"));
    }

    #[tokio::test]
    async fn filters_by_type_and_aggregate() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("step.completed.v1", "p-1")).await.unwrap();
        bus.publish(envelope("pathway.completed.v1", "p-2")).await.unwrap();
        bus.publish(envelope("step.completed.v1", "p-2")).await.unwrap();

        assert_eq!(bus.events_of_type("step.completed.v1").len(), 2);
        assert_eq!(bus.events_for_aggregate("p-2").len(), 2);
    }

    #[tokio::test]
    async fn subscribe_all_registers_for_multiple_types() {
        let bus = InMemoryEventBus::new();
        let received = Arc::new(AtomicUsize::new(0));
        bus.subscribe_all(
            &["badge.awarded.v1", "badge.revoked.v1"],
            Arc::new(CountingHandler(received.clone())),
        );

        bus.publish(envelope("badge.awarded.v1", "1")).await.unwrap();
        bus.publish(envelope("badge.revoked.v1", "2")).await.unwrap();
        bus.publish(envelope("badge.expired.v1", "3")).await.unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn publish_all_keeps_order() {
        let bus = InMemoryEventBus::new();
        bus.publish_all(vec![envelope("a.v1", "1"), envelope("b.v1", "2")]).await.unwrap();

        let types: Vec<String> = bus.published_events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec!["a.v1", "b.v1"]);

        bus.clear();
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn handler_error_is_propagated() {
        struct FailingHandler;

        #[async_trait]
        impl EventHandler for FailingHandler {
            async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
                Err(DomainError::new(ErrorCode::InternalError, "Handler failed"))
            }
            fn name(&self) -> &'static str {
                "FailingHandler"
            }
        }

        let bus = InMemoryEventBus::new();
        bus.subscribe("badge.revoked.v1", Arc::new(FailingHandler));
        let result = bus.publish(envelope("badge.revoked.v1", "1")).await;

        assert!(result.unwrap_err().message.contains("FailingHandler"));
    }
}
