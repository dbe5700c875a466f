//! BadgeEventHandler - feeds badge award/revocation events to the engine.
//!
//! Badges are issued and revoked elsewhere. Their events only tell the
//! engine that a fact changed; the engine re-reads the fact through
//! `BadgeFactProvider` before acting on it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::foundation::{
    domain_event, BadgeClassId, DomainError, ErrorCode, EventEnvelope, EventId, Timestamp, UserId,
};
use crate::ports::{EventHandler, EventSubscriber};

use super::progress_engine::ProgressEngine;

pub const BADGE_AWARDED: &str = "badge.awarded.v1";
pub const BADGE_REVOKED: &str = "badge.revoked.v1";

/// Payload of `badge.awarded.v1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeAwarded {
    pub event_id: EventId,
    pub user_id: UserId,
    pub badge_class_id: BadgeClassId,
    pub awarded_at: Timestamp,
}

domain_event!(
    BadgeAwarded,
    event_type = "badge.awarded.v1",
    schema_version = 1,
    aggregate_id = user_id,
    aggregate_type = "BadgeAssertion",
    occurred_at = awarded_at,
    event_id = event_id
);

/// Payload of `badge.revoked.v1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeRevoked {
    pub event_id: EventId,
    pub user_id: UserId,
    pub badge_class_id: BadgeClassId,
    pub revoked_at: Timestamp,
}

domain_event!(
    BadgeRevoked,
    event_type = "badge.revoked.v1",
    schema_version = 1,
    aggregate_id = user_id,
    aggregate_type = "BadgeAssertion",
    occurred_at = revoked_at,
    event_id = event_id
);

pub struct BadgeEventHandler {
    engine: Arc<ProgressEngine>,
}

impl BadgeEventHandler {
    pub fn new(engine: Arc<ProgressEngine>) -> Self {
        Self { engine }
    }

    /// Subscribes a handler for both badge event types.
    pub fn register(engine: Arc<ProgressEngine>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe_all(&[BADGE_AWARDED, BADGE_REVOKED], Arc::new(Self::new(engine)));
    }
}

fn invalid_payload(err: serde_json::Error) -> DomainError {
    DomainError::new(ErrorCode::ValidationFailed, format!("invalid badge event payload: {}", err))
}

#[async_trait]
impl EventHandler for BadgeEventHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        match event.event_type.as_str() {
            BADGE_AWARDED => {
                let payload: BadgeAwarded = event.payload_as().map_err(invalid_payload)?;
                let touched = self
                    .engine
                    .handle_badge_awarded(&payload.user_id, payload.badge_class_id)
                    .await?;
                debug!(user_id = %payload.user_id, enrollments = touched.len(), "badge award applied");
            }
            BADGE_REVOKED => {
                let payload: BadgeRevoked = event.payload_as().map_err(invalid_payload)?;
                let touched = self
                    .engine
                    .handle_badge_revoked(&payload.user_id, payload.badge_class_id)
                    .await?;
                debug!(user_id = %payload.user_id, enrollments = touched.len(), "badge revocation applied");
            }
            other => {
                debug!(event_type = other, "ignoring event");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "BadgeEventHandler"
    }
}
