//! Progress domain events.
//!
//! - `PathwayEnrolled` - User enrolled (or re-enrolled) in a pathway
//! - `StepCompleted` - A step was completed in some context
//! - `StepReopened` - A completed step fell back after a badge revocation
//! - `PathwayCompleted` - Every countable step of the pinned version is done

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    domain_event, BadgeClassId, EventId, GroupId, PathwayId, PathwayVersionId, StepId, Timestamp, UserId,
};

// ════════════════════════════════════════════════════════════════════════════
// PathwayEnrolled
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayEnrolled {
    pub event_id: EventId,
    pub user_id: UserId,
    pub pathway_id: PathwayId,
    pub version_id: PathwayVersionId,
    pub version: u32,
    pub enrolled_at: Timestamp,
}

domain_event!(
    PathwayEnrolled,
    event_type = "pathway.enrolled.v1",
    schema_version = 1,
    aggregate_id = pathway_id,
    aggregate_type = "PathwayProgress",
    occurred_at = enrolled_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// StepCompleted
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompleted {
    pub event_id: EventId,
    pub user_id: UserId,
    pub pathway_id: PathwayId,
    pub version_id: PathwayVersionId,
    pub step_id: StepId,
    pub group_id: Option<GroupId>,
    pub milestone: bool,
    pub completed_at: Timestamp,
}

domain_event!(
    StepCompleted,
    event_type = "step.completed.v1",
    schema_version = 1,
    aggregate_id = pathway_id,
    aggregate_type = "PathwayProgress",
    occurred_at = completed_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// StepReopened
// ════════════════════════════════════════════════════════════════════════════

/// Published when revoking a badge pulls a completed step back to
/// IN_PROGRESS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReopened {
    pub event_id: EventId,
    pub user_id: UserId,
    pub pathway_id: PathwayId,
    pub version_id: PathwayVersionId,
    pub step_id: StepId,
    pub group_id: Option<GroupId>,
    pub revoked_badge_id: BadgeClassId,
    pub reopened_at: Timestamp,
}

domain_event!(
    StepReopened,
    event_type = "step.reopened.v1",
    schema_version = 1,
    aggregate_id = pathway_id,
    aggregate_type = "PathwayProgress",
    occurred_at = reopened_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// PathwayCompleted
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayCompleted {
    pub event_id: EventId,
    pub user_id: UserId,
    pub pathway_id: PathwayId,
    pub version_id: PathwayVersionId,
    pub version: u32,
    pub completed_at: Timestamp,
}

domain_event!(
    PathwayCompleted,
    event_type = "pathway.completed.v1",
    schema_version = 1,
    aggregate_id = pathway_id,
    aggregate_type = "PathwayProgress",
    occurred_at = completed_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SerializableDomainEvent;

    #[test]
    fn step_completed_payload_round_trips_through_envelope() {
        let event = StepCompleted {
            event_id: EventId::new(),
            user_id: UserId::new("learner").unwrap(),
            pathway_id: PathwayId::new(),
            version_id: PathwayVersionId::new(),
            step_id: StepId::new(),
            group_id: None,
            milestone: false,
            completed_at: Timestamp::now(),
        };

        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event_type, "step.completed.v1");
        assert_eq!(envelope.event_id, event.event_id);

        let decoded: StepCompleted = envelope.payload_as().unwrap();
        assert_eq!(decoded.step_id, event.step_id);
        assert_eq!(decoded.user_id, event.user_id);
    }
}
