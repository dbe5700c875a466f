//! Pathway domain events.
//!
//! - `PathwayVersionPublished` - A draft was frozen and became current

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, EventId, OrganizationId, PathwayId, PathwayVersionId, Timestamp};

/// Published when a draft becomes the pathway's current version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayVersionPublished {
    pub event_id: EventId,
    pub pathway_id: PathwayId,
    pub organization_id: OrganizationId,
    pub version_id: PathwayVersionId,
    pub version: u32,
    /// The version this one replaced as current, if any.
    pub previous_version_id: Option<PathwayVersionId>,
    pub step_count: usize,
    pub published_at: Timestamp,
}

domain_event!(
    PathwayVersionPublished,
    event_type = "pathway.version_published.v1",
    schema_version = 1,
    aggregate_id = pathway_id,
    aggregate_type = "Pathway",
    occurred_at = published_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DomainEvent, SerializableDomainEvent};

    #[test]
    fn version_published_envelope_carries_pathway_aggregate() {
        let event = PathwayVersionPublished {
            event_id: EventId::new(),
            pathway_id: PathwayId::new(),
            organization_id: OrganizationId::new(),
            version_id: PathwayVersionId::new(),
            version: 2,
            previous_version_id: None,
            step_count: 4,
            published_at: Timestamp::now(),
        };

        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event_type, "pathway.version_published.v1");
        assert_eq!(envelope.aggregate_type, "Pathway");
        assert_eq!(envelope.aggregate_id, event.pathway_id.to_string());
        assert_eq!(envelope.payload["version"], 2);
        assert_eq!(event.schema_version(), 1);
    }
}
