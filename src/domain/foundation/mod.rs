//! Foundation module - Shared domain primitives.
//!
//! Value objects, identifiers, the state machine trait, event plumbing and
//! the error vocabulary shared by the pathway and progress modules.

mod errors;
mod events;
mod ids;
mod percentage;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{
    domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent,
};
pub use ids::{BadgeClassId, GroupId, OrganizationId, PathwayId, PathwayVersionId, StepId, UserId};
pub use percentage::Percentage;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
