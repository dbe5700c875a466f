//! Progress engine errors.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, GroupId, PathwayId, PathwayVersionId, StepId, UserId};
use crate::domain::pathway::PathwayError;
use crate::domain::rule::DependencyRef;

use super::StepStatus;

fn join(deps: &[DependencyRef]) -> String {
    deps.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
}

/// Errors raised by enrollment and step progression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("user {user_id} is not enrolled in pathway {pathway_id}")]
    NotEnrolled { user_id: UserId, pathway_id: PathwayId },

    #[error("step {0} not found in any pathway version")]
    StepNotFound(StepId),

    #[error("step {step_id} is locked; waiting on {}", join(.missing))]
    StepLocked {
        step_id: StepId,
        missing: Vec<DependencyRef>,
    },

    #[error("step {step_id} cannot be completed; missing {}", join(.missing))]
    RequirementNotMet {
        step_id: StepId,
        missing: Vec<DependencyRef>,
    },

    #[error("pathway {pathway_id}: enrolled against version {pinned_version}, step belongs to version {step_version}")]
    VersionMismatch {
        pathway_id: PathwayId,
        pinned_version_id: PathwayVersionId,
        pinned_version: u32,
        step_version_id: PathwayVersionId,
        step_version: u32,
    },

    #[error("{entity} {key} changed since it was read (expected revision {expected}, found {actual})")]
    StaleProgress {
        entity: &'static str,
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("gave up updating progress of {user_id} on pathway {pathway_id} after {attempts} attempt(s)")]
    ConcurrentUpdate {
        user_id: UserId,
        pathway_id: PathwayId,
        attempts: u32,
    },

    #[error("pathway {0} has no published version")]
    NoPublishedVersion(PathwayId),

    #[error("pathway {0} is archived")]
    PathwayArchived(PathwayId),

    #[error("user {user_id} is not a member of group {group_id}")]
    NotGroupMember { user_id: UserId, group_id: GroupId },

    #[error("step {step_id} cannot move from {from} to {to}")]
    InvalidTransition {
        step_id: StepId,
        from: StepStatus,
        to: StepStatus,
    },

    #[error(transparent)]
    Pathway(#[from] PathwayError),

    #[error("storage failure: {0}")]
    Infrastructure(String),
}

impl ProgressError {
    pub fn stale(entity: &'static str, key: impl ToString, expected: u64, actual: u64) -> Self {
        ProgressError::StaleProgress {
            entity,
            key: key.to_string(),
            expected,
            actual,
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ProgressError::Infrastructure(message.into())
    }

    /// True for the optimistic-concurrency conflict the engine retries.
    pub fn is_stale(&self) -> bool {
        matches!(self, ProgressError::StaleProgress { .. })
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProgressError::NotEnrolled { .. } => ErrorCode::EnrollmentNotFound,
            ProgressError::StepNotFound(_) => ErrorCode::StepNotFound,
            ProgressError::StepLocked { .. } => ErrorCode::StepLocked,
            ProgressError::RequirementNotMet { .. } => ErrorCode::RequirementNotMet,
            ProgressError::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            ProgressError::StaleProgress { .. } => ErrorCode::StaleProgress,
            ProgressError::ConcurrentUpdate { .. } => ErrorCode::ConcurrentUpdate,
            ProgressError::NoPublishedVersion(_) => ErrorCode::NoPublishedVersion,
            ProgressError::PathwayArchived(_) => ErrorCode::PathwayArchived,
            ProgressError::NotGroupMember { .. } => ErrorCode::NotGroupMember,
            ProgressError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            ProgressError::Pathway(inner) => inner.code(),
            ProgressError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<ProgressError> for DomainError {
    fn from(err: ProgressError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            ProgressError::Pathway(inner) => inner.into(),
            ProgressError::NotEnrolled { user_id, pathway_id } => DomainError::new(code, message)
                .with_detail("user_id", user_id.to_string())
                .with_detail("pathway_id", pathway_id.to_string()),
            ProgressError::StepLocked { step_id, missing }
            | ProgressError::RequirementNotMet { step_id, missing } => DomainError::new(code, message)
                .with_detail("step_id", step_id.to_string())
                .with_detail("missing", join(&missing)),
            ProgressError::VersionMismatch {
                pathway_id,
                pinned_version,
                step_version,
                ..
            } => DomainError::new(code, message)
                .with_detail("pathway_id", pathway_id.to_string())
                .with_detail("expected_version", pinned_version.to_string())
                .with_detail("actual_version", step_version.to_string()),
            ProgressError::NoPublishedVersion(id) | ProgressError::PathwayArchived(id) => {
                DomainError::new(code, message).with_detail("pathway_id", id.to_string())
            }
            ProgressError::NotGroupMember { user_id, group_id } => DomainError::new(code, message)
                .with_detail("user_id", user_id.to_string())
                .with_detail("group_id", group_id.to_string()),
            _ => DomainError::new(code, message),
        }
    }
}
