//! Pathway authoring errors.
//!
//! Everything here is raised at the authoring boundary: a failed validation
//! never leaves a half-edited draft behind and never reaches the progress
//! engine.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, PathwayId, PathwayVersionId, StepId};

/// Pathway- and version-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathwayError {
    #[error("pathway {0} not found")]
    NotFound(PathwayId),

    #[error("pathway version {0} not found")]
    VersionNotFound(PathwayVersionId),

    #[error("step {step_id} not found in version {version_id}")]
    StepNotFound {
        version_id: PathwayVersionId,
        step_id: StepId,
    },

    #[error("invalid {kind} rule on step {step_id}: {reason}")]
    InvalidRule {
        step_id: StepId,
        kind: String,
        reason: String,
    },

    #[error("version {version} ({version_id}) of pathway {pathway_id} is published and cannot be modified")]
    ImmutableVersion {
        pathway_id: PathwayId,
        version_id: PathwayVersionId,
        version: u32,
    },

    #[error("prerequisite cycle in version {version_id} through {} step(s)", .cycle.len())]
    CyclicDependency {
        version_id: PathwayVersionId,
        cycle: Vec<StepId>,
    },

    #[error("moving step {step_id} under {new_parent_id} would make it its own ancestor")]
    CyclicMove {
        step_id: StepId,
        new_parent_id: StepId,
    },

    #[error("invalid ordering under {parent}: {reason}")]
    InvalidOrder { parent: String, reason: String },

    #[error("invalid structure in version {version_id}: {reason}")]
    InvalidStructure {
        version_id: PathwayVersionId,
        reason: String,
    },

    #[error("pathway {0} has no draft to publish and no published version")]
    NoDraft(PathwayId),

    #[error("cannot {attempted} a pathway that is {current}")]
    InvalidState { current: String, attempted: String },

    #[error("validation failed on '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    #[error("storage failure: {0}")]
    Infrastructure(String),
}

impl PathwayError {
    pub fn step_not_found(version_id: PathwayVersionId, step_id: StepId) -> Self {
        PathwayError::StepNotFound { version_id, step_id }
    }

    pub fn invalid_order(parent: Option<StepId>, reason: impl Into<String>) -> Self {
        PathwayError::InvalidOrder {
            parent: parent.map_or_else(|| "root".to_string(), |p| p.to_string()),
            reason: reason.into(),
        }
    }

    pub fn invalid_structure(version_id: PathwayVersionId, reason: impl Into<String>) -> Self {
        PathwayError::InvalidStructure {
            version_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        PathwayError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PathwayError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        PathwayError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PathwayError::NotFound(_) => ErrorCode::PathwayNotFound,
            PathwayError::VersionNotFound(_) => ErrorCode::VersionNotFound,
            PathwayError::StepNotFound { .. } => ErrorCode::StepNotFound,
            PathwayError::InvalidRule { .. } => ErrorCode::InvalidRule,
            PathwayError::ImmutableVersion { .. } => ErrorCode::ImmutableVersion,
            PathwayError::CyclicDependency { .. } => ErrorCode::CyclicDependency,
            PathwayError::CyclicMove { .. } => ErrorCode::CyclicMove,
            PathwayError::InvalidOrder { .. } => ErrorCode::InvalidOrder,
            PathwayError::InvalidStructure { .. } => ErrorCode::InvalidStructure,
            PathwayError::NoDraft(_) => ErrorCode::NoDraft,
            PathwayError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            PathwayError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            PathwayError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<PathwayError> for DomainError {
    fn from(err: PathwayError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let base = DomainError::new(code, message);
        match err {
            PathwayError::NotFound(id) | PathwayError::NoDraft(id) => {
                base.with_detail("pathway_id", id.to_string())
            }
            PathwayError::VersionNotFound(id) => base.with_detail("version_id", id.to_string()),
            PathwayError::StepNotFound { version_id, step_id } => base
                .with_detail("version_id", version_id.to_string())
                .with_detail("step_id", step_id.to_string()),
            PathwayError::ImmutableVersion {
                pathway_id,
                version_id,
                version,
            } => base
                .with_detail("pathway_id", pathway_id.to_string())
                .with_detail("version_id", version_id.to_string())
                .with_detail("version", version.to_string()),
            PathwayError::CyclicMove {
                step_id,
                new_parent_id,
            } => base
                .with_detail("step_id", step_id.to_string())
                .with_detail("new_parent_id", new_parent_id.to_string()),
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_version_maps_to_code_and_details() {
        let err = PathwayError::ImmutableVersion {
            pathway_id: PathwayId::new(),
            version_id: PathwayVersionId::new(),
            version: 3,
        };
        assert_eq!(err.code(), ErrorCode::ImmutableVersion);

        let domain: DomainError = err.into();
        assert_eq!(domain.details.get("version"), Some(&"3".to_string()));
    }

    #[test]
    fn invalid_order_names_root_parent() {
        let err = PathwayError::invalid_order(None, "duplicate ids");
        assert_eq!(err.to_string(), "invalid ordering under root: duplicate ids");
    }

    #[test]
    fn cyclic_dependency_reports_cycle_length() {
        let err = PathwayError::CyclicDependency {
            version_id: PathwayVersionId::new(),
            cycle: vec![StepId::new(), StepId::new()],
        };
        assert!(err.to_string().contains("2 step(s)"));
        assert_eq!(err.code(), ErrorCode::CyclicDependency);
    }
}
