//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidRule,
    InvalidOrder,
    InvalidStructure,

    // Not found errors
    PathwayNotFound,
    VersionNotFound,
    StepNotFound,
    EnrollmentNotFound,

    // Authoring errors
    ImmutableVersion,
    CyclicDependency,
    CyclicMove,
    NoDraft,

    // Progress errors
    InvalidStateTransition,
    StepLocked,
    RequirementNotMet,
    VersionMismatch,
    NoPublishedVersion,
    PathwayArchived,
    NotGroupMember,

    // Concurrency errors
    StaleProgress,
    ConcurrentUpdate,

    // Infrastructure errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Returns true if the caller may retry once the underlying fact changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::StepLocked
                | ErrorCode::RequirementNotMet
                | ErrorCode::StaleProgress
                | ErrorCode::ConcurrentUpdate
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidRule => "INVALID_RULE",
            ErrorCode::InvalidOrder => "INVALID_ORDER",
            ErrorCode::InvalidStructure => "INVALID_STRUCTURE",
            ErrorCode::PathwayNotFound => "PATHWAY_NOT_FOUND",
            ErrorCode::VersionNotFound => "VERSION_NOT_FOUND",
            ErrorCode::StepNotFound => "STEP_NOT_FOUND",
            ErrorCode::EnrollmentNotFound => "ENROLLMENT_NOT_FOUND",
            ErrorCode::ImmutableVersion => "IMMUTABLE_VERSION",
            ErrorCode::CyclicDependency => "CYCLIC_DEPENDENCY",
            ErrorCode::CyclicMove => "CYCLIC_MOVE",
            ErrorCode::NoDraft => "NO_DRAFT",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::StepLocked => "STEP_LOCKED",
            ErrorCode::RequirementNotMet => "REQUIREMENT_NOT_MET",
            ErrorCode::VersionMismatch => "VERSION_MISMATCH",
            ErrorCode::NoPublishedVersion => "NO_PUBLISHED_VERSION",
            ErrorCode::PathwayArchived => "PATHWAY_ARCHIVED",
            ErrorCode::NotGroupMember => "NOT_GROUP_MEMBER",
            ErrorCode::StaleProgress => "STALE_PROGRESS",
            ErrorCode::ConcurrentUpdate => "CONCURRENT_UPDATE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}
