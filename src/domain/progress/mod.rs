//! Progress domain module.
//!
//! Per-user progression through a pinned pathway version: the enrollment
//! record, per-context step rows, the derived element view and the group
//! roll-up.
//!
//! # Events
//!
//! - `PathwayEnrolled`
//! - `StepCompleted`
//! - `StepReopened`
//! - `PathwayCompleted`

mod element_progress;
mod errors;
mod events;
mod pathway_progress;
mod step_progress;
mod step_status;
mod summary;

pub use element_progress::{completion_counts, derive_elements, PathwayElementProgress};
pub use errors::ProgressError;
pub use events::{PathwayCompleted, PathwayEnrolled, StepCompleted, StepReopened};
pub use pathway_progress::{EnrollmentPeriod, EnrollmentStatus, PathwayProgress};
pub use step_progress::{StepProgress, StepProgressKey};
pub use step_status::StepStatus;
pub use summary::{GroupProgressSummary, GroupSummaryBuilder, StepStatusCounts, VersionSummary};
