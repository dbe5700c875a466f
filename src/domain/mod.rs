//! Domain layer - pure business logic with no external dependencies.
//!
//! - `foundation` - Shared value objects, IDs, errors and event plumbing
//! - `rule` - Prerequisite/requirement rules and their evaluation
//! - `pathway` - Versioned step trees and the pathway aggregate
//! - `progress` - Enrollment, step progress and group roll-ups

pub mod foundation;
pub mod pathway;
pub mod progress;
pub mod rule;
