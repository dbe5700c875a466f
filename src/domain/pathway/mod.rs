//! Pathway domain module.
//!
//! The versioned curriculum: a `Pathway` aggregate pointing at immutable
//! published `PathwayVersion`s and at most one open draft. Each version owns
//! an arena of `StepVersion` nodes with their prerequisite and requirement
//! rules.
//!
//! # Events
//!
//! - `PathwayVersionPublished` - Published when a draft becomes current

mod aggregate;
mod definition;
mod errors;
mod events;
pub mod graph;
mod step;
mod version;

pub use aggregate::{Pathway, PathwayStatus, MAX_NAME_LENGTH};
pub use definition::{PathwayDefinition, RuleDefinition, StepDefinition};
pub use errors::PathwayError;
pub use events::PathwayVersionPublished;
pub use step::{NewStep, StepPatch, StepVersion};
pub use version::{PathwayVersion, VersionStatus, MAX_TITLE_LENGTH};
