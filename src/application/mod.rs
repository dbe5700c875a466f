//! Application layer - authoring and progression services.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//!
//! - `VersionStore` - Draft/publish lifecycle and draft edits
//! - `ProgressEngine` - Enrollment, step progression, reconciliation, summaries
//! - `BadgeEventHandler` - Routes inbound badge events to the engine
//! - `LineageLocks` - Per-pathway publish/enroll exclusion

mod badge_events;
mod lineage;
mod progress_engine;
mod version_store;
mod workset;

pub use badge_events::{BadgeAwarded, BadgeEventHandler, BadgeRevoked, BADGE_AWARDED, BADGE_REVOKED};
pub use lineage::LineageLocks;
pub use progress_engine::{ProgressEngine, Reconciled, ReopenedStep, StepCompletion};
pub use version_store::{ImportedPathway, VersionStore};
