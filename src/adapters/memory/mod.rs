//! In-memory adapters for storage and collaborator ports.
//!
//! - `InMemoryPathwayRepository` - Pathways and version snapshots
//! - `InMemoryProgressStore` - Revision-checked progress rows
//! - `InMemoryBadgeFacts` - Badges held per user
//! - `InMemoryGroupDirectory` - Group membership

mod badge_facts;
mod group_directory;
mod pathway_repository;
mod progress_store;

pub use badge_facts::InMemoryBadgeFacts;
pub use group_directory::InMemoryGroupDirectory;
pub use pathway_repository::InMemoryPathwayRepository;
pub use progress_store::InMemoryProgressStore;
