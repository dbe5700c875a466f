//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `PathwayRepository` - Pathways and their version snapshots
//! - `ProgressStore` - Enrollments and step progress, revision-checked
//!
//! ## Collaborator Ports
//!
//! - `BadgeFactProvider` - Whether a user holds a badge
//! - `GroupDirectory` - Group membership
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Port for publishing domain events
//! - `EventSubscriber` - Port for subscribing to domain events
//! - `EventHandler` - Handler that processes incoming events

mod badge_facts;
mod event_publisher;
mod event_subscriber;
mod group_directory;
mod pathway_repository;
mod progress_store;

pub use badge_facts::BadgeFactProvider;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use group_directory::GroupDirectory;
pub use pathway_repository::PathwayRepository;
pub use progress_store::{CommittedProgress, ProgressCommit, ProgressStore};
