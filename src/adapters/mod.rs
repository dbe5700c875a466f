//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to storage and collaborators:
//! - `events` - In-process event bus
//! - `memory` - In-memory stores, badge facts and group directory

pub mod events;
pub mod memory;

pub use events::InMemoryEventBus;
pub use memory::{InMemoryBadgeFacts, InMemoryGroupDirectory, InMemoryPathwayRepository, InMemoryProgressStore};
