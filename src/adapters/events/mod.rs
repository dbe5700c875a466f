//! Event bus adapters.
//!
//! - `InMemoryEventBus` - Synchronous, in-process bus

mod in_memory;

pub use in_memory::InMemoryEventBus;
