//! Pathway Engine - versioned curriculum progression.
//!
//! Pathways are trees of steps gated by prerequisite and requirement rules
//! over other steps and earned badges. Published versions are immutable;
//! learners are pinned to the version they enrolled in, and their progress
//! is tracked per step, optionally scoped to a group.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
