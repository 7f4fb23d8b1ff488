//! Core deterministic primitives.

pub mod rng;

// Re-export core types
pub use rng::{DeterministicRng, EntropySource};
