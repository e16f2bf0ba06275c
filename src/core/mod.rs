//! Core deterministic primitives.
//!
//! Everything the simulation draws randomness from lives here, so a session
//! can be replayed from its seed and its command log.

pub mod rng;

// Re-export core types
pub use rng::{DeterministicRng, derive_session_seed};
