//! Authority Web: a quest and dialog content graph.
//!
//! Generates a branching quest web and its dialog graphs deterministically
//! from a domain catalog, validates a dataset's dependency graph and
//! cross-file references, and walks dialog graphs at runtime by applying
//! choice effects to an explicit game state.

pub mod core;
pub mod schema;

