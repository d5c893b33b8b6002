//! Exact nearest-neighbor index over cosine distance.
//!
//! The index is a flat Struct-of-Arrays arena: every live vector is stored
//! contiguously with a cached norm, and a query scans all of them. Collections
//! in this crate are small enough that exact search beats maintaining a graph,
//! and it never returns a neighbor the threshold would have admitted but a
//! graph walk missed.

/// Distance metric and chunked cosine kernel.
pub mod distance;
/// Flat vector arena with id mapping and bounded top-k search.
pub mod flat;

pub use distance::DistanceMetric;
pub use flat::{FlatIndex, Neighbor};
