//! Vector query planning and scored results.
//!
//! A raw query string is expanded into case variants, given an adaptive
//! similarity threshold and a length bonus, and every index hit is gated by
//! distance and quality before it reaches the caller.

/// Query variants, adaptive threshold, length bonus and hit ranking.
pub mod query;
/// Scored record returned by vector queries.
pub mod types;

pub use query::{QueryPlan, RawHit};
pub use types::ScoredRecord;
