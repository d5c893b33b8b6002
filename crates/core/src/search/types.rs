//! Scored record type for vector query results.

use crate::document::Metadata;
use serde::Serialize;

/// A record matched by a vector query, with the diagnostics that explain why.
///
/// The raw vector is never included. `quality_score` is
/// `max(0, 1 - distance) * length_bonus`; results are ordered by it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub id: String,
    /// Cosine distance of the best hit for this record.
    pub distance: f32,
    pub created_at: i64,
    pub quality_score: f32,
    /// The query variant whose embedding produced the hit.
    pub query_variant: String,
    /// Similarity threshold in effect for this query.
    pub effective_threshold: f32,
    pub metadata: Metadata,
}
