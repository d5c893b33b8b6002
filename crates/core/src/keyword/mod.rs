//! Keyword store: an exact-token inverted index persisted to one file.

/// Keyword → document postings with additive scoring.
pub mod inverted_index;
/// File-backed keyword store with the cross-process reload protocol.
pub mod store;

pub use inverted_index::{KeywordHit, KeywordIndex, Posting};
pub use store::{KeywordStats, KeywordStore};
