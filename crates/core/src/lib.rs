//! # ragstore-core
//!
//! Embeddable, file-backed storage for retrieval-augmented generation:
//! a vector store with adaptive-threshold similarity queries and a keyword
//! store backed by an exact-token inverted index.
//!
//! Each store lives in memory and is written to a single file on an explicit
//! persist. Several processes may open the same files; an update signal next
//! to every file makes a handle reload after another process commits, and
//! refuses to overwrite a commit it has not seen.

/// Vector compression: f16 → zlib → base64.
pub mod codec;
/// Configuration constants and the per-store [`StoreConfig`](config::StoreConfig).
pub mod config;
/// Record types, metadata allow-listing and content-hash ids.
pub mod document;
/// Caller-supplied embedding function.
pub mod embedding;
/// Error type shared by every store operation.
pub mod error;
/// Exact cosine nearest-neighbor index.
pub mod index;
/// Keyword store: inverted index and its file-backed wrapper.
pub mod keyword;
/// Query variants, adaptive thresholds and result ranking.
pub mod search;
/// Cross-process update signal: shared generation plus exclusive lock.
pub mod signal;
/// Storage layer: file formats, reload protocol and the vector store.
pub mod storage;

pub use config::StoreConfig;
pub use document::{compute_hash_id, entity_id, Metadata, MetadataValue, UpsertRecord, VectorRecord};
pub use embedding::EmbeddingFunc;
pub use error::{StoreError, StoreResult};
pub use keyword::{KeywordHit, KeywordStats, KeywordStore};
pub use search::ScoredRecord;
pub use signal::{FileSignal, MemorySignal, UpdateSignal};
pub use storage::{PersistOutcome, VectorStore};
