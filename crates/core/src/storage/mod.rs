//! Storage layer: vector collections, file formats, and the cross-process
//! reload protocol.
//!
//! Data lives in memory and reaches disk only on an explicit persist. Every
//! file is paired with an [`UpdateSignal`](crate::signal::UpdateSignal) so a
//! handle notices when another process committed and reloads before use.

/// On-disk formats: JSON collection files and checksummed bincode files.
pub mod persistence;
/// Snapshot state mirrored from one file with refuse-stale commits.
pub mod synced;
/// File-backed vector collection with adaptive queries.
pub mod vector_store;

pub use persistence::{CollectionFile, StoredRecord};
pub use synced::{PersistOutcome, Snapshot, SyncedFile};
pub use vector_store::{CollectionState, VectorStore};
