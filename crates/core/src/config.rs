//! Configuration for ragstore collections and keyword stores.
//!
//! Tuning constants for query expansion and scoring are compile-time constants;
//! per-collection options live in [`StoreConfig`], which can be built in code
//! or deserialized from a JSON config file.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Default maximum number of texts per embedding-function call.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Queries with at most this many whitespace tokens get case-folded variants
/// (when they are purely alphabetic).
pub const SHORT_QUERY_MAX_TOKENS: usize = 3;

/// Adaptive similarity threshold for queries of at most 2 tokens.
pub const ADAPTIVE_FLOOR_TWO_TOKENS: f32 = 0.05;

/// Adaptive similarity threshold for queries of 3–4 tokens.
pub const ADAPTIVE_FLOOR_FOUR_TOKENS: f32 = 0.08;

/// Length bonus for queries of at most 2 tokens.
pub const LENGTH_BONUS_TWO_TOKENS: f32 = 1.2;

/// Length bonus for queries of 3–4 tokens.
pub const LENGTH_BONUS_FOUR_TOKENS: f32 = 1.1;

/// Length bonus for queries of 5–6 tokens.
pub const LENGTH_BONUS_SIX_TOKENS: f32 = 1.05;

/// Hits scoring below this quality are never returned.
pub const MIN_QUALITY_SCORE: f32 = 0.3;

/// Maximum characters kept as a keyword posting's content preview.
pub const CONTENT_PREVIEW_CHARS: usize = 200;

/// File name prefix of a vector collection file.
pub const VECTOR_FILE_PREFIX: &str = "vdb_";

/// File name suffix of a keyword store file.
pub const KEYWORD_FILE_SUFFIX: &str = "_keywords.bin";

/// Extension appended to a data file to name its update-signal sidecar.
pub const SIGNAL_FILE_EXTENSION: &str = "sync";

/// Metadata field naming a relation's source entity.
pub const RELATION_SOURCE_FIELD: &str = "src_id";

/// Metadata field naming a relation's target entity.
pub const RELATION_TARGET_FIELD: &str = "tgt_id";

fn default_batch_size() -> usize {
    DEFAULT_EMBEDDING_BATCH_SIZE
}

/// Construction options for a vector collection or keyword store.
///
/// `similarity_threshold` is optional only so that a missing value can be
/// reported by [`validate`](StoreConfig::validate) instead of being defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base directory for all store files.
    pub working_dir: PathBuf,
    /// Optional isolation key; changes file paths and the signaling identity.
    #[serde(default)]
    pub workspace: Option<String>,
    /// Logical collection name.
    pub namespace: String,
    /// Fixed embedding dimensionality `D`.
    pub embedding_dimension: usize,
    /// "Better-than" cosine similarity bound for vector queries.
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    /// Maximum texts per embedding-function call.
    #[serde(default = "default_batch_size")]
    pub embedding_batch_size: usize,
    /// Metadata field names persisted alongside each record.
    #[serde(default)]
    pub meta_fields: BTreeSet<String>,
}

impl StoreConfig {
    /// Creates a config with no workspace, no threshold and no metadata fields.
    pub fn new(working_dir: impl Into<PathBuf>, namespace: impl Into<String>, dimension: usize) -> Self {
        Self {
            working_dir: working_dir.into(),
            workspace: None,
            namespace: namespace.into(),
            embedding_dimension: dimension,
            similarity_threshold: None,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            meta_fields: BTreeSet::new(),
        }
    }

    /// Sets the isolation key.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Sets the base similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Sets the maximum texts per embedding call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.embedding_batch_size = batch_size;
        self
    }

    /// Sets the metadata allow-list.
    pub fn with_meta_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Loads a config from a JSON file.
    pub fn from_json_file(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let raw = std::fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Checks every option; only keyword stores may skip the threshold.
    pub fn validate(&self) -> StoreResult<()> {
        self.validate_common()?;
        let threshold = self.threshold()?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(StoreError::Config(format!(
                "similarity_threshold {} outside [0, 1]",
                threshold
            )));
        }
        if self.embedding_dimension == 0 || self.embedding_dimension > MAX_DIMENSION {
            return Err(StoreError::Config(format!(
                "embedding_dimension {} outside 1..={}",
                self.embedding_dimension, MAX_DIMENSION
            )));
        }
        if self.embedding_batch_size == 0 {
            return Err(StoreError::Config(
                "embedding_batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validation shared with keyword stores, which need no threshold or dimension.
    pub(crate) fn validate_common(&self) -> StoreResult<()> {
        if self.namespace.trim().is_empty() {
            return Err(StoreError::Config("namespace must not be empty".to_string()));
        }
        if matches!(&self.workspace, Some(ws) if ws.trim().is_empty()) {
            return Err(StoreError::Config(
                "workspace must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured threshold, or a configuration error if absent.
    pub fn threshold(&self) -> StoreResult<f32> {
        self.similarity_threshold.ok_or_else(|| {
            StoreError::Config(format!(
                "similarity_threshold is required for collection '{}'",
                self.namespace
            ))
        })
    }

    /// Namespace qualified by workspace; the identity used for signaling.
    pub fn final_namespace(&self) -> String {
        match &self.workspace {
            Some(ws) => format!("{}_{}", ws, self.namespace),
            None => self.namespace.clone(),
        }
    }

    /// `<working_dir>/[<workspace>/]vdb_<namespace>.json`
    pub fn vector_file_path(&self) -> PathBuf {
        let mut dir = self.working_dir.clone();
        if let Some(ws) = &self.workspace {
            dir.push(ws);
        }
        dir.join(format!("{}{}.json", VECTOR_FILE_PREFIX, self.namespace))
    }

    /// `<working_dir>/[<workspace>_]<namespace>_keywords.bin`
    pub fn keyword_file_path(&self) -> PathBuf {
        self.working_dir
            .join(format!("{}{}", self.final_namespace(), KEYWORD_FILE_SUFFIX))
    }
}
