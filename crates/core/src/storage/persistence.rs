//! On-disk formats for collection and keyword files.
//!
//! Collection files are JSON: a header (dimension, metric) plus one entry per
//! record holding the compressed vector. Keyword files are bincode followed by
//! a CRC32 footer `[magic "RKW1"][u32 CRC32 BE]`. Both are written atomically
//! via temp file + rename, so a crash never leaves a half-written file behind.

use crate::document::Metadata;
use crate::error::{StoreError, StoreResult};
use crate::index::DistanceMetric;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Magic bytes preceding the CRC32 footer of a keyword file.
const KEYWORD_CRC_MAGIC: &[u8; 4] = b"RKW1";

/// One record as stored in a collection file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub created_at: i64,
    /// Allow-listed metadata fields.
    #[serde(default)]
    pub metadata: Metadata,
    /// Output of [`crate::codec::compress`].
    pub vector: String,
}

/// Contents of a collection file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFile {
    pub embedding_dim: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    pub data: Vec<StoredRecord>,
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, bytes).map_err(|e| StoreError::io(&tmp_path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))
            .map_err(|e| StoreError::io(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Read `path`, returning `None` if it does not exist.
fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Delete `path`. Returns `false` if it was already gone.
pub fn remove_file(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

// ── Collection files ──────────────────────────────────────────────────

/// Save a collection file as JSON.
pub fn save_collection(path: &Path, file: &CollectionFile) -> StoreResult<()> {
    let bytes = serde_json::to_vec(file)?;
    write_atomic(path, &bytes)?;
    tracing::debug!("Wrote {} records ({} bytes) to {:?}", file.data.len(), bytes.len(), path);
    Ok(())
}

/// Load a collection file, or `None` if it has not been created yet.
pub fn load_collection(path: &Path) -> StoreResult<Option<CollectionFile>> {
    match read_optional(path)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

// ── Checksummed bincode files ─────────────────────────────────────────

/// Save `value` with bincode and append the CRC32 footer.
pub fn save_checksummed<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let payload = bincode::serialize(value)?;
    let crc = crc32fast::hash(&payload);

    let mut output = Vec::with_capacity(payload.len() + 8);
    output.extend_from_slice(&payload);
    output.extend_from_slice(KEYWORD_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());
    write_atomic(path, &output)?;

    tracing::debug!("Wrote {:?} ({} bytes, CRC32={:#010x})", path, payload.len(), crc);
    Ok(())
}

/// Load a file written by [`save_checksummed`], verifying the CRC32 when present.
/// Files without a footer are accepted with a warning.
pub fn load_checksummed<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let Some(raw) = read_optional(path)? else {
        return Ok(None);
    };

    let payload = if raw.len() >= 8 && &raw[raw.len() - 8..raw.len() - 4] == KEYWORD_CRC_MAGIC {
        let payload = &raw[..raw.len() - 8];
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&raw[raw.len() - 4..]);
        let stored = u32::from_be_bytes(crc_bytes);
        let computed = crc32fast::hash(payload);
        if computed != stored {
            return Err(StoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }
        payload
    } else {
        tracing::warn!("{:?} has no CRC32 footer (legacy format)", path);
        &raw[..]
    };

    Ok(Some(bincode::deserialize(payload)?))
}
