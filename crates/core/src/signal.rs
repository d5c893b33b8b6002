//! Cross-process update signal.
//!
//! Each store handle remembers the generation of the on-disk file it last
//! loaded. A writer that commits bumps the shared generation, which makes the
//! file look stale to every other handle but not to itself. The protocol
//! checks and swaps happen under the signal's mutual-exclusion lock.
//!
//! [`FileSignal`] keeps the shared generation in a sidecar file guarded by an
//! exclusive advisory lock, so it works across OS processes. [`MemorySignal`]
//! is the in-process equivalent used by tests and single-process deployments.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Staleness flag plus lock shared by every handle on one collection.
pub trait UpdateSignal: Send + Sync + fmt::Debug {
    /// Acquire the collection lock. Released when the guard drops.
    fn lock(&self) -> StoreResult<SignalGuard<'_>>;

    /// Whether another handle committed since this handle last loaded.
    fn is_stale(&self) -> StoreResult<bool>;

    /// Flag the collection as changed for every other handle.
    fn mark_stale_for_others(&self) -> StoreResult<()>;

    /// Record that this handle is now in sync with the on-disk file.
    fn clear_own_flag(&self) -> StoreResult<()>;
}

/// Held lock on an [`UpdateSignal`].
#[must_use = "the signal lock is released as soon as the guard is dropped"]
pub struct SignalGuard<'a> {
    inner: GuardInner<'a>,
}

enum GuardInner<'a> {
    File(File),
    // Held only so the mutex unlocks on drop.
    Memory { _held: MutexGuard<'a, ()> },
}

impl Drop for SignalGuard<'_> {
    fn drop(&mut self) {
        if let GuardInner::File(file) = &self.inner {
            if let Err(e) = FileExt::unlock(file) {
                tracing::warn!("failed to release signal lock: {}", e);
            }
        }
    }
}

impl fmt::Debug for SignalGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            GuardInner::File(_) => "file",
            GuardInner::Memory { .. } => "memory",
        };
        f.debug_struct("SignalGuard").field("kind", &kind).finish()
    }
}

// ── File-backed signal ────────────────────────────────────────────────

/// Update signal stored in a sidecar file next to the data file.
///
/// The sidecar holds the shared generation as 8 little-endian bytes. Every
/// lock acquisition opens a fresh descriptor, so threads of one process
/// exclude each other the same way separate processes do.
#[derive(Debug)]
pub struct FileSignal {
    path: PathBuf,
    seen: AtomicU64,
}

impl FileSignal {
    /// Opens (creating if needed) the sidecar at `path` and adopts its
    /// current generation.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let signal = Self {
            path,
            seen: AtomicU64::new(0),
        };
        let generation = signal.shared_generation()?;
        signal.seen.store(generation, Ordering::SeqCst);
        Ok(signal)
    }

    /// Sidecar path for a data file: `<data file>.sync`.
    pub fn sidecar_for(data_file: &Path) -> PathBuf {
        let mut name = data_file.as_os_str().to_owned();
        name.push(".");
        name.push(crate::config::SIGNAL_FILE_EXTENSION);
        PathBuf::from(name)
    }

    /// Path of the sidecar file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> StoreResult<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))
    }

    fn shared_generation(&self) -> StoreResult<u64> {
        let mut file = self.open_file()?;
        let mut buf = Vec::with_capacity(8);
        file.read_to_end(&mut buf)
            .map_err(|e| StoreError::io(&self.path, e))?;
        if buf.len() < 8 {
            return Ok(0);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[..8]);
        Ok(u64::from_le_bytes(bytes))
    }

    fn write_generation(&self, generation: u64) -> StoreResult<()> {
        let mut file = self.open_file()?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(&generation.to_le_bytes()))
            .and_then(|_| file.sync_data())
            .map_err(|e| StoreError::io(&self.path, e))
    }
}

impl UpdateSignal for FileSignal {
    fn lock(&self) -> StoreResult<SignalGuard<'_>> {
        let file = self.open_file()?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(SignalGuard {
            inner: GuardInner::File(file),
        })
    }

    fn is_stale(&self) -> StoreResult<bool> {
        Ok(self.shared_generation()? != self.seen.load(Ordering::SeqCst))
    }

    fn mark_stale_for_others(&self) -> StoreResult<()> {
        let next = self.shared_generation()?.wrapping_add(1);
        self.write_generation(next)?;
        self.seen.store(next, Ordering::SeqCst);
        Ok(())
    }

    fn clear_own_flag(&self) -> StoreResult<()> {
        let current = self.shared_generation()?;
        self.seen.store(current, Ordering::SeqCst);
        Ok(())
    }
}

// ── In-process signal ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SignalHub {
    lock: Mutex<()>,
    generation: AtomicU64,
}

/// In-process update signal. Handles created with [`peer`](MemorySignal::peer)
/// share one lock and one generation counter.
#[derive(Debug)]
pub struct MemorySignal {
    hub: Arc<SignalHub>,
    seen: AtomicU64,
}

impl MemorySignal {
    /// Signal on a fresh hub, unrelated to any other.
    pub fn new() -> Self {
        Self {
            hub: Arc::new(SignalHub::default()),
            seen: AtomicU64::new(0),
        }
    }

    /// A new handle on the same hub, in sync with its current generation.
    pub fn peer(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            seen: AtomicU64::new(self.hub.generation.load(Ordering::SeqCst)),
        }
    }
}

impl Default for MemorySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSignal for MemorySignal {
    fn lock(&self) -> StoreResult<SignalGuard<'_>> {
        Ok(SignalGuard {
            inner: GuardInner::Memory {
                _held: self.hub.lock.lock(),
            },
        })
    }

    fn is_stale(&self) -> StoreResult<bool> {
        Ok(self.hub.generation.load(Ordering::SeqCst) != self.seen.load(Ordering::SeqCst))
    }

    fn mark_stale_for_others(&self) -> StoreResult<()> {
        let next = self.hub.generation.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        self.seen.store(next, Ordering::SeqCst);
        Ok(())
    }

    fn clear_own_flag(&self) -> StoreResult<()> {
        self.seen
            .store(self.hub.generation.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }
}
