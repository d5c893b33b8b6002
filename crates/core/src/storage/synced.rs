//! In-memory state mirrored from one file and kept honest across processes.
//!
//! [`SyncedFile`] owns a store's in-memory state, the backing file path, and
//! the [`UpdateSignal`] for that file. It implements the reload protocol:
//!
//! 1. Before use, a handle takes the signal lock, and if another handle has
//!    committed since its last load it reloads from disk and clears its flag.
//! 2. On persist, a handle whose state is stale reloads instead of writing
//!    and reports [`PersistOutcome::RefusedStale`].
//! 3. Otherwise it writes the file and flags every other handle.

use crate::error::StoreResult;
use crate::signal::UpdateSignal;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::{Path, PathBuf};

/// Result of a persist attempt that did not hit an error.
#[must_use = "a refused persist means this handle's changes were discarded"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// In-memory state was written and other handles were flagged to reload.
    Committed,
    /// Another handle committed first; state was reloaded from disk instead.
    RefusedStale,
}

impl PersistOutcome {
    /// `true` for [`PersistOutcome::Committed`].
    pub fn is_committed(self) -> bool {
        self == PersistOutcome::Committed
    }
}

/// State that can be loaded from and saved to a single file.
pub trait Snapshot: Sized + Send + Sync {
    /// Construction parameters needed to build or validate the state.
    type Context: Send + Sync;

    fn empty(ctx: &Self::Context) -> Self;

    /// Load from `path`; a missing file yields [`Snapshot::empty`].
    fn load(ctx: &Self::Context, path: &Path) -> StoreResult<Self>;

    fn save(&self, ctx: &Self::Context, path: &Path) -> StoreResult<()>;
}

/// A [`Snapshot`] plus its file and update signal.
pub struct SyncedFile<T: Snapshot> {
    name: String,
    path: PathBuf,
    ctx: T::Context,
    signal: Box<dyn UpdateSignal>,
    state: RwLock<T>,
}

impl<T: Snapshot> SyncedFile<T> {
    /// Load the initial state under the signal lock and mark this handle in sync.
    pub fn open(
        name: String,
        path: PathBuf,
        ctx: T::Context,
        signal: Box<dyn UpdateSignal>,
    ) -> StoreResult<Self> {
        let state = {
            let _guard = signal.lock()?;
            let state = T::load(&ctx, &path)?;
            signal.clear_own_flag()?;
            state
        };
        Ok(Self {
            name,
            path,
            ctx,
            signal,
            state: RwLock::new(state),
        })
    }

    /// Name used in log messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from disk if another handle committed. Returns `true` on reload.
    ///
    /// The signal lock is held only for the check and the swap.
    pub fn refresh(&self) -> StoreResult<bool> {
        let _guard = self.signal.lock()?;
        if !self.signal.is_stale()? {
            return Ok(false);
        }
        self.reload_locked()?;
        tracing::info!("Reloaded '{}' from {:?} after update by another process", self.name, self.path);
        Ok(true)
    }

    /// [`refresh`](Self::refresh) for read paths: failures are logged and the
    /// current in-memory state keeps serving.
    pub fn refresh_for_read(&self) {
        if let Err(e) = self.refresh() {
            tracing::error!("Failed to reload '{}', serving in-memory state: {}", self.name, e);
        }
    }

    fn reload_locked(&self) -> StoreResult<()> {
        let fresh = T::load(&self.ctx, &self.path)?;
        *self.state.write() = fresh;
        self.signal.clear_own_flag()
    }

    /// Read access to the in-memory state. Call a refresh first.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.state.read()
    }

    /// Write access to the in-memory state; changes reach disk on persist.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.state.write()
    }

    /// Commit in-memory state unless another handle committed first.
    pub fn persist(&self) -> StoreResult<PersistOutcome> {
        let _guard = self.signal.lock()?;
        if self.signal.is_stale()? {
            tracing::warn!(
                "Refusing to persist '{}': {:?} was updated by another process, reloading",
                self.name,
                self.path
            );
            self.reload_locked()?;
            return Ok(PersistOutcome::RefusedStale);
        }

        self.state.read().save(&self.ctx, &self.path)?;
        self.signal.mark_stale_for_others()?;
        tracing::info!("Persisted '{}' to {:?}", self.name, self.path);
        Ok(PersistOutcome::Committed)
    }

    /// Delete the backing file, reset to empty, and flag every other handle.
    pub fn drop_all(&self) -> StoreResult<()> {
        let _guard = self.signal.lock()?;
        if !super::persistence::remove_file(&self.path)? {
            tracing::warn!("Drop of '{}': {:?} did not exist", self.name, self.path);
        }
        *self.state.write() = T::empty(&self.ctx);
        self.signal.mark_stale_for_others()?;
        tracing::info!("Dropped '{}' ({:?})", self.name, self.path);
        Ok(())
    }
}
