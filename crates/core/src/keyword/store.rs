//! File-backed keyword store.

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::keyword::inverted_index::{KeywordHit, KeywordIndex};
use crate::signal::{FileSignal, UpdateSignal};
use crate::storage::persistence::{load_checksummed, save_checksummed};
use crate::storage::synced::{PersistOutcome, Snapshot, SyncedFile};
use std::path::Path;

impl Snapshot for KeywordIndex {
    type Context = ();

    fn empty(_: &()) -> Self {
        KeywordIndex::new()
    }

    fn load(_: &(), path: &Path) -> StoreResult<Self> {
        let Some(mut index) = load_checksummed::<KeywordIndex>(path)? else {
            tracing::info!("No keyword file at {:?}, starting empty", path);
            return Ok(KeywordIndex::new());
        };
        index.rebuild_reverse();
        tracing::info!(
            "Loaded keyword index {:?} ({} keywords, {} documents)",
            path,
            index.keyword_count(),
            index.document_count()
        );
        Ok(index)
    }

    fn save(&self, _: &(), path: &Path) -> StoreResult<()> {
        save_checksummed(path, self)
    }
}

/// Size of a keyword index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordStats {
    pub keywords: usize,
    pub documents: usize,
}

/// Inverted keyword index backed by one checksummed file.
pub struct KeywordStore {
    file: SyncedFile<KeywordIndex>,
}

impl KeywordStore {
    /// Open the keyword store described by `config`. Only the path options
    /// are used; dimension and threshold are ignored.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate_common()?;
        let signal = FileSignal::open(FileSignal::sidecar_for(&config.keyword_file_path()))?;
        Self::with_signal(config, Box::new(signal))
    }

    /// Open the keyword store with a caller-provided update signal.
    pub fn with_signal(config: &StoreConfig, signal: Box<dyn UpdateSignal>) -> StoreResult<Self> {
        config.validate_common()?;
        let file = SyncedFile::open(
            config.final_namespace(),
            config.keyword_file_path(),
            (),
            signal,
        )?;
        Ok(Self { file })
    }

    /// Workspace-qualified namespace.
    pub fn namespace(&self) -> &str {
        self.file.name()
    }

    /// Path of the keyword file.
    pub fn file_path(&self) -> &Path {
        self.file.path()
    }

    /// Index `content` under each of `keywords` for `doc_id`.
    pub fn index_keywords<S: AsRef<str>>(&self, doc_id: &str, keywords: &[S], content: &str) -> StoreResult<()> {
        self.file.refresh()?;
        let added = self.file.write().add_document(doc_id, keywords, content);
        tracing::debug!("Indexed '{}' under {} keywords in '{}'", doc_id, added, self.namespace());
        Ok(())
    }

    /// Documents matching any of `keywords`, by summed score, at most `limit`.
    pub fn search_keywords<S: AsRef<str>>(&self, keywords: &[S], limit: usize) -> Vec<KeywordHit> {
        self.file.refresh_for_read();
        self.file.read().search(keywords, limit)
    }

    /// Remove every posting of `doc_id`. Returns `true` if it was indexed.
    pub fn delete_document(&self, doc_id: &str) -> StoreResult<bool> {
        self.file.refresh()?;
        let removed = self.file.write().remove_document(doc_id);
        if removed {
            tracing::debug!("Removed '{}' from '{}'", doc_id, self.namespace());
        }
        Ok(removed)
    }

    /// Replace the keywords and content of `doc_id`.
    pub fn update_document<S: AsRef<str>>(&self, doc_id: &str, keywords: &[S], content: &str) -> StoreResult<()> {
        self.file.refresh()?;
        let mut index = self.file.write();
        index.remove_document(doc_id);
        index.add_document(doc_id, keywords, content);
        Ok(())
    }

    /// Keywords currently indexed for `doc_id`, sorted.
    pub fn document_keywords(&self, doc_id: &str) -> Vec<String> {
        self.file.refresh_for_read();
        self.file.read().document_keywords(doc_id)
    }

    /// Keyword and document counts.
    pub fn stats(&self) -> KeywordStats {
        self.file.refresh_for_read();
        let index = self.file.read();
        KeywordStats {
            keywords: index.keyword_count(),
            documents: index.document_count(),
        }
    }

    /// Commit the index to disk unless another process committed first.
    pub fn persist(&self) -> StoreResult<PersistOutcome> {
        self.file.persist().inspect_err(|e| {
            tracing::error!("Failed to persist keywords '{}': {}", self.namespace(), e);
        })
    }

    /// Alias of [`persist`](Self::persist).
    pub fn index_done_callback(&self) -> StoreResult<PersistOutcome> {
        self.persist()
    }

    /// Delete the keyword file, empty the index, and tell other processes.
    pub fn drop(&self) -> StoreResult<()> {
        self.file.drop_all().inspect_err(|e| {
            tracing::error!("Failed to drop keywords '{}': {}", self.namespace(), e);
        })
    }
}
