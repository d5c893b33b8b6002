//! File-backed vector collection.
//!
//! A [`VectorStore`] keeps every record twice: in its persisted form (metadata
//! plus compressed vector) and, when the vector decodes, as a live `f32`
//! vector in a [`FlatIndex`]. Mutations are staged in memory and reach disk
//! only through [`VectorStore::persist`].

use crate::codec;
use crate::config::{self, StoreConfig};
use crate::document::{entity_id, MetaFields, UpsertRecord, VectorRecord};
use crate::embedding::EmbeddingFunc;
use crate::error::{StoreError, StoreResult};
use crate::index::{DistanceMetric, FlatIndex};
use crate::search::{QueryPlan, RawHit, ScoredRecord};
use crate::signal::{FileSignal, UpdateSignal};
use crate::storage::persistence::{load_collection, save_collection, CollectionFile, StoredRecord};
use crate::storage::synced::{PersistOutcome, Snapshot, SyncedFile};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// In-memory contents of one collection.
#[derive(Debug, Clone)]
pub struct CollectionState {
    records: HashMap<String, StoredRecord>,
    index: FlatIndex,
}

impl CollectionState {
    /// Number of stored records, including any whose vector failed to decode.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn remove(&mut self, id: &str) -> bool {
        self.index.remove(id);
        self.records.remove(id).is_some()
    }

    /// The record for `id` if it exists and its vector is usable.
    fn available(&self, id: &str) -> Option<&StoredRecord> {
        let record = self.records.get(id)?;
        if !self.index.contains(id) {
            tracing::warn!("Record '{}' is unavailable: its stored vector could not be decoded", id);
            return None;
        }
        Some(record)
    }
}

impl Snapshot for CollectionState {
    /// Embedding dimension.
    type Context = usize;

    fn empty(dimension: &usize) -> Self {
        Self {
            records: HashMap::new(),
            index: FlatIndex::new(*dimension, DistanceMetric::Cosine),
        }
    }

    fn load(dimension: &usize, path: &Path) -> StoreResult<Self> {
        let mut state = Self::empty(dimension);
        let Some(file) = load_collection(path)? else {
            tracing::info!("No collection file at {:?}, starting empty", path);
            return Ok(state);
        };
        if file.embedding_dim != *dimension {
            return Err(StoreError::Config(format!(
                "{:?} holds {}-dimensional vectors, collection is configured for {}",
                path, file.embedding_dim, dimension
            )));
        }

        let mut undecodable = 0usize;
        for record in file.data {
            match decode_vector(&record, *dimension) {
                Ok(vector) => state.index.upsert(&record.id, &vector),
                Err(e) => {
                    undecodable += 1;
                    tracing::warn!("{}", e);
                }
            }
            state.records.insert(record.id.clone(), record);
        }
        tracing::info!(
            "Loaded collection {:?} ({} records, {} undecodable)",
            path,
            state.records.len(),
            undecodable
        );
        Ok(state)
    }

    fn save(&self, dimension: &usize, path: &Path) -> StoreResult<()> {
        let mut data: Vec<StoredRecord> = self.records.values().cloned().collect();
        data.sort_by(|a, b| a.id.cmp(&b.id));
        save_collection(
            path,
            &CollectionFile {
                embedding_dim: *dimension,
                metric: self.index.metric(),
                data,
            },
        )
    }
}

fn decode_vector(record: &StoredRecord, dimension: usize) -> StoreResult<Vec<f32>> {
    let vector = codec::decompress(&record.vector).map_err(|e| StoreError::Decode {
        id: record.id.clone(),
        reason: e.to_string(),
    })?;
    if vector.len() != dimension {
        return Err(StoreError::Decode {
            id: record.id.clone(),
            reason: format!("decoded {} values, expected {}", vector.len(), dimension),
        });
    }
    Ok(vector)
}

/// A named, fixed-dimension vector collection backed by one JSON file.
pub struct VectorStore {
    config: StoreConfig,
    threshold: f32,
    meta_fields: MetaFields,
    embedder: Arc<dyn EmbeddingFunc>,
    file: SyncedFile<CollectionState>,
}

impl VectorStore {
    /// Open the collection described by `config`, coordinating with other
    /// processes through a sidecar signal file.
    pub fn open(config: StoreConfig, embedder: Arc<dyn EmbeddingFunc>) -> StoreResult<Self> {
        config.validate()?;
        let signal = FileSignal::open(FileSignal::sidecar_for(&config.vector_file_path()))?;
        Self::with_signal(config, embedder, Box::new(signal))
    }

    /// Open the collection with a caller-provided update signal.
    pub fn with_signal(
        config: StoreConfig,
        embedder: Arc<dyn EmbeddingFunc>,
        signal: Box<dyn UpdateSignal>,
    ) -> StoreResult<Self> {
        config.validate()?;
        let threshold = config.threshold()?;
        let file = SyncedFile::open(
            config.final_namespace(),
            config.vector_file_path(),
            config.embedding_dimension,
            signal,
        )?;
        Ok(Self {
            meta_fields: MetaFields::from(&config.meta_fields),
            threshold,
            config,
            embedder,
            file,
        })
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Workspace-qualified namespace of this collection.
    pub fn namespace(&self) -> &str {
        self.file.name()
    }

    /// Path of the collection file.
    pub fn file_path(&self) -> &Path {
        self.file.path()
    }

    /// Number of records, after picking up commits from other processes.
    pub fn len(&self) -> usize {
        self.file.refresh_for_read();
        self.file.read().len()
    }

    /// `true` if the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All record ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.file.refresh_for_read();
        let mut ids: Vec<String> = self.file.read().records.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Embed `texts` in batches of at most `embedding_batch_size`, checking
    /// count and dimension of every batch before returning anything.
    fn embed(&self, texts: &[String]) -> StoreResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.embedding_batch_size) {
            let out = self.embedder.embed(batch).map_err(|e| {
                tracing::error!("Embedding function failed for '{}': {}", self.namespace(), e);
                StoreError::Embedding(e)
            })?;
            if out.len() != batch.len() {
                tracing::error!(
                    "Embedding count mismatch for '{}': requested {}, received {}; rejecting upsert",
                    self.namespace(),
                    batch.len(),
                    out.len()
                );
                return Err(StoreError::EmbeddingCountMismatch {
                    expected: batch.len(),
                    actual: out.len(),
                });
            }
            if let Some(bad) = out.iter().find(|v| v.len() != self.config.embedding_dimension) {
                tracing::error!(
                    "Embedding dimension mismatch for '{}': expected {}, received {}; rejecting batch",
                    self.namespace(),
                    self.config.embedding_dimension,
                    bad.len()
                );
                return Err(StoreError::Config(format!(
                    "embedding function returned {}-dimensional vectors, collection '{}' expects {}",
                    bad.len(),
                    self.namespace(),
                    self.config.embedding_dimension
                )));
            }
            vectors.extend(out);
        }
        Ok(vectors)
    }

    /// Embed and stage records. Re-upserting an id replaces the previous entry.
    ///
    /// Nothing is applied unless every batch embeds cleanly.
    pub fn upsert<I>(&self, records: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (String, UpsertRecord)>,
    {
        let records: Vec<(String, UpsertRecord)> = records.into_iter().collect();
        if records.is_empty() {
            tracing::debug!("Upsert into '{}' with no records", self.namespace());
            return Ok(());
        }
        self.file.refresh()?;

        let contents: Vec<String> = records.iter().map(|(_, r)| r.content.clone()).collect();
        let vectors = self.embed(&contents)?;

        let created_at = chrono::Utc::now().timestamp();
        let mut staged = Vec::with_capacity(records.len());
        for ((id, record), vector) in records.into_iter().zip(vectors) {
            let encoded = codec::compress(&vector)
                .map_err(|e| StoreError::Serialization(format!("compressing '{}': {}", id, e)))?;
            let stored = StoredRecord {
                id,
                created_at,
                metadata: self.meta_fields.admit(record.metadata),
                vector: encoded,
            };
            // Index at storage precision so reads match a reload.
            staged.push((stored, codec::to_storage_precision(&vector)));
        }

        let count = staged.len();
        let mut state = self.file.write();
        for (stored, vector) in staged {
            state.index.upsert(&stored.id, &vector);
            state.records.insert(stored.id.clone(), stored);
        }
        tracing::info!("Upserted {} records into '{}'", count, self.namespace());
        Ok(())
    }

    /// Nearest records to `text`, best first.
    ///
    /// With `embedding`, that vector is used for the literal query and no case
    /// variants are searched.
    pub fn query(
        &self,
        text: &str,
        top_k: usize,
        embedding: Option<&[f32]>,
    ) -> StoreResult<Vec<ScoredRecord>> {
        if top_k == 0 || (embedding.is_none() && text.trim().is_empty()) {
            return Ok(Vec::new());
        }
        self.file.refresh_for_read();

        let (plan, vectors) = match embedding {
            Some(vector) => {
                if vector.len() != self.config.embedding_dimension {
                    return Err(StoreError::Config(format!(
                        "query embedding has {} dimensions, collection '{}' expects {}",
                        vector.len(),
                        self.namespace(),
                        self.config.embedding_dimension
                    )));
                }
                (QueryPlan::literal(text, self.threshold), vec![vector.to_vec()])
            }
            None => {
                let plan = QueryPlan::new(text, self.threshold);
                let vectors = self.embed(&plan.variants)?;
                (plan, vectors)
            }
        };

        let state = self.file.read();
        let mut raw = Vec::new();
        for (variant, vector) in plan.variants.iter().zip(&vectors) {
            for neighbor in state.index.search(vector, top_k, plan.max_distance()) {
                raw.push(RawHit {
                    id: neighbor.id,
                    distance: neighbor.distance,
                    variant: variant.clone(),
                });
            }
        }
        let raw_count = raw.len();

        let results: Vec<ScoredRecord> = plan
            .rank(raw, top_k)
            .into_iter()
            .filter_map(|hit| {
                let record = state.records.get(&hit.id)?;
                Some(ScoredRecord {
                    id: hit.id,
                    distance: hit.distance,
                    created_at: record.created_at,
                    quality_score: hit.quality_score,
                    query_variant: hit.variant,
                    effective_threshold: plan.threshold,
                    metadata: record.metadata.clone(),
                })
            })
            .collect();
        tracing::debug!(
            "Query on '{}': {} variants, {} raw hits, {} results (threshold {})",
            self.namespace(),
            plan.variants.len(),
            raw_count,
            results.len(),
            plan.threshold
        );
        Ok(results)
    }

    /// The record stored under `id`, or `None` if missing or unavailable.
    pub fn get_by_id(&self, id: &str) -> Option<VectorRecord> {
        self.file.refresh_for_read();
        let state = self.file.read();
        state.available(id).map(to_record)
    }

    /// Records for `ids` in input order, `None` where missing.
    pub fn get_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Option<VectorRecord>> {
        self.file.refresh_for_read();
        let state = self.file.read();
        ids.iter()
            .map(|id| state.available(id.as_ref()).map(to_record))
            .collect()
    }

    /// Vectors for the given ids at storage precision; missing or undecodable
    /// ids are omitted.
    pub fn get_vectors_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> HashMap<String, Vec<f32>> {
        self.file.refresh_for_read();
        let state = self.file.read();
        ids.iter()
            .filter_map(|id| {
                let record = state.available(id.as_ref())?;
                let vector = state.index.get(&record.id)?;
                Some((record.id.clone(), vector.to_vec()))
            })
            .collect()
    }

    /// Remove records by id. Unknown ids are ignored.
    pub fn delete<S: AsRef<str>>(&self, ids: &[S]) -> StoreResult<()> {
        self.file.refresh()?;
        let mut state = self.file.write();
        let removed = ids.iter().filter(|id| state.remove(id.as_ref())).count();
        tracing::info!(
            "Deleted {} of {} requested records from '{}'",
            removed,
            ids.len(),
            self.namespace()
        );
        Ok(())
    }

    /// Remove the record of the entity called `name`.
    pub fn delete_entity(&self, name: &str) -> StoreResult<()> {
        let id = entity_id(name);
        tracing::debug!("Deleting entity '{}' ({}) from '{}'", name, id, self.namespace());
        self.delete(&[id])
    }

    /// Remove every record whose relation source or target is `name`.
    pub fn delete_entity_relation(&self, name: &str) -> StoreResult<()> {
        self.file.refresh()?;
        let ids: Vec<String> = {
            let state = self.file.read();
            state
                .records
                .values()
                .filter(|r| {
                    [config::RELATION_SOURCE_FIELD, config::RELATION_TARGET_FIELD]
                        .iter()
                        .any(|field| r.metadata.get(*field).and_then(|v| v.as_str()) == Some(name))
                })
                .map(|r| r.id.clone())
                .collect()
        };
        tracing::debug!(
            "Deleting {} relations touching '{}' from '{}'",
            ids.len(),
            name,
            self.namespace()
        );
        self.delete(&ids)
    }

    /// Commit staged changes to disk unless another process committed first.
    pub fn persist(&self) -> StoreResult<PersistOutcome> {
        self.file.persist().inspect_err(|e| {
            tracing::error!("Failed to persist '{}': {}", self.namespace(), e);
        })
    }

    /// Alias of [`persist`](Self::persist), named for the end of an indexing pass.
    pub fn index_done_callback(&self) -> StoreResult<PersistOutcome> {
        self.persist()
    }

    /// Delete the collection file, empty the collection, and tell other processes.
    pub fn drop(&self) -> StoreResult<()> {
        self.file.drop_all().inspect_err(|e| {
            tracing::error!("Failed to drop '{}': {}", self.namespace(), e);
        })
    }
}

fn to_record(record: &StoredRecord) -> VectorRecord {
    VectorRecord {
        id: record.id.clone(),
        created_at: record.created_at,
        metadata: record.metadata.clone(),
    }
}
