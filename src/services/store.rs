//! Vector store service.
//!
//! A [`VectorStore`] owns one backend and everything the backend does not
//! know about: external ids, metadata, soft deletes and the raw vector cache.
//!
//! # Slot Arena
//!
//! Every insert allocates the next slot; removing or overwriting an id only
//! marks its old slot deleted. Deleted slots keep occupying the backend and
//! are filtered out of search results until [`VectorStore::rebuild`] copies
//! the live records into a fresh backend and swaps it in.
//!
//! # Vector Preparation
//!
//! | Step | Applies To | Behavior |
//! |------|------------|----------|
//! | Dimension repair | inserts and queries | truncate or zero-pad, unless `strict_dimensions` |
//! | Normalization | cosine stores | scale to unit L2 norm; the zero vector is left as is |

use crate::models::{
    BackendKind, Metadata, Metric, SearchHit, SearchOptions, StoreConfig, StoreStats,
};
use crate::storage::persistence::{
    FORMAT_VERSION, Sidecar, StoreMeta, digest, persistence_error, remove_sidecar, sidecar_path,
};
use crate::storage::traits::{Slot, VectorIndex};
use crate::storage::vector::{create_index, distance, load_index};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// A named similarity-search collection.
///
/// Mutating methods take `&mut self`. Callers sharing a store across threads
/// wrap it in its own lock, one per store.
pub struct VectorStore {
    /// Store name, used as the file stem inside a registry.
    name: String,
    /// Configuration, with the backend that is actually serving.
    config: StoreConfig,
    /// Numeric backend.
    index: Box<dyn VectorIndex>,
    /// Live ids to slots.
    id_to_slot: HashMap<String, Slot>,
    /// Every allocated slot to its id, deleted ones included.
    slot_to_id: HashMap<Slot, String>,
    /// Soft-deleted slots.
    deleted: HashSet<Slot>,
    /// Metadata for live ids.
    metadata: HashMap<String, Metadata>,
    /// Raw copies of live vectors (only with `retain_vectors`).
    raw_cache: HashMap<Slot, Vec<f32>>,
    /// Next slot expected from the backend.
    next_slot: Slot,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("size", &self.len())
            .field("total_size", &self.total_size())
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Creates an empty store.
    ///
    /// A graph store resolves to the fallback backend when usearch is not
    /// compiled in; [`config`](Self::config) reports the backend in use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid.
    pub fn new(name: impl Into<String>, config: StoreConfig) -> Result<Self> {
        let name = name.into();
        let index = create_index(&config)?;
        let config = StoreConfig {
            backend: index.kind(),
            ..config
        };

        debug!(
            store = %name,
            backend = %config.backend,
            metric = %config.metric,
            dimension = config.dimension,
            "created vector store"
        );

        Ok(Self {
            name,
            config,
            index,
            id_to_slot: HashMap::new(),
            slot_to_id: HashMap::new(),
            deleted: HashSet::new(),
            metadata: HashMap::new(),
            raw_cache: HashMap::new(),
            next_slot: 0,
        })
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Backend serving this store.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.config.backend
    }

    /// Vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Repairs the length of a vector and normalizes it for cosine.
    ///
    /// NaN and infinite components are rejected: they cannot be ranked or
    /// persisted.
    fn prepare(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "component {position} is {}",
                vector[position]
            )));
        }

        let expected = self.config.dimension;
        let mut prepared = vector.to_vec();

        if prepared.len() != expected {
            if self.config.strict_dimensions {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: prepared.len(),
                });
            }
            warn!(
                store = %self.name,
                expected,
                actual = prepared.len(),
                "vector length repaired"
            );
            metrics::counter!("vecstore_dimension_repairs_total", "store" => self.name.clone())
                .increment(1);
            prepared.resize(expected, 0.0);
        }

        if self.config.metric == Metric::Cosine {
            distance::normalize(&mut prepared);
        }
        Ok(prepared)
    }

    /// Inserts or overwrites one record.
    ///
    /// Returns false, leaving the store untouched, if `id` is live and
    /// `overwrite` is false.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a NaN or infinite component,
    /// [`Error::DimensionMismatch`] in strict mode, or an error if the
    /// backend rejects the vector.
    pub fn add(
        &mut self,
        id: &str,
        vector: &[f32],
        metadata: Option<Metadata>,
        overwrite: bool,
    ) -> Result<bool> {
        let metadata = metadata.map(|m| vec![m]);
        let added = self.add_batch(&[id], &[vector], metadata.as_deref(), overwrite)?;
        Ok(added == 1)
    }

    /// Inserts or overwrites many records in one backend call.
    ///
    /// Duplicate ids inside the batch resolve last-write-wins before anything
    /// reaches the backend. Returns the number of records inserted or
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `ids`, `vectors` and `metadata`
    /// differ in length or a vector has a NaN or infinite component, and
    /// [`Error::DimensionMismatch`] in strict mode.
    /// Nothing is inserted when an error is returned.
    #[instrument(skip(self, ids, vectors, metadata), fields(store = %self.name, batch = ids.len()))]
    pub fn add_batch<S, V>(
        &mut self,
        ids: &[S],
        vectors: &[V],
        metadata: Option<&[Metadata]>,
        overwrite: bool,
    ) -> Result<usize>
    where
        S: AsRef<str>,
        V: AsRef<[f32]>,
    {
        if ids.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "{} ids but {} vectors",
                ids.len(),
                vectors.len()
            )));
        }
        if let Some(metadata) = metadata
            && metadata.len() != ids.len()
        {
            return Err(Error::InvalidInput(format!(
                "{} ids but {} metadata entries",
                ids.len(),
                metadata.len()
            )));
        }

        // Last occurrence of each id wins
        let mut last: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            last.insert(id.as_ref(), position);
        }
        let chosen: Vec<usize> = (0..ids.len())
            .filter(|&position| last.get(ids[position].as_ref()) == Some(&position))
            .filter(|&position| overwrite || !self.id_to_slot.contains_key(ids[position].as_ref()))
            .collect();

        if chosen.is_empty() {
            return Ok(0);
        }

        let prepared = chosen
            .iter()
            .map(|&position| self.prepare(vectors[position].as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let slots = self.index.add(&prepared)?;
        if slots.len() != prepared.len() {
            return Err(Error::OperationFailed {
                operation: "add_batch".to_string(),
                cause: format!(
                    "backend assigned {} slots for {} vectors",
                    slots.len(),
                    prepared.len()
                ),
            });
        }

        for ((&position, slot), vector) in chosen.iter().zip(&slots).zip(prepared) {
            let id = ids[position].as_ref();
            if let Some(old) = self.id_to_slot.insert(id.to_string(), *slot) {
                self.deleted.insert(old);
                self.raw_cache.remove(&old);
            }
            self.slot_to_id.insert(*slot, id.to_string());

            match metadata.map(|m| m[position].clone()) {
                Some(entry) => {
                    self.metadata.insert(id.to_string(), entry);
                },
                None => {
                    self.metadata.remove(id);
                },
            }
            if self.config.retain_vectors {
                self.raw_cache.insert(*slot, vector);
            }
        }
        if let Some(last_slot) = slots.iter().max() {
            self.next_slot = self.next_slot.max(last_slot + 1);
        }

        let added = chosen.len();
        metrics::counter!("vecstore_vectors_added_total", "store" => self.name.clone())
            .increment(added as u64);
        debug!(added, skipped = ids.len() - added, "added vectors");
        Ok(added)
    }

    /// Soft-deletes one record. Returns false if `id` is not live.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.id_to_slot.remove(id) else {
            return false;
        };
        self.deleted.insert(slot);
        self.metadata.remove(id);
        self.raw_cache.remove(&slot);

        metrics::counter!("vecstore_vectors_removed_total", "store" => self.name.clone())
            .increment(1);
        debug!(store = %self.name, id, slot, "removed vector");
        true
    }

    /// Soft-deletes many records, returning how many were live.
    pub fn remove_batch<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        ids.iter().filter(|id| self.remove(id.as_ref())).count()
    }

    /// Returns a backend row if it looks like a stored vector.
    fn reconstruct_checked(&self, slot: Slot) -> Option<Vec<f32>> {
        self.index
            .reconstruct(slot)
            .filter(|v| v.len() == self.config.dimension && v.iter().all(|x| x.is_finite()))
    }

    /// Returns the stored (prepared) vector for a live id.
    ///
    /// Reconstruction failures are absorbed: the backend gets one repair
    /// attempt, then the retained raw copy is used if there is one.
    #[instrument(skip(self), fields(store = %self.name))]
    pub fn get(&mut self, id: &str) -> Option<Vec<f32>> {
        let slot = *self.id_to_slot.get(id)?;
        if let Some(vector) = self.reconstruct_checked(slot) {
            return Some(vector);
        }

        warn!(slot, "reconstruction failed, repairing backend");
        if let Err(e) = self.index.repair() {
            warn!(error = %e, "backend repair failed");
        } else if let Some(vector) = self.reconstruct_checked(slot) {
            return Some(vector);
        }

        metrics::counter!("vecstore_reconstruction_fallbacks_total", "store" => self.name.clone())
            .increment(1);
        if let Some(vector) = self.raw_cache.get(&slot) {
            debug!(slot, "served vector from raw cache");
            return Some(vector.clone());
        }

        warn!(slot, "vector unavailable after repair");
        None
    }

    /// Returns true if `id` is live.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.id_to_slot.contains_key(id)
    }

    /// Live ids in slot order.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        let mut live: Vec<(&String, &Slot)> = self.id_to_slot.iter().collect();
        live.sort_unstable_by_key(|(_, slot)| **slot);
        live.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Metadata stored with a live id.
    #[must_use]
    pub fn metadata(&self, id: &str) -> Option<&Metadata> {
        self.metadata.get(id)
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_slot.len()
    }

    /// Number of allocated slots, soft-deleted ones included.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.slot_to_id.len()
    }

    /// Returns true if there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_slot.is_empty()
    }

    /// Ranks live records against `query`.
    ///
    /// Hits are live, not excluded, scored at least `threshold`, and ordered
    /// by descending score.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a NaN or infinite component,
    /// [`Error::DimensionMismatch`] in strict mode, or an error if the
    /// backend search fails.
    #[instrument(skip(self, query, options), fields(store = %self.name, top_k = options.top_k))]
    pub fn search(&self, query: &[f32], options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let result = (|| {
            let query = self.prepare(query)?;
            if options.top_k == 0 || self.is_empty() {
                return Ok(Vec::new());
            }

            let fetch = (options.top_k * 3 + self.deleted.len() + options.exclude.len())
                .min(self.index.len());
            let candidates = self.index.search(&query, fetch)?;

            let hits: Vec<SearchHit> = candidates
                .into_iter()
                .filter(|(slot, score)| !self.deleted.contains(slot) && *score >= options.threshold)
                .filter_map(|(slot, score)| {
                    let id = self.slot_to_id.get(&slot)?;
                    (!options.is_excluded(id)).then(|| SearchHit {
                        id: id.clone(),
                        score,
                        metadata: self.metadata.get(id).cloned().unwrap_or_default(),
                    })
                })
                .take(options.top_k)
                .collect();

            debug!(fetched = fetch, returned = hits.len(), "search complete");
            Ok(hits)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "vecstore_searches_total",
            "backend" => self.config.backend.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("vecstore_search_duration_ms", "backend" => self.config.backend.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        result
    }

    /// Runs [`search`](Self::search) once per query.
    ///
    /// # Errors
    ///
    /// Returns the first search error.
    pub fn search_batch<V: AsRef<[f32]>>(
        &self,
        queries: &[V],
        options: &SearchOptions,
    ) -> Result<Vec<Vec<SearchHit>>> {
        queries
            .iter()
            .map(|query| self.search(query.as_ref(), options))
            .collect()
    }

    /// Pairwise scores under the store metric.
    ///
    /// Uses `ids` or, if `None`, every live id in slot order. Unknown ids and
    /// ids whose vectors cannot be recovered are dropped; the returned ids
    /// label the matrix rows and columns.
    #[instrument(skip(self, ids), fields(store = %self.name))]
    pub fn compute_similarity_matrix(
        &mut self,
        ids: Option<&[String]>,
    ) -> (Vec<Vec<f32>>, Vec<String>) {
        let requested = ids.map_or_else(|| self.list_ids(), <[String]>::to_vec);

        let mut kept = Vec::with_capacity(requested.len());
        let mut vectors = Vec::with_capacity(requested.len());
        for id in requested {
            if let Some(vector) = self.get(&id) {
                kept.push(id);
                vectors.push(vector);
            }
        }

        let metric = self.config.metric;
        let matrix = vectors
            .iter()
            .map(|a| vectors.iter().map(|b| distance::score(metric, a, b)).collect())
            .collect();

        debug!(rows = kept.len(), "computed similarity matrix");
        (matrix, kept)
    }

    /// Compacts the store, purging soft-deleted slots.
    ///
    /// Every live vector is copied into a fresh backend, which replaces the
    /// old one only once the copy has succeeded. A no-op when nothing is
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the store unchanged, if a live vector cannot
    /// be recovered or the fresh backend rejects the copy.
    #[instrument(skip(self), fields(store = %self.name))]
    pub fn rebuild(&mut self) -> Result<()> {
        if self.deleted.is_empty() {
            debug!("nothing deleted, rebuild skipped");
            return Ok(());
        }

        let start = Instant::now();
        let ids = self.list_ids();
        let mut vectors = Vec::with_capacity(ids.len());
        for id in &ids {
            let vector = self.get(id).ok_or_else(|| Error::OperationFailed {
                operation: "rebuild".to_string(),
                cause: format!("vector for '{id}' cannot be recovered"),
            })?;
            vectors.push(vector);
        }

        let mut index = self.index.emptied()?;
        let slots = index.add(&vectors)?;

        let mut id_to_slot = HashMap::with_capacity(ids.len());
        let mut slot_to_id = HashMap::with_capacity(ids.len());
        let mut raw_cache = HashMap::new();
        for ((id, slot), vector) in ids.into_iter().zip(&slots).zip(vectors) {
            if self.config.retain_vectors {
                raw_cache.insert(*slot, vector);
            }
            slot_to_id.insert(*slot, id.clone());
            id_to_slot.insert(id, *slot);
        }

        let purged = self.deleted.len();
        self.index = index;
        self.id_to_slot = id_to_slot;
        self.slot_to_id = slot_to_id;
        self.raw_cache = raw_cache;
        self.deleted.clear();
        self.next_slot = slots.len() as Slot;

        metrics::counter!("vecstore_rebuilds_total", "store" => self.name.clone()).increment(1);
        info!(
            purged,
            live = self.len(),
            duration_ms = start.elapsed().as_millis(),
            "rebuilt store"
        );
        Ok(())
    }

    /// Drops every record and starts over with an empty backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the fresh backend cannot be created, leaving the
    /// store unchanged.
    #[instrument(skip(self), fields(store = %self.name))]
    pub fn clear(&mut self) -> Result<()> {
        let index = create_index(&self.config)?;
        let dropped = self.len();

        self.index = index;
        self.id_to_slot.clear();
        self.slot_to_id.clear();
        self.deleted.clear();
        self.metadata.clear();
        self.raw_cache.clear();
        self.next_slot = 0;

        info!(dropped, "cleared store");
        Ok(())
    }

    /// Persists the store at base path `path`.
    ///
    /// Writes the backend sidecar first and `.meta` last, recording the
    /// backend sidecar's digest; see
    /// [`persistence`](crate::storage::persistence) for the layout.
    ///
    /// # Errors
    ///
    /// Returns an error if any sidecar cannot be written.
    #[instrument(skip(self, path), fields(store = %self.name, path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let base = path.as_ref();
        self.index.save(base)?;
        let current = Sidecar::for_backend(self.config.backend);
        let backend_digest = digest(&sidecar_path(base, current))?;

        // A store that switched layouts must not leave the other sidecar behind
        let stale = if current == Sidecar::Raw {
            Sidecar::Index
        } else {
            Sidecar::Raw
        };
        remove_sidecar(&sidecar_path(base, stale))?;

        let meta = StoreMeta {
            format_version: FORMAT_VERSION,
            config: self.config.clone(),
            id_to_slot: self
                .id_to_slot
                .iter()
                .map(|(id, slot)| (id.clone(), *slot))
                .collect(),
            slot_to_id: self
                .slot_to_id
                .iter()
                .map(|(slot, id)| (*slot, id.clone()))
                .collect(),
            next_slot: self.next_slot,
            metadata: self
                .metadata
                .iter()
                .map(|(id, m)| (id.clone(), m.clone()))
                .collect(),
            deleted: self.deleted.iter().copied().collect(),
            trained: self.index.is_trained(),
            backend_digest,
        };
        meta.write(base)?;

        debug!(size = self.len(), total_size = self.total_size(), "saved store");
        Ok(())
    }

    /// Loads the store saved at base path `path`.
    ///
    /// The store is named after the last path component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if a sidecar is missing or corrupt, or
    /// the sidecars disagree with each other, and [`Error::Configuration`]
    /// for a graph store when usearch is not compiled in.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let base = path.as_ref();
        let meta = StoreMeta::read(base)?;
        let index = load_index(&meta.config, base)?;
        meta.check_backend_digest(base)?;
        meta.check_consistency(base, index.len())?;

        if index.is_trained() != meta.trained {
            return Err(persistence_error(
                &sidecar_path(base, Sidecar::Meta),
                format!(
                    "meta records trained={}, backend reports trained={}",
                    meta.trained,
                    index.is_trained()
                ),
            ));
        }

        let name = base
            .file_name()
            .map_or_else(|| "store".to_string(), |n| n.to_string_lossy().into_owned());
        let store = Self {
            name,
            config: meta.config,
            index,
            id_to_slot: meta.id_to_slot.into_iter().collect(),
            slot_to_id: meta.slot_to_id.into_iter().collect(),
            deleted: meta.deleted.into_iter().collect(),
            metadata: meta.metadata.into_iter().collect(),
            raw_cache: HashMap::new(),
            next_slot: meta.next_slot,
        };

        info!(
            store = %store.name,
            backend = %store.config.backend,
            size = store.len(),
            total_size = store.total_size(),
            "loaded store"
        );
        Ok(store)
    }

    /// Point-in-time statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let mapping_bytes = self
            .slot_to_id
            .values()
            .map(|id| 2 * (id.len() + std::mem::size_of::<Slot>()))
            .sum::<usize>();
        let cache_bytes = self.raw_cache.len() * self.config.dimension * std::mem::size_of::<f32>();

        StoreStats {
            size: self.len(),
            total_size: self.total_size(),
            deleted_count: self.deleted.len(),
            dimension: self.config.dimension,
            backend: self.config.backend,
            metric: self.config.metric,
            trained: self.index.is_trained(),
            memory_bytes: self.index.memory_bytes() + mapping_bytes + cache_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn cosine_store(dimension: usize) -> VectorStore {
        VectorStore::new("test", StoreConfig::new(dimension)).expect("create failed")
    }

    fn meta(key: &str, value: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert(key.to_string(), json!(value));
        m
    }

    #[test]
    fn test_add_and_contains() {
        let mut store = cosine_store(3);
        assert!(store.add("a", &[1.0, 0.0, 0.0], None, true).expect("add failed"));
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_without_overwrite_keeps_existing() {
        let mut store = cosine_store(2);
        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        assert!(!store.add("a", &[0.0, 1.0], None, false).expect("add failed"));

        let stored = store.get("a").expect("get failed");
        assert!((stored[0] - 1.0).abs() < 1e-6);
        assert_eq!(store.total_size(), 1);
    }

    #[test]
    fn test_overwrite_soft_deletes_old_slot() {
        let mut store = cosine_store(2);
        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        store.add("a", &[0.0, 1.0], None, true).expect("add failed");

        assert_eq!(store.len(), 1);
        assert_eq!(store.total_size(), 2);
        assert_eq!(store.stats().deleted_count, 1);
    }

    #[test]
    fn test_dimension_repair() {
        let mut store = VectorStore::new(
            "repair",
            StoreConfig::new(3).with_metric(Metric::Euclidean),
        )
        .expect("create failed");

        store.add("long", &[1.0, 2.0, 3.0, 4.0], None, true).expect("add failed");
        store.add("short", &[5.0], None, true).expect("add failed");

        assert_eq!(store.get("long"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(store.get("short"), Some(vec![5.0, 0.0, 0.0]));
    }

    #[test]
    fn test_strict_dimensions_rejects() {
        let mut store = VectorStore::new("strict", StoreConfig::new(3).with_strict_dimensions(true))
            .expect("create failed");

        let result = store.add("a", &[1.0, 2.0], None, true);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(store.is_empty());
        assert!(store.search(&[1.0], &SearchOptions::new()).is_err());
    }

    #[test]
    fn test_batch_length_mismatch() {
        let mut store = cosine_store(2);
        let result = store.add_batch(&["a", "b"], &[[1.0f32, 0.0]], None, true);
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = store.add_batch(&["a"], &[[1.0f32, 0.0]], Some(&[]), true);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_metadata_follows_record() {
        let mut store = cosine_store(2);
        store
            .add("a", &[1.0, 0.0], Some(meta("kind", "unit")), true)
            .expect("add failed");
        assert_eq!(store.metadata("a"), Some(&meta("kind", "unit")));

        let hits = store
            .search(&[1.0, 0.0], &SearchOptions::new())
            .expect("search failed");
        assert_eq!(hits[0].metadata, meta("kind", "unit"));

        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        assert_eq!(store.metadata("a"), None);
    }

    #[test]
    fn test_remove_batch() {
        let mut store = cosine_store(2);
        store
            .add_batch(&["a", "b", "c"], &[[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0]], None, true)
            .expect("add failed");

        assert_eq!(store.remove_batch(&["a", "c", "missing"]), 2);
        assert_eq!(store.list_ids(), vec!["b".to_string()]);
        assert!(!store.remove("a"));
    }

    #[test]
    fn test_list_ids_in_slot_order() {
        let mut store = cosine_store(2);
        for id in ["z", "a", "m"] {
            store.add(id, &[1.0, 0.0], None, true).expect("add failed");
        }
        store.add("z", &[0.0, 1.0], None, true).expect("add failed");
        assert_eq!(store.list_ids(), vec!["a", "m", "z"]);
    }

    #[test]
    fn test_search_threshold_and_exclude() {
        let mut store = cosine_store(2);
        store
            .add_batch(
                &["x", "diag", "y"],
                &[[1.0f32, 0.0], [1.0, 1.0], [0.0, 1.0]],
                None,
                true,
            )
            .expect("add failed");

        let hits = store
            .search(&[1.0, 0.0], &SearchOptions::new().with_threshold(0.5))
            .expect("search failed");
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "diag"]);

        let hits = store
            .search(&[1.0, 0.0], &SearchOptions::new().excluding("x"))
            .expect("search failed");
        assert_eq!(hits[0].id, "diag");
        assert!(hits.iter().all(|h| h.id != "x"));
    }

    #[test]
    fn test_search_empty_store_and_zero_k() {
        let mut store = cosine_store(2);
        assert!(store.search(&[1.0, 0.0], &SearchOptions::new()).expect("search failed").is_empty());

        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        let hits = store
            .search(&[1.0, 0.0], &SearchOptions::new().with_top_k(0))
            .expect("search failed");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_get_falls_back_to_raw_cache() {
        let mut store = VectorStore::new(
            "cached",
            StoreConfig::new(2)
                .with_metric(Metric::Euclidean)
                .with_retained_vectors(true),
        )
        .expect("create failed");
        store.add("a", &[3.0, 4.0], None, true).expect("add failed");

        // Swap in an empty backend so reconstruction fails
        store.index = create_index(&store.config).expect("create failed");
        assert_eq!(store.get("a"), Some(vec![3.0, 4.0]));
    }

    #[test]
    fn test_get_absent_without_cache() {
        let mut store = cosine_store(2);
        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        store.index = create_index(&store.config).expect("create failed");

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("never-added"), None);
    }

    #[test]
    fn test_similarity_matrix() {
        let mut store = cosine_store(2);
        store
            .add_batch(&["a", "b"], &[[1.0f32, 0.0], [0.0, 1.0]], None, true)
            .expect("add failed");

        let requested = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let (matrix, ids) = store.compute_similarity_matrix(Some(&requested));
        assert_eq!(ids, vec!["b", "a"]);
        assert!((matrix[0][0] - 1.0).abs() < 1e-6);
        assert!(matrix[0][1].abs() < 1e-6);

        let (matrix, ids) = store.compute_similarity_matrix(None);
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn test_rebuild_noop_without_deletes() {
        let mut store = cosine_store(2);
        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        store.rebuild().expect("rebuild failed");
        assert_eq!(store.total_size(), 1);
    }

    #[test]
    fn test_rebuild_failure_leaves_store_intact() {
        let mut store = cosine_store(2);
        store
            .add_batch(&["a", "b"], &[[1.0f32, 0.0], [0.0, 1.0]], None, true)
            .expect("add failed");
        store.remove("a");
        store.index = create_index(&store.config).expect("create failed");

        assert!(store.rebuild().is_err());
        assert_eq!(store.total_size(), 2);
        assert_eq!(store.stats().deleted_count, 1);
        assert!(store.contains("b"));
    }

    #[test]
    fn test_clear() {
        let mut store = cosine_store(2);
        store
            .add("a", &[1.0, 0.0], Some(meta("k", "v")), true)
            .expect("add failed");
        store.clear().expect("clear failed");

        assert!(store.is_empty());
        assert_eq!(store.total_size(), 0);
        assert_eq!(store.metadata("a"), None);
        assert!(store.add("a", &[1.0, 0.0], None, true).expect("add failed"));
    }

    #[test]
    fn test_save_removes_stale_sidecar() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        std::fs::write(sidecar_path(&base, Sidecar::Raw), b"stale").expect("write failed");

        let mut store = cosine_store(2);
        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        store.save(&base).expect("save failed");

        assert!(sidecar_path(&base, Sidecar::Index).exists());
        assert!(!sidecar_path(&base, Sidecar::Raw).exists());
    }

    #[test]
    fn test_load_rejects_missing_index() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        let mut store = cosine_store(2);
        store.add("a", &[1.0, 0.0], None, true).expect("add failed");
        store.save(&base).expect("save failed");
        std::fs::remove_file(sidecar_path(&base, Sidecar::Index)).expect("remove failed");

        assert!(matches!(
            VectorStore::load(&base),
            Err(Error::Persistence { .. })
        ));
    }

    #[test]
    fn test_stats() {
        let mut store = cosine_store(4);
        store
            .add_batch(
                &["a", "b"],
                &[[1.0f32, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
                None,
                true,
            )
            .expect("add failed");
        store.remove("a");

        let stats = store.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.total_size, 2);
        assert_eq!(stats.deleted_count, 1);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.backend, BackendKind::Flat);
        assert_eq!(stats.metric, Metric::Cosine);
        assert!(stats.trained);
        assert!(stats.memory_bytes > 0);
    }
}
