//! Coarse-quantized (IVF) approximate index.
//!
//! Lifecycle:
//!
//! 1. The index starts `UNTRAINED`; added vectors get slots immediately but
//!    wait in a pending buffer, and searches brute-force that buffer
//! 2. The add that pushes the buffer past `n_clusters` vectors trains the
//!    coarse quantizer once on the whole buffer
//! 3. The buffer is flushed into inverted lists and the index is `TRAINED`
//!    for the rest of its life
//!
//! # Algorithm
//!
//! Lloyd's k-means with deterministic seeding (evenly spaced samples) and
//! early stopping once no centroid moves more than the tolerance. Vectors are
//! kept at full precision (IVF-Flat); only the search is restricted to the
//! `n_probe` lists whose centroids are nearest the query.

use super::distance;
use crate::models::{BackendKind, Metric};
use crate::storage::persistence::{Sidecar, persistence_error, read_sidecar, sidecar_path, write_atomic};
use crate::storage::traits::{Slot, VectorIndex};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Maximum k-means iterations.
const MAX_ITERS: usize = 25;

/// Stop once the largest centroid movement (squared) is below this.
const TOLERANCE: f32 = 1e-8;

/// Coarse-quantized index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvfIndex {
    /// Vector dimension.
    dimensions: usize,
    /// Scoring metric.
    metric: Metric,
    /// Number of coarse clusters.
    n_clusters: usize,
    /// Lists scanned per query.
    n_probe: usize,
    /// Row-major centroids; empty until trained.
    centroids: Vec<f32>,
    /// Slots per cluster.
    lists: Vec<Vec<Slot>>,
    /// Row-major vectors, one row per slot.
    vectors: Vec<f32>,
    /// Slots waiting for training.
    pending: Vec<Slot>,
    /// One-way training flag.
    trained: bool,
}

impl IvfIndex {
    /// Creates an untrained index.
    #[must_use]
    pub fn new(dimensions: usize, metric: Metric, n_clusters: usize, n_probe: usize) -> Self {
        Self {
            dimensions,
            metric,
            n_clusters,
            n_probe,
            centroids: Vec::new(),
            lists: Vec::new(),
            vectors: Vec::new(),
            pending: Vec::new(),
            trained: false,
        }
    }

    /// Loads the index saved for the store rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the sidecar is missing, corrupt, or
    /// was saved with other parameters.
    pub fn load(
        base: &Path,
        dimensions: usize,
        metric: Metric,
        n_clusters: usize,
        n_probe: usize,
    ) -> Result<Self> {
        let path = sidecar_path(base, Sidecar::Index);
        let bytes = read_sidecar(&path)?;
        let mut index: Self =
            serde_json::from_slice(&bytes).map_err(|e| persistence_error(&path, e))?;

        if index.dimensions != dimensions || index.metric != metric || index.n_clusters != n_clusters
        {
            return Err(persistence_error(
                &path,
                "index parameters differ from store configuration",
            ));
        }
        if !index.is_well_formed() {
            return Err(persistence_error(&path, "index state is inconsistent"));
        }
        index.n_probe = n_probe;
        Ok(index)
    }

    /// Number of vectors waiting for training.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn row(&self, slot: Slot) -> Option<&[f32]> {
        let start = usize::try_from(slot).ok()?.checked_mul(self.dimensions)?;
        self.vectors.get(start..start + self.dimensions)
    }

    fn centroid(&self, cluster: usize) -> &[f32] {
        &self.centroids[cluster * self.dimensions..(cluster + 1) * self.dimensions]
    }

    fn nearest_centroid(&self, vector: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for cluster in 0..self.centroids.len() / self.dimensions {
            let dist = distance::l2_squared(vector, self.centroid(cluster));
            if dist < best_dist {
                best_dist = dist;
                best = cluster;
            }
        }
        best
    }

    fn is_well_formed(&self) -> bool {
        let slots = self.len();
        let listed: usize = self.lists.iter().map(Vec::len).sum();
        let rows_ok = self.vectors.len() % self.dimensions == 0;
        let slots_ok = self
            .lists
            .iter()
            .flatten()
            .chain(&self.pending)
            .all(|s| (*s as usize) < slots);
        let trained_ok = if self.trained {
            self.centroids.len() == self.n_clusters * self.dimensions
                && self.lists.len() == self.n_clusters
                && self.pending.is_empty()
        } else {
            self.centroids.is_empty()
        };
        rows_ok && slots_ok && trained_ok && listed + self.pending.len() == slots
    }

    /// Assigns pending slots to their lists.
    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for slot in pending {
            if let Some(row) = self.row(slot) {
                let cluster = self.nearest_centroid(row);
                self.lists[cluster].push(slot);
            }
        }
    }

    /// Trains on the pending buffer once it exceeds the cluster count.
    fn maybe_train(&mut self) {
        if self.trained || self.pending.len() <= self.n_clusters {
            return;
        }
        let sample: Vec<&[f32]> = self.pending.iter().filter_map(|s| self.row(*s)).collect();
        self.centroids = kmeans(&sample, self.dimensions, self.n_clusters);
        self.lists = vec![Vec::new(); self.n_clusters];
        self.trained = true;
        let flushed = self.pending.len();
        self.flush_pending();

        metrics::counter!("vecstore_ivf_trainings_total").increment(1);
        info!(
            clusters = self.n_clusters,
            flushed, "trained coarse quantizer on pending buffer"
        );
    }
}

impl VectorIndex for IvfIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Quantized
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimensions
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn emptied(&self) -> Result<Box<dyn VectorIndex>> {
        let lists = if self.trained {
            vec![Vec::new(); self.n_clusters]
        } else {
            Vec::new()
        };
        Ok(Box::new(Self {
            centroids: self.centroids.clone(),
            lists,
            vectors: Vec::new(),
            pending: Vec::new(),
            trained: self.trained,
            ..Self::new(self.dimensions, self.metric, self.n_clusters, self.n_probe)
        }))
    }

    fn train(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if self.trained {
            return Ok(());
        }
        if vectors.len() < self.n_clusters {
            debug!(
                available = vectors.len(),
                required = self.n_clusters,
                "not enough vectors to train, staying untrained"
            );
            return Ok(());
        }
        let sample: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
        self.centroids = kmeans(&sample, self.dimensions, self.n_clusters);
        self.lists = vec![Vec::new(); self.n_clusters];
        self.trained = true;
        self.flush_pending();
        metrics::counter!("vecstore_ivf_trainings_total").increment(1);
        Ok(())
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<Slot>> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }

        let start = self.len() as Slot;
        let slots: Vec<Slot> = (start..start + vectors.len() as Slot).collect();
        for (slot, vector) in slots.iter().zip(vectors) {
            self.vectors.extend_from_slice(vector);
            if self.trained {
                let cluster = self.nearest_centroid(vector);
                self.lists[cluster].push(*slot);
            } else {
                self.pending.push(*slot);
            }
        }
        self.maybe_train();
        Ok(slots)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Slot, f32)>> {
        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        if !self.trained {
            let rows = self.pending.iter().filter_map(|s| Some((*s, self.row(*s)?)));
            return Ok(distance::scan(self.metric, query, rows, k));
        }

        let probes: Vec<(Slot, f32)> = (0..self.n_clusters)
            .map(|c| (c as Slot, -distance::l2_squared(query, self.centroid(c))))
            .collect();
        let rows = distance::top_k(probes, self.n_probe)
            .into_iter()
            .flat_map(|(c, _)| self.lists[c as usize].iter())
            .filter_map(|s| Some((*s, self.row(*s)?)));
        Ok(distance::scan(self.metric, query, rows, k))
    }

    fn reconstruct(&self, slot: Slot) -> Option<Vec<f32>> {
        self.row(slot).map(<[f32]>::to_vec)
    }

    /// Rebuilds the inverted lists from the stored vectors.
    fn repair(&mut self) -> Result<()> {
        let whole = self.len() * self.dimensions;
        self.vectors.truncate(whole);

        let slots = self.len() as Slot;
        if self.trained {
            self.lists = vec![Vec::new(); self.n_clusters];
            self.pending = (0..slots).collect();
            self.flush_pending();
        } else {
            self.pending = (0..slots).collect();
        }
        debug!(slots, trained = self.trained, "rebuilt inverted lists");
        Ok(())
    }

    fn memory_bytes(&self) -> usize {
        let floats = self.vectors.capacity() + self.centroids.capacity();
        let slots: usize =
            self.lists.iter().map(Vec::capacity).sum::<usize>() + self.pending.capacity();
        floats * std::mem::size_of::<f32>() + slots * std::mem::size_of::<Slot>()
    }

    fn save(&self, base: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_ivf_index".to_string(),
            cause: e.to_string(),
        })?;
        write_atomic(&sidecar_path(base, Sidecar::Index), &bytes)
    }
}

/// Lloyd's k-means over `data`, returning `k` row-major centroids.
///
/// Requires `data.len() >= k`. Seeds with evenly spaced samples so the same
/// input always yields the same centroids.
fn kmeans(data: &[&[f32]], dim: usize, k: usize) -> Vec<f32> {
    let n = data.len();
    let mut centroids = vec![0.0f32; k * dim];
    for c in 0..k {
        let idx = c * n / k;
        centroids[c * dim..(c + 1) * dim].copy_from_slice(data[idx]);
    }

    let mut assignments = vec![0usize; n];
    let mut sums = vec![0.0f32; k * dim];
    let mut counts = vec![0usize; k];

    for iter in 0..MAX_ITERS {
        // Assignment step: nearest centroid per point
        for (i, point) in data.iter().enumerate() {
            let mut best_c = 0;
            let mut best_dist = f32::INFINITY;
            for c in 0..k {
                let dist = distance::l2_squared(point, &centroids[c * dim..(c + 1) * dim]);
                if dist < best_dist {
                    best_dist = dist;
                    best_c = c;
                }
            }
            assignments[i] = best_c;
        }

        // Update step: mean of assigned points, empty clusters keep their centroid
        sums.fill(0.0);
        counts.fill(0);
        for (point, &c) in data.iter().zip(&assignments) {
            counts[c] += 1;
            for (sum, value) in sums[c * dim..(c + 1) * dim].iter_mut().zip(point.iter()) {
                *sum += value;
            }
        }

        let mut max_shift = 0.0f32;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            let centroid = &mut centroids[c * dim..(c + 1) * dim];
            let mut shift = 0.0f32;
            for (value, sum) in centroid.iter_mut().zip(&sums[c * dim..(c + 1) * dim]) {
                let updated = sum * inv;
                shift += (updated - *value) * (updated - *value);
                *value = updated;
            }
            max_shift = max_shift.max(shift);
        }

        if max_shift < TOLERANCE {
            debug!(iterations = iter + 1, "k-means converged");
            break;
        }
    }

    centroids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::vector::FlatIndex;
    use tempfile::TempDir;

    fn create_normalized_embedding(dimensions: usize, seed: f32) -> Vec<f32> {
        let mut raw: Vec<f32> = (0..dimensions)
            .map(|i| (i as f32 * 0.7 + seed * 1.3).sin())
            .collect();
        distance::normalize(&mut raw);
        raw
    }

    fn embeddings(count: usize, dimensions: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|i| create_normalized_embedding(dimensions, i as f32))
            .collect()
    }

    #[test]
    fn test_untrained_search_matches_flat() {
        let mut ivf = IvfIndex::new(8, Metric::Cosine, 10, 2);
        let mut flat = FlatIndex::new(8, Metric::Cosine);
        let vectors = embeddings(10, 8);
        ivf.add(&vectors).expect("add failed");
        flat.add(&vectors).expect("add failed");

        assert!(!ivf.is_trained());
        assert_eq!(ivf.pending_len(), 10);
        let query = create_normalized_embedding(8, 3.2);
        assert_eq!(
            ivf.search(&query, 5).expect("search failed"),
            flat.search(&query, 5).expect("search failed")
        );
    }

    #[test]
    fn test_trains_after_exceeding_cluster_count() {
        let mut ivf = IvfIndex::new(8, Metric::Cosine, 4, 4);
        let vectors = embeddings(5, 8);

        ivf.add(&vectors[..4]).expect("add failed");
        assert!(!ivf.is_trained());

        ivf.add(&vectors[4..]).expect("add failed");
        assert!(ivf.is_trained());
        assert_eq!(ivf.pending_len(), 0);
        assert_eq!(ivf.lists.iter().map(Vec::len).sum::<usize>(), 5);
    }

    #[test]
    fn test_full_probe_equals_exact() {
        let mut ivf = IvfIndex::new(8, Metric::Euclidean, 4, 4);
        let mut flat = FlatIndex::new(8, Metric::Euclidean);
        let vectors = embeddings(40, 8);
        ivf.add(&vectors).expect("add failed");
        flat.add(&vectors).expect("add failed");

        assert!(ivf.is_trained());
        let query = create_normalized_embedding(8, 17.5);
        assert_eq!(
            ivf.search(&query, 10).expect("search failed"),
            flat.search(&query, 10).expect("search failed")
        );
    }

    #[test]
    fn test_exact_vector_found_with_single_probe() {
        let mut ivf = IvfIndex::new(8, Metric::Cosine, 4, 1);
        let vectors = embeddings(30, 8);
        ivf.add(&vectors).expect("add failed");

        let results = ivf.search(&vectors[12], 1).expect("search failed");
        assert_eq!(results[0].0, 12);
        assert!(results[0].1 > 0.999);
    }

    #[test]
    fn test_explicit_train_with_too_few_vectors_is_noop() {
        let mut ivf = IvfIndex::new(4, Metric::Cosine, 8, 2);
        ivf.train(&embeddings(3, 4)).expect("train failed");
        assert!(!ivf.is_trained());

        ivf.train(&embeddings(8, 4)).expect("train failed");
        assert!(ivf.is_trained());
    }

    #[test]
    fn test_kmeans_is_deterministic() {
        let vectors = embeddings(50, 6);
        let sample: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
        assert_eq!(kmeans(&sample, 6, 5), kmeans(&sample, 6, 5));
    }

    #[test]
    fn test_repair_rebuilds_lists() {
        let mut ivf = IvfIndex::new(8, Metric::Cosine, 3, 3);
        ivf.add(&embeddings(12, 8)).expect("add failed");
        for list in &mut ivf.lists {
            list.clear();
        }
        assert!(!ivf.is_well_formed());

        ivf.repair().expect("repair failed");
        assert!(ivf.is_well_formed());
        assert_eq!(ivf.search(&embeddings(12, 8)[7], 1).expect("search failed")[0].0, 7);
    }

    #[test]
    fn test_persistence_preserves_training() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("ivf");

        let mut ivf = IvfIndex::new(8, Metric::Cosine, 4, 2);
        ivf.add(&embeddings(20, 8)).expect("add failed");
        ivf.save(&base).expect("save failed");

        let loaded = IvfIndex::load(&base, 8, Metric::Cosine, 4, 2).expect("load failed");
        assert_eq!(loaded, ivf);
        assert!(loaded.is_trained());

        assert!(IvfIndex::load(&base, 8, Metric::Cosine, 5, 2).is_err());
    }

    #[test]
    fn test_emptied_keeps_quantizer() {
        let mut ivf = IvfIndex::new(8, Metric::Cosine, 4, 1);
        let vectors = embeddings(20, 8);
        ivf.add(&vectors).expect("add failed");
        assert!(ivf.is_trained());

        let mut fresh = ivf.emptied().expect("emptied failed");
        assert!(fresh.is_trained());
        assert_eq!(fresh.len(), 0);

        // Fewer vectors than clusters still land in trained lists
        let slots = fresh.add(&vectors[..2]).expect("add failed");
        assert_eq!(slots, vec![0, 1]);
        assert!(fresh.is_trained());
        assert_eq!(fresh.search(&vectors[1], 1).expect("search failed")[0].0, 1);
    }

    #[test]
    fn test_emptied_untrained_stays_untrained() {
        let mut ivf = IvfIndex::new(8, Metric::Cosine, 10, 2);
        ivf.add(&embeddings(3, 8)).expect("add failed");
        let fresh = ivf.emptied().expect("emptied failed");
        assert!(!fresh.is_trained());
        assert!(fresh.is_empty());
    }
}
