//! usearch HNSW graph backend.
//!
//! Provides approximate nearest neighbor search using a Hierarchical
//! Navigable Small World (HNSW) graph. Incrementally buildable and always
//! ready, at the cost of more memory per vector than the flat layouts.
//!
//! Only compiled with the `usearch-hnsw` feature. Without it, stores asking
//! for the graph backend get [`FallbackIndex`](super::FallbackIndex) instead.

/// Returns true if the usearch library is compiled in.
#[must_use]
pub const fn graph_available() -> bool {
    cfg!(feature = "usearch-hnsw")
}

#[cfg(feature = "usearch-hnsw")]
mod native {
    use crate::models::{BackendKind, Metric};
    use crate::storage::persistence::{
        Sidecar, commit, ensure_parent, persistence_error, sidecar_path, temp_path,
    };
    use crate::storage::traits::{Slot, VectorIndex};
    use crate::storage::vector::distance;
    use crate::{Error, Result};
    use std::path::Path;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    /// Graph degree (`M`).
    const HNSW_CONNECTIVITY: usize = 16;

    /// Candidate list size while inserting (`ef_construction`).
    const HNSW_EXPANSION_ADD: usize = 128;

    /// Candidate list size while querying (`ef`).
    const HNSW_EXPANSION_SEARCH: usize = 64;

    /// Capacity reserved for a new index.
    const INITIAL_CAPACITY: usize = 1024;

    /// Native usearch-based graph index.
    ///
    /// Keys are store slots. Nothing is ever removed from the graph: soft
    /// deletes live in the store and compaction builds a fresh index.
    pub struct HnswIndex {
        /// Vector dimension.
        dimensions: usize,
        /// Scoring metric.
        metric: Metric,
        /// Underlying graph.
        index: Index,
    }

    impl HnswIndex {
        /// Creates an empty HNSW index.
        ///
        /// # Errors
        ///
        /// Returns an error if the index cannot be created.
        pub fn new(dimensions: usize, metric: Metric) -> Result<Self> {
            let index = Index::new(&options(dimensions, metric)).map_err(|e| {
                Error::OperationFailed {
                    operation: "create_usearch_index".to_string(),
                    cause: e.to_string(),
                }
            })?;

            index
                .reserve(INITIAL_CAPACITY)
                .map_err(|e| Error::OperationFailed {
                    operation: "reserve_usearch_capacity".to_string(),
                    cause: e.to_string(),
                })?;

            Ok(Self {
                dimensions,
                metric,
                index,
            })
        }

        /// Loads the index saved for the store rooted at `base`.
        ///
        /// # Errors
        ///
        /// Returns [`Error::Persistence`] if the sidecar is missing or cannot
        /// be parsed by usearch.
        pub fn load(base: &Path, dimensions: usize, metric: Metric) -> Result<Self> {
            let path = sidecar_path(base, Sidecar::Index);
            if !path.is_file() {
                return Err(persistence_error(&path, "graph index sidecar missing"));
            }

            let index = Index::new(&options(dimensions, metric))
                .map_err(|e| persistence_error(&path, e))?;
            index
                .load(path.to_string_lossy().as_ref())
                .map_err(|e| persistence_error(&path, e))?;

            if index.dimensions() != dimensions {
                return Err(persistence_error(
                    &path,
                    format!(
                        "graph is {}-d, store expects {dimensions}-d",
                        index.dimensions()
                    ),
                ));
            }

            Ok(Self {
                dimensions,
                metric,
                index,
            })
        }

        /// Grows capacity so `additional` more vectors fit.
        fn ensure_capacity(&self, additional: usize) -> Result<()> {
            let needed = self.index.size() + additional;
            if needed <= self.index.capacity() {
                return Ok(());
            }
            let target = needed.max(self.index.capacity() * 2);
            self.index
                .reserve(target)
                .map_err(|e| Error::OperationFailed {
                    operation: "reserve_usearch_capacity".to_string(),
                    cause: e.to_string(),
                })
        }

        /// Converts a usearch distance into a store score.
        fn to_score(&self, distance: f32) -> f32 {
            match self.metric {
                // IP distance is `1 - dot`
                Metric::Cosine | Metric::InnerProduct => 1.0 - distance,
                Metric::Euclidean => distance::euclidean_score(distance),
            }
        }
    }

    fn options(dimensions: usize, metric: Metric) -> IndexOptions {
        IndexOptions {
            dimensions,
            // Cosine vectors arrive normalized, so inner product is exact
            // and skips usearch's own normalization.
            metric: match metric {
                Metric::Cosine | Metric::InnerProduct => MetricKind::IP,
                Metric::Euclidean => MetricKind::L2sq,
            },
            quantization: ScalarKind::F32,
            connectivity: HNSW_CONNECTIVITY,
            expansion_add: HNSW_EXPANSION_ADD,
            expansion_search: HNSW_EXPANSION_SEARCH,
            multi: false,
        }
    }

    impl VectorIndex for HnswIndex {
        fn kind(&self) -> BackendKind {
            BackendKind::Graph
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn len(&self) -> usize {
            self.index.size()
        }

        fn emptied(&self) -> Result<Box<dyn VectorIndex>> {
            Ok(Box::new(Self::new(self.dimensions, self.metric)?))
        }

        fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<Slot>> {
            if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions,
                    actual: bad.len(),
                });
            }

            self.ensure_capacity(vectors.len())?;
            let start = self.index.size() as Slot;
            let mut slots = Vec::with_capacity(vectors.len());
            for (offset, vector) in vectors.iter().enumerate() {
                let slot = start + offset as Slot;
                self.index
                    .add(slot, vector.as_slice())
                    .map_err(|e| Error::OperationFailed {
                        operation: "usearch_add".to_string(),
                        cause: e.to_string(),
                    })?;
                slots.push(slot);
            }
            Ok(slots)
        }

        fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Slot, f32)>> {
            if query.len() != self.dimensions {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions,
                    actual: query.len(),
                });
            }

            if self.index.size() == 0 || k == 0 {
                return Ok(Vec::new());
            }

            let matches = self
                .index
                .search(query, k)
                .map_err(|e| Error::OperationFailed {
                    operation: "usearch_search".to_string(),
                    cause: e.to_string(),
                })?;

            Ok(matches
                .keys
                .iter()
                .zip(matches.distances.iter())
                .map(|(&key, &distance)| (key, self.to_score(distance)))
                .collect())
        }

        fn reconstruct(&self, slot: Slot) -> Option<Vec<f32>> {
            let mut buffer = vec![0.0f32; self.dimensions];
            match self.index.get(slot, &mut buffer) {
                Ok(found) if found > 0 => Some(buffer),
                _ => None,
            }
        }

        fn memory_bytes(&self) -> usize {
            self.index.memory_usage()
        }

        fn save(&self, base: &Path) -> Result<()> {
            let path = sidecar_path(base, Sidecar::Index);
            ensure_parent(&path)?;
            let temp = temp_path(&path);
            self.index
                .save(temp.to_string_lossy().as_ref())
                .map_err(|e| Error::OperationFailed {
                    operation: "save_usearch_index".to_string(),
                    cause: e.to_string(),
                })?;
            commit(&temp, &path)
        }
    }

}

#[cfg(feature = "usearch-hnsw")]
pub use native::HnswIndex;
