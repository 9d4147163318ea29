//! Exact brute-force index.
//!
//! Vectors live in one contiguous row-major buffer; every search scores
//! every row. Always trained, O(n·d) per query.

use super::distance;
use crate::models::{BackendKind, Metric};
use crate::storage::persistence::{Sidecar, persistence_error, read_sidecar, sidecar_path, write_atomic};
use crate::storage::traits::{Slot, VectorIndex};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Exact flat index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    /// Vector dimension.
    dimensions: usize,
    /// Scoring metric.
    metric: Metric,
    /// Row-major vector data.
    data: Vec<f32>,
}

/// Serialized form of the flat index.
#[derive(Serialize, Deserialize)]
struct FlatState {
    dimensions: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Creates an empty flat index.
    #[must_use]
    pub const fn new(dimensions: usize, metric: Metric) -> Self {
        Self {
            dimensions,
            metric,
            data: Vec::new(),
        }
    }

    /// Loads the index saved for the store rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the sidecar is missing or does not
    /// match the expected dimension and metric.
    pub fn load(base: &Path, dimensions: usize, metric: Metric) -> Result<Self> {
        let path = sidecar_path(base, Sidecar::Index);
        let bytes = read_sidecar(&path)?;
        let state: FlatState =
            serde_json::from_slice(&bytes).map_err(|e| persistence_error(&path, e))?;

        if state.dimensions != dimensions || state.metric != metric {
            return Err(persistence_error(
                &path,
                format!(
                    "index is {}-d {}, store expects {dimensions}-d {metric}",
                    state.dimensions, state.metric
                ),
            ));
        }
        if state.data.len() % dimensions != 0 {
            return Err(persistence_error(&path, "vector data is not whole rows"));
        }

        Ok(Self {
            dimensions,
            metric,
            data: state.data,
        })
    }

    fn rows(&self) -> impl Iterator<Item = (Slot, &[f32])> {
        self.data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(i, row)| (i as Slot, row))
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Flat
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    fn emptied(&self) -> Result<Box<dyn VectorIndex>> {
        Ok(Box::new(Self::new(self.dimensions, self.metric)))
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<Slot>> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }

        let start = self.len() as Slot;
        self.data.reserve(vectors.len() * self.dimensions);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok((start..start + vectors.len() as Slot).collect())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Slot, f32)>> {
        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        Ok(distance::scan(self.metric, query, self.rows(), k))
    }

    fn reconstruct(&self, slot: Slot) -> Option<Vec<f32>> {
        let start = usize::try_from(slot).ok()?.checked_mul(self.dimensions)?;
        self.data
            .get(start..start + self.dimensions)
            .map(<[f32]>::to_vec)
    }

    fn memory_bytes(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<f32>()
    }

    fn save(&self, base: &Path) -> Result<()> {
        let state = FlatState {
            dimensions: self.dimensions,
            metric: self.metric,
            data: self.data.clone(),
        };
        let bytes = serde_json::to_vec(&state).map_err(|e| Error::OperationFailed {
            operation: "serialize_flat_index".to_string(),
            cause: e.to_string(),
        })?;
        write_atomic(&sidecar_path(base, Sidecar::Index), &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_add_assigns_sequential_slots() {
        let mut index = FlatIndex::new(2, Metric::InnerProduct);
        assert_eq!(index.add(&[vec![1.0, 0.0]]).expect("add failed"), vec![0]);
        assert_eq!(
            index
                .add(&[vec![0.0, 1.0], vec![1.0, 1.0]])
                .expect("add failed"),
            vec![1, 2]
        );
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(2, Metric::Cosine);
        assert!(index.add(&[vec![1.0, 0.0, 0.0]]).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_exact_ranking() {
        let mut index = FlatIndex::new(2, Metric::InnerProduct);
        index
            .add(&[vec![1.0, 0.0], vec![3.0, 0.0], vec![2.0, 0.0]])
            .expect("add failed");

        let ranked = index.search(&[1.0, 0.0], 3).expect("search failed");
        let slots: Vec<Slot> = ranked.iter().map(|(s, _)| *s).collect();
        assert_eq!(slots, vec![1, 2, 0]);
    }

    #[test]
    fn test_search_empty() {
        let index = FlatIndex::new(3, Metric::Cosine);
        assert!(index.search(&[1.0, 0.0, 0.0], 5).expect("search failed").is_empty());
    }

    #[test]
    fn test_reconstruct() {
        let mut index = FlatIndex::new(2, Metric::Euclidean);
        index.add(&[vec![0.5, 0.25]]).expect("add failed");
        assert_eq!(index.reconstruct(0), Some(vec![0.5, 0.25]));
        assert_eq!(index.reconstruct(1), None);
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("flat");

        let mut index = FlatIndex::new(2, Metric::Euclidean);
        index
            .add(&[vec![0.1, 0.2], vec![0.3, 0.4]])
            .expect("add failed");
        index.save(&base).expect("save failed");

        let loaded = FlatIndex::load(&base, 2, Metric::Euclidean).expect("load failed");
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_rejects_other_metric() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("flat");
        FlatIndex::new(2, Metric::Euclidean)
            .save(&base)
            .expect("save failed");

        assert!(FlatIndex::load(&base, 2, Metric::Cosine).is_err());
        assert!(FlatIndex::load(&base, 3, Metric::Euclidean).is_err());
    }
}
