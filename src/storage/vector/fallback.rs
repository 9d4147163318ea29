//! Pure-arithmetic fallback backend.
//!
//! Stands in for the usearch graph when the `usearch-hnsw` feature is not
//! compiled in. It is a dense matrix with a linear scan: slower than HNSW at
//! scale, but it scores with the same kernel and breaks ties the same way as
//! [`FlatIndex`](super::FlatIndex), so callers cannot tell the difference
//! apart from throughput.
//!
//! Persisted as a `.raw` matrix dump instead of a native index.

use super::distance;
use crate::models::{BackendKind, Metric};
use crate::storage::persistence::{Sidecar, persistence_error, read_matrix, sidecar_path, write_matrix};
use crate::storage::traits::{Slot, VectorIndex};
use crate::{Error, Result};
use std::path::Path;

/// Initial row capacity reserved for a new matrix.
const INITIAL_ROWS: usize = 1024;

/// Dense-matrix linear-scan backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackIndex {
    /// Vector dimension.
    dimensions: usize,
    /// Scoring metric.
    metric: Metric,
    /// Row-major matrix, one row per slot.
    matrix: Vec<f32>,
}

impl FallbackIndex {
    /// Creates an empty fallback matrix.
    #[must_use]
    pub fn new(dimensions: usize, metric: Metric) -> Self {
        Self {
            dimensions,
            metric,
            matrix: Vec::with_capacity(INITIAL_ROWS.saturating_mul(dimensions).min(1 << 20)),
        }
    }

    /// Loads the matrix dump saved for the store rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the dump is missing, corrupt, or of
    /// another dimension.
    pub fn load(base: &Path, dimensions: usize, metric: Metric) -> Result<Self> {
        let path = sidecar_path(base, Sidecar::Raw);
        let (stored, matrix) = read_matrix(&path)?;
        if stored != dimensions {
            return Err(persistence_error(
                &path,
                format!("matrix is {stored}-d, store expects {dimensions}-d"),
            ));
        }
        Ok(Self {
            dimensions,
            metric,
            matrix,
        })
    }
}

impl VectorIndex for FallbackIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.matrix.len() / self.dimensions
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
        for vector in vectors {
            self.matrix.extend_from_slice(vector);
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
        let rows = self
            .matrix
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(i, row)| (i as Slot, row));
        Ok(distance::scan(self.metric, query, rows, k))
    }

    fn reconstruct(&self, slot: Slot) -> Option<Vec<f32>> {
        let row = usize::try_from(slot).ok()?;
        self.matrix
            .chunks_exact(self.dimensions)
            .nth(row)
            .map(<[f32]>::to_vec)
    }

    fn repair(&mut self) -> Result<()> {
        // A torn append can leave a partial trailing row.
        let whole = self.len() * self.dimensions;
        self.matrix.truncate(whole);
        Ok(())
    }

    fn memory_bytes(&self) -> usize {
        self.matrix.capacity() * std::mem::size_of::<f32>()
    }

    fn save(&self, base: &Path) -> Result<()> {
        write_matrix(&sidecar_path(base, Sidecar::Raw), self.dimensions, &self.matrix)
    }
}
