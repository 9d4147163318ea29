//! Vector index trait.
//!
//! Provides the abstraction layer between a [`VectorStore`] and the data
//! structure that does the numeric work. Backends know nothing about
//! external ids, metadata or soft deletes: they see dense slots only.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Sidecar |
//! |---------|----------|---------|
//! | `FlatIndex` | Exact search, small to medium stores | `.index` |
//! | `IvfIndex` | Coarse-quantized approximate search | `.index` |
//! | `HnswIndex` | usearch HNSW graph (`usearch-hnsw` feature) | `.index` |
//! | `FallbackIndex` | Dense matrix scan when usearch is absent | `.raw` |
//!
//! # Usage Example
//!
//! ```rust
//! use vecstore::storage::VectorIndex;
//! use vecstore::storage::vector::FlatIndex;
//! use vecstore::Metric;
//!
//! # fn main() -> vecstore::Result<()> {
//! let mut index = FlatIndex::new(3, Metric::Euclidean);
//! let slots = index.add(&[vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]])?;
//! assert_eq!(slots, vec![0, 1]);
//!
//! let ranked = index.search(&[0.9, 0.9, 0.9], 1)?;
//! assert_eq!(ranked[0].0, 1);
//! # Ok(())
//! # }
//! ```
//!
//! [`VectorStore`]: crate::VectorStore

use crate::Result;
use crate::models::BackendKind;
use std::path::Path;

/// Dense internal index of a stored vector.
pub type Slot = u64;

/// Trait for vector index backends.
///
/// Slots are assigned by the backend in insertion order starting from the
/// current [`len`](VectorIndex::len), so a store can mirror the allocation
/// without coordination.
///
/// # Implementor Notes
///
/// - Mutating methods take `&mut self`; callers serialize access per store
/// - Vectors arrive already dimension-repaired and, for cosine, normalized
/// - Scores must follow the metric table in [`Metric`](crate::Metric) so
///   results are comparable across backends
pub trait VectorIndex: Send + Sync {
    /// The backend strategy implemented.
    fn kind(&self) -> BackendKind;

    /// The dimensionality of stored vectors.
    fn dimensions(&self) -> usize;

    /// Number of allocated slots.
    fn len(&self) -> usize;

    /// Returns true if no slot has been allocated.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether searches are served by the trained index.
    ///
    /// Backends without a training step are always trained.
    fn is_trained(&self) -> bool {
        true
    }

    /// Trains the backend on a sample of vectors.
    ///
    /// Backends without a training step ignore the call.
    ///
    /// # Errors
    ///
    /// Returns an error if training fails.
    fn train(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let _ = vectors;
        Ok(())
    }

    /// Appends vectors, returning the slot assigned to each.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the vectors.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<Vec<Slot>>;

    /// Returns up to `k` `(slot, score)` pairs ranked by descending score.
    ///
    /// # Errors
    ///
    /// Returns an error if the search operation fails.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(Slot, f32)>>;

    /// Returns the stored vector for a slot, if the backend can produce it.
    fn reconstruct(&self, slot: Slot) -> Option<Vec<f32>>;

    /// Attempts to restore internal consistency after a failed reconstruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the repair itself fails.
    fn repair(&mut self) -> Result<()> {
        Ok(())
    }

    /// Returns an empty index with the same parameters.
    ///
    /// Training state carries over: an empty copy of a trained backend is
    /// trained and routes new vectors with the same quantizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created.
    fn emptied(&self) -> Result<Box<dyn VectorIndex>>;

    /// Approximate heap memory held by the backend.
    fn memory_bytes(&self) -> usize;

    /// Writes the backend's sidecar for the store rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sidecar cannot be written.
    fn save(&self, base: &Path) -> Result<()>;
}
