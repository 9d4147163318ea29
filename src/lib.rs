//! # vecstore
//!
//! Named similarity-search collections over fixed-dimension feature vectors.
//!
//! A [`VectorStore`] keys vectors by opaque string ids and delegates the
//! numeric work to one of several interchangeable index backends. A
//! [`StoreRegistry`] owns many stores rooted at a single directory.
//!
//! ## Features
//!
//! - Exact (`flat`), coarse-quantized (`quantized`, IVF) and graph (`graph`,
//!   HNSW) backends, plus a pure-arithmetic `fallback`
//! - Soft deletes with copy-then-swap compaction
//! - Self-describing on-disk sidecars (`.meta`, `.index`, `.raw`)
//! - Cosine, euclidean and inner-product scoring with identical ranking
//!   semantics across backends
//!
//! ## Example
//!
//! ```rust
//! use vecstore::{Metric, SearchOptions, StoreConfig, VectorStore};
//!
//! # fn main() -> vecstore::Result<()> {
//! let mut store = VectorStore::new("items", StoreConfig::new(4).with_metric(Metric::Cosine))?;
//! store.add("a", &[1.0, 0.0, 0.0, 0.0], None, true)?;
//! store.add("b", &[0.0, 1.0, 0.0, 0.0], None, true)?;
//!
//! let hits = store.search(&[1.0, 0.0, 0.0, 0.0], &SearchOptions::new().with_top_k(1))?;
//! assert_eq!(hits[0].id, "a");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::VecstoreConfig;
pub use models::{
    BackendKind, Metadata, Metric, SearchHit, SearchOptions, StoreConfig, StoreStats,
};
pub use services::{StoreRegistry, VectorStore};
pub use storage::VectorIndex;

/// Error type for vecstore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Zero dimension, bad cluster/probe parameters, unreadable backend kind |
/// | `DimensionMismatch` | Wrong vector length while `strict_dimensions` is enabled |
/// | `Persistence` | Missing or corrupt sidecar, inconsistent mapping tables on load |
/// | `InvalidInput` | Batch length mismatch, NaN or infinite vector components, invalid store names |
/// | `OperationFailed` | Filesystem I/O, usearch library failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The store configuration cannot be honored.
    ///
    /// Raised at construction and never recovered.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A vector had the wrong length and the store is in strict mode.
    ///
    /// Outside strict mode mismatches are repaired by truncation or
    /// zero-padding instead.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The configured dimension.
        expected: usize,
        /// The length of the rejected vector.
        actual: usize,
    },

    /// Persisted state is missing, unreadable or inconsistent.
    ///
    /// `load` never returns a partially initialized store.
    #[error("persistence failure at '{path}': {cause}")]
    Persistence {
        /// The sidecar involved.
        path: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for vecstore operations.
pub type Result<T> = std::result::Result<T, Error>;
