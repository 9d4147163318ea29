//! Storage layer.
//!
//! This module provides the two lower layers of a vector store:
//! - **Vector**: index backends (flat, IVF, usearch HNSW, fallback matrix)
//! - **Persistence**: the on-disk sidecar format shared by every store

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]
// Slot numbers are u64 on disk and usize in memory; stores never approach either limit.
#![allow(clippy::cast_possible_truncation)]
// Allow match_same_arms for explicit enum handling.
#![allow(clippy::match_same_arms)]

pub mod persistence;
pub mod traits;
pub mod vector;

pub use traits::VectorIndex;
