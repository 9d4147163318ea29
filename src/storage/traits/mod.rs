//! Storage backend traits.

mod vector;

pub use vector::{Slot, VectorIndex};
