//! Store services.
//!
//! Services own the backends and provide the caller-facing operations.

mod registry;
mod store;

pub use registry::StoreRegistry;
pub use store::VectorStore;
