//! Data models for vecstore.

mod search;
mod store;

pub use search::{SearchHit, SearchOptions};
pub use store::{
    BackendKind, DEFAULT_N_CLUSTERS, DEFAULT_N_PROBE, Metric, StoreConfig, StoreStats,
};

/// Free-form metadata attached to a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
