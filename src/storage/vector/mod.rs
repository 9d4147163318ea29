//! Vector backend implementations.
//!
//! | Backend | Type | Exact | Persisted as |
//! |---------|------|-------|--------------|
//! | Flat | [`FlatIndex`] | yes | `.index` |
//! | Quantized | [`IvfIndex`] | no | `.index` |
//! | Graph | `HnswIndex` (`usearch-hnsw`) | no | `.index` |
//! | Fallback | [`FallbackIndex`] | yes | `.raw` |

pub mod distance;
mod fallback;
mod flat;
mod ivf;
mod usearch;

pub use fallback::FallbackIndex;
pub use flat::FlatIndex;
pub use ivf::IvfIndex;
#[cfg(feature = "usearch-hnsw")]
pub use usearch::HnswIndex;
pub use usearch::graph_available;

use crate::models::{BackendKind, StoreConfig};
use crate::storage::traits::VectorIndex;
use crate::Result;
use std::path::Path;
use tracing::warn;

/// Resolves the backend that will actually serve a requested kind.
///
/// Graph degrades to fallback when usearch is not compiled in; every other
/// kind is always available.
#[must_use]
pub const fn effective_backend(requested: BackendKind) -> BackendKind {
    match requested {
        BackendKind::Graph if !graph_available() => BackendKind::Fallback,
        other => other,
    }
}

/// Creates an empty backend for `config`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the native index
/// cannot be created.
pub fn create_index(config: &StoreConfig) -> Result<Box<dyn VectorIndex>> {
    config.validate()?;
    let dimension = config.dimension;
    let metric = config.metric;

    let backend = effective_backend(config.backend);
    if backend != config.backend {
        warn!(
            requested = %config.backend,
            effective = %backend,
            "graph backend unavailable, using fallback"
        );
    }

    Ok(match backend {
        BackendKind::Flat => Box::new(FlatIndex::new(dimension, metric)),
        BackendKind::Quantized => Box::new(IvfIndex::new(
            dimension,
            metric,
            config.n_clusters,
            config.n_probe,
        )),
        BackendKind::Graph => create_graph(config)?,
        BackendKind::Fallback => Box::new(FallbackIndex::new(dimension, metric)),
    })
}

/// Loads the backend saved at `base` for a store with `config`.
///
/// `config.backend` must be the backend that was active at save time.
///
/// # Errors
///
/// Returns [`Error::Configuration`](crate::Error::Configuration) for a graph store when usearch is not
/// compiled in, and [`Error::Persistence`](crate::Error::Persistence) if the sidecar is unusable.
pub fn load_index(config: &StoreConfig, base: &Path) -> Result<Box<dyn VectorIndex>> {
    let dimension = config.dimension;
    let metric = config.metric;

    Ok(match config.backend {
        BackendKind::Flat => Box::new(FlatIndex::load(base, dimension, metric)?),
        BackendKind::Quantized => Box::new(IvfIndex::load(
            base,
            dimension,
            metric,
            config.n_clusters,
            config.n_probe,
        )?),
        BackendKind::Graph => load_graph(config, base)?,
        BackendKind::Fallback => Box::new(FallbackIndex::load(base, dimension, metric)?),
    })
}

#[cfg(feature = "usearch-hnsw")]
fn create_graph(config: &StoreConfig) -> Result<Box<dyn VectorIndex>> {
    Ok(Box::new(HnswIndex::new(config.dimension, config.metric)?))
}

#[cfg(not(feature = "usearch-hnsw"))]
fn create_graph(config: &StoreConfig) -> Result<Box<dyn VectorIndex>> {
    Ok(Box::new(FallbackIndex::new(config.dimension, config.metric)))
}

#[cfg(feature = "usearch-hnsw")]
fn load_graph(config: &StoreConfig, base: &Path) -> Result<Box<dyn VectorIndex>> {
    Ok(Box::new(HnswIndex::load(
        base,
        config.dimension,
        config.metric,
    )?))
}

#[cfg(not(feature = "usearch-hnsw"))]
fn load_graph(_config: &StoreConfig, base: &Path) -> Result<Box<dyn VectorIndex>> {
    Err(crate::Error::Configuration(format!(
        "store at {} was saved with the graph backend, which requires the usearch-hnsw feature",
        base.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::Metric;
    use tempfile::TempDir;

    #[test]
    fn test_effective_backend() {
        assert_eq!(effective_backend(BackendKind::Flat), BackendKind::Flat);
        assert_eq!(
            effective_backend(BackendKind::Quantized),
            BackendKind::Quantized
        );
        assert_eq!(
            effective_backend(BackendKind::Fallback),
            BackendKind::Fallback
        );
        let graph = effective_backend(BackendKind::Graph);
        if graph_available() {
            assert_eq!(graph, BackendKind::Graph);
        } else {
            assert_eq!(graph, BackendKind::Fallback);
        }
    }

    #[test]
    fn test_create_index_kinds() {
        let flat = create_index(&StoreConfig::new(4)).expect("create failed");
        assert_eq!(flat.kind(), BackendKind::Flat);

        let ivf = create_index(
            &StoreConfig::new(4)
                .with_backend(BackendKind::Quantized)
                .with_clusters(8, 2),
        )
        .expect("create failed");
        assert_eq!(ivf.kind(), BackendKind::Quantized);
        assert!(!ivf.is_trained());

        let graph = create_index(&StoreConfig::new(4).with_backend(BackendKind::Graph))
            .expect("create failed");
        assert_eq!(graph.kind(), effective_backend(BackendKind::Graph));
    }

    #[test]
    fn test_create_index_rejects_invalid_config() {
        assert!(matches!(
            create_index(&StoreConfig::new(0)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_load_roundtrip_through_factory() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        let config = StoreConfig::new(3)
            .with_backend(BackendKind::Fallback)
            .with_metric(Metric::Euclidean);

        let mut index = create_index(&config).expect("create failed");
        index.add(&[vec![1.0, 2.0, 3.0]]).expect("add failed");
        index.save(&base).expect("save failed");

        let loaded = load_index(&config, &base).expect("load failed");
        assert_eq!(loaded.kind(), BackendKind::Fallback);
        assert_eq!(loaded.reconstruct(0), Some(vec![1.0, 2.0, 3.0]));
    }

    #[cfg(not(feature = "usearch-hnsw"))]
    #[test]
    fn test_load_graph_without_usearch_is_configuration_error() {
        let dir = TempDir::new().expect("tempdir failed");
        let config = StoreConfig::new(3).with_backend(BackendKind::Graph);
        assert!(matches!(
            load_index(&config, &dir.path().join("items")),
            Err(Error::Configuration(_))
        ));
    }
}
