//! Store configuration and statistics.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of coarse clusters for the quantized backend.
pub const DEFAULT_N_CLUSTERS: usize = 100;

/// Default number of clusters probed per quantized search.
pub const DEFAULT_N_PROBE: usize = 10;

/// Similarity metric used for scoring.
///
/// Every backend reports scores where larger means more similar:
///
/// | Metric | Score |
/// |--------|-------|
/// | `Cosine` | dot product of L2-normalized vectors |
/// | `InnerProduct` | raw dot product |
/// | `Euclidean` | `1 / (1 + distance)` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine similarity (vectors are normalized on the way in).
    #[default]
    Cosine,
    /// Euclidean (L2) distance mapped into `(0, 1]`.
    Euclidean,
    /// Unnormalized inner product.
    InnerProduct,
}

impl Metric {
    /// Returns the metric as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::InnerProduct => "inner_product",
        }
    }

    /// Parses a metric name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" | "cos" => Some(Self::Cosine),
            "euclidean" | "l2" => Some(Self::Euclidean),
            "inner_product" | "inner-product" | "ip" | "dot" => Some(Self::InnerProduct),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index backend strategy for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Exact brute-force search.
    #[default]
    Flat,
    /// Coarse-quantized (IVF) approximate search; requires training.
    Quantized,
    /// HNSW proximity graph (usearch).
    Graph,
    /// Dense matrix with linear scan, used when usearch is not compiled in.
    Fallback,
}

impl BackendKind {
    /// Returns the backend as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Quantized => "quantized",
            Self::Graph => "graph",
            Self::Fallback => "fallback",
        }
    }

    /// Parses a backend name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flat" | "exact" => Some(Self::Flat),
            "quantized" | "ivf" => Some(Self::Quantized),
            "graph" | "hnsw" => Some(Self::Graph),
            "fallback" | "numpy" | "raw" => Some(Self::Fallback),
            _ => None,
        }
    }

    /// Returns true for backends that trade exactness for speed.
    #[must_use]
    pub const fn is_approximate(&self) -> bool {
        matches!(self, Self::Quantized | Self::Graph)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a single vector store.
///
/// The dimension is fixed for the lifetime of the store.
///
/// # Example
///
/// ```rust
/// use vecstore::{BackendKind, Metric, StoreConfig};
///
/// let config = StoreConfig::new(384)
///     .with_backend(BackendKind::Quantized)
///     .with_metric(Metric::InnerProduct)
///     .with_clusters(256, 16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Vector dimension.
    pub dimension: usize,
    /// Backend strategy.
    pub backend: BackendKind,
    /// Scoring metric.
    pub metric: Metric,
    /// Coarse cluster count (quantized backend only).
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
    /// Clusters probed per query (quantized backend only).
    #[serde(default = "default_n_probe")]
    pub n_probe: usize,
    /// Keep a raw copy of every vector for reconstruction repair.
    #[serde(default)]
    pub retain_vectors: bool,
    /// Reject vectors of the wrong length instead of truncating or padding.
    #[serde(default)]
    pub strict_dimensions: bool,
}

const fn default_n_clusters() -> usize {
    DEFAULT_N_CLUSTERS
}

const fn default_n_probe() -> usize {
    DEFAULT_N_PROBE
}

impl StoreConfig {
    /// Creates a flat cosine configuration for the given dimension.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            backend: BackendKind::Flat,
            metric: Metric::Cosine,
            n_clusters: DEFAULT_N_CLUSTERS,
            n_probe: DEFAULT_N_PROBE,
            retain_vectors: false,
            strict_dimensions: false,
        }
    }

    /// Sets the backend strategy.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the scoring metric.
    #[must_use]
    pub const fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the quantized backend's cluster and probe counts.
    #[must_use]
    pub const fn with_clusters(mut self, n_clusters: usize, n_probe: usize) -> Self {
        self.n_clusters = n_clusters;
        self.n_probe = n_probe;
        self
    }

    /// Enables or disables retention of raw vector copies.
    #[must_use]
    pub const fn with_retained_vectors(mut self, retain: bool) -> Self {
        self.retain_vectors = retain;
        self
    }

    /// Enables or disables strict dimension checking.
    #[must_use]
    pub const fn with_strict_dimensions(mut self, strict: bool) -> Self {
        self.strict_dimensions = strict;
        self
    }

    /// Checks that the configuration can be honored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero dimension or, on the
    /// quantized backend, zero clusters, zero probes, or more probes than
    /// clusters.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Configuration(
                "dimension must be greater than zero".to_string(),
            ));
        }

        if self.backend == BackendKind::Quantized {
            if self.n_clusters == 0 {
                return Err(Error::Configuration(
                    "quantized backend requires at least one cluster".to_string(),
                ));
            }
            if self.n_probe == 0 || self.n_probe > self.n_clusters {
                return Err(Error::Configuration(format!(
                    "n_probe must be in 1..={}, got {}",
                    self.n_clusters, self.n_probe
                )));
            }
        }

        Ok(())
    }
}

/// Point-in-time statistics for a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Live records.
    pub size: usize,
    /// Allocated slots, soft-deleted ones included.
    pub total_size: usize,
    /// Soft-deleted slots awaiting compaction.
    pub deleted_count: usize,
    /// Vector dimension.
    pub dimension: usize,
    /// Active backend.
    pub backend: BackendKind,
    /// Scoring metric.
    pub metric: Metric,
    /// Whether the backend is trained and serving from its index.
    pub trained: bool,
    /// Approximate memory held by the backend and the mapping tables.
    pub memory_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("cosine", Some(Metric::Cosine); "cosine")]
    #[test_case("L2", Some(Metric::Euclidean); "l2 alias")]
    #[test_case("ip", Some(Metric::InnerProduct); "ip alias")]
    #[test_case("manhattan", None; "unknown")]
    fn test_metric_parse(input: &str, expected: Option<Metric>) {
        assert_eq!(Metric::parse(input), expected);
    }

    #[test_case("flat", Some(BackendKind::Flat); "flat")]
    #[test_case("IVF", Some(BackendKind::Quantized); "ivf alias")]
    #[test_case("hnsw", Some(BackendKind::Graph); "hnsw alias")]
    #[test_case("fallback", Some(BackendKind::Fallback); "fallback")]
    #[test_case("lsh", None; "unknown")]
    fn test_backend_parse(input: &str, expected: Option<BackendKind>) {
        assert_eq!(BackendKind::parse(input), expected);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let result = StoreConfig::new(0).validate();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_quantized_params() {
        let base = StoreConfig::new(8).with_backend(BackendKind::Quantized);
        assert!(base.clone().with_clusters(16, 4).validate().is_ok());
        assert!(base.clone().with_clusters(0, 0).validate().is_err());
        assert!(base.clone().with_clusters(4, 0).validate().is_err());
        assert!(base.with_clusters(4, 5).validate().is_err());
    }

    #[test]
    fn test_cluster_params_ignored_for_flat() {
        let config = StoreConfig::new(8).with_clusters(0, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"dimension":3,"backend":"quantized","metric":"euclidean"}"#)
                .expect("parse failed");
        assert_eq!(config.n_clusters, DEFAULT_N_CLUSTERS);
        assert_eq!(config.n_probe, DEFAULT_N_PROBE);
        assert!(!config.retain_vectors);
        assert_eq!(config.metric, Metric::Euclidean);
    }
}
