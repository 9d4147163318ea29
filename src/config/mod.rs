//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `VECSTORE_DATA_DIR` | `data_dir` |
//! | `VECSTORE_LOG_FORMAT` | `logging.format` |
//! | `VECSTORE_LOG_FILE` | `logging.file` |
//!
//! # Example File
//!
//! ```toml
//! data_dir = "/var/lib/vecstore"
//! large_stores = ["memories", "documents"]
//!
//! [store]
//! dimension = 384
//! backend = "flat"
//! metric = "cosine"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use crate::models::{BackendKind, Metric, StoreConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default vector dimension for stores created without an explicit one.
pub const DEFAULT_DIMENSION: usize = 384;

/// Store names that default to the graph backend.
pub const DEFAULT_LARGE_STORES: [&str; 4] = ["memories", "documents", "chunks", "embeddings"];

/// Main configuration for vecstore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecstoreConfig {
    /// Root directory of the store registry.
    pub data_dir: PathBuf,
    /// Defaults for newly created stores.
    pub store: StoreConfig,
    /// Names expected to grow large.
    pub large_stores: Vec<String>,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive used when `VECSTORE_LOG` and `RUST_LOG` are unset.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
    /// Optional log file; logs go to stderr otherwise.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Large store names.
    pub large_stores: Option<Vec<String>>,
    /// Store defaults.
    pub store: Option<ConfigFileStore>,
    /// Logging configuration.
    pub logging: Option<ConfigFileLogging>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileStore {
    /// Vector dimension.
    pub dimension: Option<usize>,
    /// Backend name.
    pub backend: Option<String>,
    /// Metric name.
    pub metric: Option<String>,
    /// Coarse cluster count.
    pub n_clusters: Option<usize>,
    /// Clusters probed per query.
    pub n_probe: Option<usize>,
    /// Keep raw vector copies.
    pub retain_vectors: Option<bool>,
    /// Reject wrong vector lengths.
    pub strict_dimensions: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// Output format.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for VecstoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreConfig::new(DEFAULT_DIMENSION),
            large_stores: DEFAULT_LARGE_STORES.iter().map(ToString::to_string).collect(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Platform data directory, or `./vecstore-data` if it cannot be resolved.
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "vecstore").map_or_else(
        || PathBuf::from("vecstore-data"),
        |dirs| dirs.data_dir().join("stores"),
    )
}

impl VecstoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("vecstore").join("config.toml"))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown backend or metric.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the text is not a valid
    /// configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Returns default configuration if no config file is found or it cannot
    /// be parsed.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        Self::load_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
            Self::default()
        })
    }

    /// Converts a `ConfigFile` to `VecstoreConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(large_stores) = file.large_stores {
            config.large_stores = large_stores;
        }
        if let Some(store) = file.store {
            if let Some(dimension) = store.dimension {
                config.store.dimension = dimension;
            }
            if let Some(backend) = store.backend {
                config.store.backend = BackendKind::parse(&backend)
                    .ok_or_else(|| Error::Configuration(format!("unknown backend '{backend}'")))?;
            }
            if let Some(metric) = store.metric {
                config.store.metric = Metric::parse(&metric)
                    .ok_or_else(|| Error::Configuration(format!("unknown metric '{metric}'")))?;
            }
            if let Some(n_clusters) = store.n_clusters {
                config.store.n_clusters = n_clusters;
            }
            if let Some(n_probe) = store.n_probe {
                config.store.n_probe = n_probe;
            }
            if let Some(retain) = store.retain_vectors {
                config.store.retain_vectors = retain;
            }
            if let Some(strict) = store.strict_dimensions {
                config.store.strict_dimensions = strict;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = format;
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config.store.validate()?;
        Ok(config)
    }

    /// Applies `VECSTORE_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_value("VECSTORE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(format) = env_value("VECSTORE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(file) = env_value("VECSTORE_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets the defaults for new stores.
    #[must_use]
    pub fn with_store_defaults(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
