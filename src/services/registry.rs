//! Registry of named vector stores.
//!
//! A [`StoreRegistry`] maps names to [`VectorStore`]s sharing one root
//! directory. Store `name` lives at base path `<root>/<name>`, so unrelated
//! vector spaces never share ids or dimensions.
//!
//! # Backend Naming Policy
//!
//! | Name | Backend |
//! |------|---------|
//! | listed in `large_stores`, usearch compiled in | graph |
//! | listed in `large_stores`, no usearch | flat |
//! | anything else | configured default |
//!
//! # Example
//!
//! ```rust
//! use vecstore::{StoreConfig, StoreRegistry};
//!
//! # fn main() -> vecstore::Result<()> {
//! let dir = tempfile::tempdir().expect("tempdir");
//! let mut registry = StoreRegistry::new(dir.path(), StoreConfig::new(3));
//!
//! if let Some(store) = registry.get_store("faces", true)? {
//!     store.add("alice", &[0.1, 0.2, 0.3], None, true)?;
//! }
//! registry.save_all()?;
//! assert_eq!(registry.list_stores()?, vec!["faces".to_string()]);
//! # Ok(())
//! # }
//! ```

use super::VectorStore;
use crate::config::{DEFAULT_LARGE_STORES, VecstoreConfig};
use crate::models::{BackendKind, StoreConfig};
use crate::storage::persistence::{self, Sidecar};
use crate::storage::vector::graph_available;
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Owner of every open store under one root.
#[derive(Debug)]
pub struct StoreRegistry {
    /// Directory holding the sidecars.
    root: PathBuf,
    /// Defaults for stores created by name.
    defaults: StoreConfig,
    /// Names that default to the graph backend.
    large_stores: BTreeSet<String>,
    /// Open stores.
    stores: HashMap<String, VectorStore>,
}

impl StoreRegistry {
    /// Creates an empty registry rooted at `root`.
    ///
    /// Nothing is read or created on disk until a store is opened or saved.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, defaults: StoreConfig) -> Self {
        Self {
            root: root.into(),
            defaults,
            large_stores: DEFAULT_LARGE_STORES.iter().map(ToString::to_string).collect(),
            stores: HashMap::new(),
        }
    }

    /// Creates a registry from loaded configuration.
    #[must_use]
    pub fn from_config(config: &VecstoreConfig) -> Self {
        Self::new(config.data_dir.clone(), config.store.clone())
            .with_large_stores(config.large_stores.iter().cloned())
    }

    /// Replaces the set of names that default to the graph backend.
    #[must_use]
    pub fn with_large_stores<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.large_stores = names.into_iter().map(Into::into).collect();
        self
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base path of a store.
    fn base_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Configuration a new store called `name` would get.
    #[must_use]
    pub fn config_for(&self, name: &str) -> StoreConfig {
        let mut config = self.defaults.clone();
        if self.large_stores.contains(name) {
            config.backend = if graph_available() {
                BackendKind::Graph
            } else {
                BackendKind::Flat
            };
        }
        config
    }

    /// Returns true if the store is open.
    #[must_use]
    pub fn is_open(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Opens a store by name.
    ///
    /// Returns the open store if there is one, else loads it from disk if it
    /// was saved, else creates it with [`config_for`](Self::config_for) when
    /// `create` is true. Returns `None` if it exists nowhere and `create` is
    /// false.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid name, and any error
    /// from loading or creating the store.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn get_store(&mut self, name: &str, create: bool) -> Result<Option<&mut VectorStore>> {
        validate_name(name)?;
        if !self.stores.contains_key(name) {
            let base = self.base_path(name);
            let store = if persistence::exists(&base) {
                info!(store = name, "loading store from disk");
                VectorStore::load(&base)?
            } else if create {
                debug!(store = name, "creating store");
                VectorStore::new(name, self.config_for(name))?
            } else {
                return Ok(None);
            };
            self.stores.insert(name.to_string(), store);
        }
        Ok(self.stores.get_mut(name))
    }

    /// Opens a store by name, creating it with an explicit configuration.
    ///
    /// A store that is already open or saved keeps its own configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid name, and any error
    /// from loading or creating the store.
    #[instrument(skip(self, config), fields(root = %self.root.display()))]
    pub fn get_store_with(&mut self, name: &str, config: StoreConfig) -> Result<&mut VectorStore> {
        validate_name(name)?;
        if !self.stores.contains_key(name) {
            let base = self.base_path(name);
            let store = if persistence::exists(&base) {
                VectorStore::load(&base)?
            } else {
                VectorStore::new(name, config)?
            };
            self.stores.insert(name.to_string(), store);
        }
        self.stores.get_mut(name).ok_or_else(|| Error::OperationFailed {
            operation: "get_store_with".to_string(),
            cause: format!("store '{name}' vanished after insertion"),
        })
    }

    /// Saves one open store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the store is not open, or the save
    /// error.
    pub fn save(&self, name: &str) -> Result<()> {
        let store = self
            .stores
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("store '{name}' is not open")))?;
        store.save(self.base_path(name))
    }

    /// Saves every open store.
    ///
    /// # Errors
    ///
    /// Returns the first save error; stores after it are not saved.
    #[instrument(skip(self), fields(root = %self.root.display(), open = self.stores.len()))]
    pub fn save_all(&self) -> Result<()> {
        let mut names: Vec<&String> = self.stores.keys().collect();
        names.sort();
        for name in names {
            self.save(name)?;
        }
        info!(saved = self.stores.len(), "saved all stores");
        Ok(())
    }

    /// Names of open and saved stores, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the root exists but cannot be listed.
    pub fn list_stores(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.stores.keys().cloned().collect();

        if self.root.is_dir() {
            let entries = std::fs::read_dir(&self.root).map_err(|e| Error::OperationFailed {
                operation: "list_stores".to_string(),
                cause: format!("{}: {e}", self.root.display()),
            })?;
            let suffix = format!(".{}", Sidecar::Meta.extension());
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(&suffix))
                    && validate_name(name).is_ok()
                {
                    names.insert(name.to_string());
                }
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Closes an open store without saving it. Returns false if not open.
    pub fn close(&mut self, name: &str) -> bool {
        self.stores.remove(name).is_some()
    }

    /// Closes a store and deletes its sidecars.
    ///
    /// Returns true if the store was open or had files on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid name, or an error if
    /// a sidecar cannot be removed.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn drop_store(&mut self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let was_open = self.close(name);
        let removed = persistence::remove_all(&self.base_path(name))?;
        info!(store = name, removed, "dropped store");
        Ok(was_open || removed > 0)
    }
}

/// Checks that a store name is a plain file stem.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("store name is empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(Error::InvalidInput(format!(
            "store name '{name}' starts with a dot"
        )));
    }
    if name.contains(['/', '\\']) || name.contains('\0') {
        return Err(Error::InvalidInput(format!(
            "store name '{name}' contains a path separator"
        )));
    }
    Ok(())
}
