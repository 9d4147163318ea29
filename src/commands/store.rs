//! Store command handlers.
//!
//! Every mutating command saves the store it touched.

use super::{parse_metadata, parse_vector, print_json};
use serde_json::json;
use vecstore::config::VecstoreConfig;
use vecstore::{BackendKind, Metric, SearchOptions, StoreRegistry, VectorStore};

/// Arguments of the add command.
pub struct AddArgs {
    /// Store name.
    pub store: String,
    /// Record id.
    pub id: String,
    /// Comma-separated components.
    pub vector: String,
    /// Metadata JSON.
    pub metadata: Option<String>,
    /// Replace a live record.
    pub overwrite: bool,
    /// Dimension for a new store.
    pub dimension: Option<usize>,
    /// Backend for a new store.
    pub backend: Option<String>,
    /// Metric for a new store.
    pub metric: Option<String>,
}

/// Opens an existing store or fails.
fn open<'a>(
    registry: &'a mut StoreRegistry,
    name: &str,
) -> Result<&'a mut VectorStore, Box<dyn std::error::Error>> {
    registry
        .get_store(name, false)?
        .ok_or_else(|| format!("store '{name}' does not exist").into())
}

/// Add command.
pub fn cmd_add(
    registry: &mut StoreRegistry,
    config: &VecstoreConfig,
    args: AddArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let vector = parse_vector(&args.vector)?;
    let metadata = args.metadata.as_deref().map(parse_metadata).transpose()?;

    let mut store_config = registry.config_for(&args.store);
    store_config.dimension = args.dimension.unwrap_or(config.store.dimension);
    if let Some(backend) = args.backend {
        store_config.backend =
            BackendKind::parse(&backend).ok_or_else(|| format!("unknown backend '{backend}'"))?;
    }
    if let Some(metric) = args.metric {
        store_config.metric =
            Metric::parse(&metric).ok_or_else(|| format!("unknown metric '{metric}'"))?;
    }

    let store = registry.get_store_with(&args.store, store_config)?;
    let added = store.add(&args.id, &vector, metadata, args.overwrite)?;
    registry.save(&args.store)?;

    print_json(&json!({ "store": args.store, "id": args.id, "added": added }))
}

/// Remove command.
pub fn cmd_remove(
    registry: &mut StoreRegistry,
    name: &str,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let removed = open(registry, name)?.remove(id);
    if removed {
        registry.save(name)?;
    }
    print_json(&json!({ "store": name, "id": id, "removed": removed }))
}

/// Get command.
pub fn cmd_get(
    registry: &mut StoreRegistry,
    name: &str,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(registry, name)?;
    let vector = store
        .get(id)
        .ok_or_else(|| format!("id '{id}' not found in store '{name}'"))?;
    let metadata = store.metadata(id).cloned().unwrap_or_default();

    print_json(&json!({ "id": id, "vector": vector, "metadata": metadata }))
}

/// Search command.
pub fn cmd_search(
    registry: &mut StoreRegistry,
    name: &str,
    vector: &str,
    top_k: usize,
    threshold: f32,
    exclude: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let query = parse_vector(vector)?;
    let options = SearchOptions::new()
        .with_top_k(top_k)
        .with_threshold(threshold)
        .excluding_all(exclude);

    let hits = open(registry, name)?.search(&query, &options)?;
    print_json(&hits)
}

/// Stats command.
pub fn cmd_stats(
    registry: &mut StoreRegistry,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    print_json(&open(registry, name)?.stats())
}

/// List command.
pub fn cmd_list(
    registry: &mut StoreRegistry,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    match name {
        Some(name) => print_json(&open(registry, name)?.list_ids()),
        None => print_json(&registry.list_stores()?),
    }
}

/// Rebuild command.
pub fn cmd_rebuild(
    registry: &mut StoreRegistry,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open(registry, name)?;
    let before = store.total_size();
    store.rebuild()?;
    let stats = store.stats();
    registry.save(name)?;

    print_json(&json!({
        "store": name,
        "purged": before - stats.total_size,
        "stats": stats,
    }))
}

/// Drop command.
pub fn cmd_drop(
    registry: &mut StoreRegistry,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dropped = registry.drop_store(name)?;
    print_json(&json!({ "store": name, "dropped": dropped }))
}
