//! Command handlers module.
//!
//! - `store.rs`: store commands (add, remove, get, search, stats, list,
//!   rebuild, drop)

mod store;

pub use store::{
    AddArgs, cmd_add, cmd_drop, cmd_get, cmd_list, cmd_rebuild, cmd_remove, cmd_search,
    cmd_stats,
};

use vecstore::Metadata;

/// Parses comma-separated vector components.
pub fn parse_vector(s: &str) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let vector = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .map_err(|e| format!("invalid vector component '{part}': {e}"))
        })
        .collect::<Result<Vec<f32>, String>>()?;

    if vector.is_empty() {
        return Err("vector has no components".into());
    }
    Ok(vector)
}

/// Parses a JSON object into record metadata.
pub fn parse_metadata(s: &str) -> Result<Metadata, Box<dyn std::error::Error>> {
    match serde_json::from_str::<serde_json::Value>(s)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("metadata must be a JSON object, got {other}").into()),
    }
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
