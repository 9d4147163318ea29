//! Binary entry point for vecstore.
//!
//! This binary provides operator commands over a store registry root.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use vecstore::config::VecstoreConfig;
use vecstore::observability;

/// vecstore - named similarity-search collections.
#[derive(Parser)]
#[command(name = "vecstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "VECSTORE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Registry root directory (overrides `data_dir`).
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Insert or overwrite a vector.
    Add {
        /// Store name.
        store: String,

        /// Record id.
        id: String,

        /// Comma-separated vector components.
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// JSON object stored with the record.
        #[arg(short, long)]
        metadata: Option<String>,

        /// Leave an existing record untouched.
        #[arg(long)]
        no_overwrite: bool,

        /// Dimension for a new store (default from config).
        #[arg(long)]
        dimension: Option<usize>,

        /// Backend for a new store: flat, quantized, graph, or fallback.
        #[arg(long)]
        backend: Option<String>,

        /// Metric for a new store: cosine, euclidean, or `inner_product`.
        #[arg(long)]
        metric: Option<String>,
    },

    /// Soft-delete a record.
    Remove {
        /// Store name.
        store: String,

        /// Record id.
        id: String,
    },

    /// Print a stored vector.
    Get {
        /// Store name.
        store: String,

        /// Record id.
        id: String,
    },

    /// Search a store.
    Search {
        /// Store name.
        store: String,

        /// Comma-separated query components.
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Minimum score.
        #[arg(short, long, default_value = "0.0")]
        threshold: f32,

        /// Ids to leave out (repeatable).
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Show store statistics.
    Stats {
        /// Store name.
        store: String,
    },

    /// List stores, or the ids in one store.
    List {
        /// Store name.
        store: Option<String>,
    },

    /// Compact a store, purging deleted records.
    Rebuild {
        /// Store name.
        store: String,
    },

    /// Delete a store and its files.
    Drop {
        /// Store name.
        store: String,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // Missing .env is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.root.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: &VecstoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = vecstore::StoreRegistry::from_config(config);

    match cli.command {
        Commands::Add {
            store,
            id,
            vector,
            metadata,
            no_overwrite,
            dimension,
            backend,
            metric,
        } => commands::cmd_add(
            &mut registry,
            config,
            commands::AddArgs {
                store,
                id,
                vector,
                metadata,
                overwrite: !no_overwrite,
                dimension,
                backend,
                metric,
            },
        ),

        Commands::Remove { store, id } => commands::cmd_remove(&mut registry, &store, &id),

        Commands::Get { store, id } => commands::cmd_get(&mut registry, &store, &id),

        Commands::Search {
            store,
            vector,
            top_k,
            threshold,
            exclude,
        } => commands::cmd_search(&mut registry, &store, &vector, top_k, threshold, exclude),

        Commands::Stats { store } => commands::cmd_stats(&mut registry, &store),

        Commands::List { store } => commands::cmd_list(&mut registry, store.as_deref()),

        Commands::Rebuild { store } => commands::cmd_rebuild(&mut registry, &store),

        Commands::Drop { store } => commands::cmd_drop(&mut registry, &store),
    }
}

/// Loads configuration.
fn load_config(
    path: Option<&std::path::Path>,
    root: Option<PathBuf>,
) -> Result<VecstoreConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(config_path) => VecstoreConfig::load_from_file(config_path)?,
        None => VecstoreConfig::load_default(),
    };

    let config = config.with_env_overrides();
    Ok(match root {
        Some(root) => config.with_data_dir(root),
        None => config,
    })
}
