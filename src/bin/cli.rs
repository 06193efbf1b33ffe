// src/bin/cli.rs

//! content-sync CLI
//!
//! Local execution entry point: runs full or explicit-path synchronizations
//! against a directory-backed job store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use content_sync::{
    error::{AppError, Result},
    extensions::Registry,
    models::{Config, LifecycleEvent, SourceConfig},
    pipeline::{Connector, PathsRequest},
    storage::LocalStore,
};

/// content-sync - content repository to search index synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "content-sync",
    version,
    about = "Synchronize a content repository with a search index"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory receiving emitted jobs and the index ledger
    #[arg(short, long, default_value = "storage")]
    store_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every eligible node of a source
    IndexAll {
        /// Source name
        source: String,
    },

    /// Index explicit paths of a source
    IndexPaths {
        /// Source name
        source: String,

        /// Content paths (or page URLs with --urls)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Lifecycle event: NONE, PUBLISHING, UNPUBLISHING or DEINDEXING
        #[arg(long, default_value = "NONE")]
        event: LifecycleEvent,

        /// Do not descend into children of the given paths
        #[arg(long)]
        no_recursive: bool,

        /// Treat the arguments as page URLs
        #[arg(long)]
        urls: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Print the tree document of one node
    Fetch {
        /// Source name
        source: String,

        /// Content path
        path: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn find_source<'c>(config: &'c Config, name: &str) -> Result<&'c SourceConfig> {
    config
        .source(name)
        .ok_or_else(|| AppError::config(format!("unknown source '{name}'")))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("Config OK ({} sources)", config.sources.len());
        return Ok(());
    }

    let store = Arc::new(LocalStore::open(&cli.store_dir).await?);
    let connector = Connector::new(
        config.engine.clone(),
        Registry::with_builtins(),
        store.clone(),
        store.clone(),
    )?;

    match cli.command {
        Command::IndexAll { source } => {
            let source = find_source(&config, &source)?;
            if !connector.index_all(source).await {
                log::warn!("Source '{}' is already running", source.name);
            }
        }

        Command::IndexPaths {
            source,
            paths,
            event,
            no_recursive,
            urls,
        } => {
            let source = find_source(&config, &source)?;
            let request = PathsRequest {
                paths,
                event,
                recursive: !no_recursive,
                urls,
            };
            connector.index_paths(source, request).await;
        }

        Command::Fetch { source, path } => {
            let source = find_source(&config, &source)?;
            match connector.fetch_node(source, &path).await {
                Some(node) => println!("{}", serde_json::to_string_pretty(&node)?),
                None => log::warn!("Node not found: {}", path),
            }
        }

        Command::Validate => {}
    }

    log::info!("Jobs written under {}", store.root_dir().display());
    Ok(())
}
