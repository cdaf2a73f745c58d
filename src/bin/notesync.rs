//! Notesync binary
//!
//! Builds the client tree, loads the server snapshot, then runs the file watcher
//! and the synchronizer until interrupted. A second Ctrl-C aborts an in-flight diff.

use anyhow::{Context, Result};
use clap::Parser;
use notesync::cli::Cli;
use notesync::config::{ConfigLoader, SyncConfig};
use notesync::logging::init_logging;
use notesync::vector::{HttpEmbedder, MemoryVectorStore, PineconeIndex, VectorStore};
use notesync::{FileWatcher, Synchronizer, Tree, TreeBuilder};
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn main() {
    let cli = Cli::parse();

    let mut config = match ConfigLoader::new()
        .with_config_file(cli.config.clone())
        .with_process_env()
        .load()
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    cli.apply_to(&mut config);

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
            eprintln!("Configuration error: {}", e);
        }
        process::exit(2);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!(error = %e, "Notesync failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(config: SyncConfig) -> Result<()> {
    let notes_dir = config
        .notes_dir
        .as_ref()
        .context("notes_dir is required")?;
    let notes_dir = dunce::canonicalize(notes_dir)
        .with_context(|| format!("Cannot resolve notes directory {}", notes_dir.display()))?;
    info!(notes_dir = %notes_dir.display(), dry_run = config.dry_run, "Notesync starting");

    let walker = config.walker_config();
    let builder = TreeBuilder::new(notes_dir.clone())
        .with_walker_config(walker.clone())
        .with_workers(config.build_workers);
    let client = tokio::task::spawn_blocking(move || builder.build())
        .await
        .context("Tree build task failed")?
        .context("Failed to build client tree")?
        .into_shared();

    let snapshot_path = config.snapshot_path(&notes_dir);
    let server = Tree::load_snapshot(notes_dir.clone(), &snapshot_path).into_shared();

    let store = build_store(&config)?;
    info!(store = store.name(), "Vector store ready");

    let synchronizer = Arc::new(
        Synchronizer::new(client.clone(), server, store, snapshot_path)
            .with_interval(config.sync_interval())
            .with_max_concurrent(config.max_concurrent_uploads),
    );
    let watcher = FileWatcher::new(&notes_dir, client, walker)
        .context("Failed to set up file watcher")?;

    let shutdown = CancellationToken::new();
    let watch_task = tokio::spawn(watcher.run(shutdown.clone()));
    let sync_task = {
        let synchronizer = synchronizer.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { synchronizer.run(shutdown).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested, finishing current pass");
    shutdown.cancel();

    let abort_task = {
        let synchronizer = synchronizer.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Second interrupt, aborting in-flight pass");
                synchronizer.abort();
            }
        })
    };

    let (watch_result, sync_result) = tokio::join!(watch_task, sync_task);
    abort_task.abort();

    watch_result
        .context("Watcher task failed")?
        .context("File watcher stopped with an error")?;
    sync_result
        .context("Synchronizer task failed")?
        .context("Synchronizer stopped with an error")?;

    info!("Notesync stopped");
    Ok(())
}

fn build_store(config: &SyncConfig) -> Result<Arc<dyn VectorStore>> {
    if config.dry_run {
        info!("Dry run, indexing into memory");
        return Ok(Arc::new(MemoryVectorStore::new()));
    }

    let embedder = HttpEmbedder::new(config.embedding.url.clone(), config.embedding.model.clone())
        .context("Failed to create embedding client")?;
    let host = config
        .vector
        .host
        .as_deref()
        .context("vector.host is required")?;
    let api_key = config
        .vector
        .api_key
        .clone()
        .context("vector.api_key is required")?;

    let index = PineconeIndex::new(
        host,
        api_key,
        config.vector.namespace.clone(),
        Arc::new(embedder),
    )
    .context("Failed to create vector index client")?;
    Ok(Arc::new(index))
}
