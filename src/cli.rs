//! Command-line arguments

use crate::config::SyncConfig;
use clap::Parser;
use std::path::PathBuf;

/// Keep a vector index in sync with a directory of notes
#[derive(Debug, Parser)]
#[command(name = "notesync", version)]
#[command(about = "Keep a vector index in sync with a directory of notes")]
pub struct Cli {
    /// Configuration file path (layered over the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Notes directory to watch (overrides NOTES_DIR and config files)
    #[arg(long)]
    pub notes_dir: Option<PathBuf>,

    /// Seconds between reconciliation passes
    #[arg(long)]
    pub interval: Option<u64>,

    /// Index into memory instead of the remote vector store
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line flags on top of the loaded configuration
    pub fn apply_to(&self, config: &mut SyncConfig) {
        if let Some(dir) = &self.notes_dir {
            config.notes_dir = Some(dir.clone());
        }
        if let Some(interval) = self.interval {
            config.sync_interval_secs = interval;
        }
        if self.dry_run {
            config.dry_run = true;
        }

        let logging = &mut config.logging;
        if self.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = file.clone();
        }
    }
}
