//! Configuration
//!
//! Layered through the `config` crate, lowest precedence first:
//! 1. Built-in defaults
//! 2. Global file: `<config dir>/notesync/config.toml`
//! 3. File given with `--config`
//! 4. `NOTESYNC_*` environment variables (`__` separates nested keys,
//!    e.g. `NOTESYNC_VECTOR__API_KEY`)
//! 5. Plain names: `NOTES_DIR`, `PINECONE_API_KEY`, `PINECONE_HOST`,
//!    `PINECONE_NAMESPACE`, `EMBEDDING_URL`
//!
//! A `.env` file in the working directory is loaded into the process
//! environment first.

use crate::error::SyncError;
use crate::logging::LoggingConfig;
use crate::tree::WalkerConfig;
use crate::vector::embedding::{DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const STATE_DIR_NAME: &str = ".notesync";

/// Plain environment variable names and the keys they set
const LEGACY_ENV: &[(&str, &str)] = &[
    ("NOTES_DIR", "notes_dir"),
    ("PINECONE_API_KEY", "vector.api_key"),
    ("PINECONE_HOST", "vector.host"),
    ("PINECONE_NAMESPACE", "vector.namespace"),
    ("EMBEDDING_URL", "embedding.url"),
];

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory of notes to index
    #[serde(default)]
    pub notes_dir: Option<PathBuf>,

    /// State directory; defaults to `<notes_dir>/.notesync`
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Snapshot file name inside the state directory
    pub snapshot_file: String,

    pub sync_interval_secs: u64,

    pub max_concurrent_uploads: usize,

    /// Threads reading files during the initial build
    pub build_workers: usize,

    /// Tracked file extensions
    pub extensions: Vec<String>,

    /// Path components skipped by the walker and the watcher
    pub ignore_patterns: Vec<String>,

    /// Index into an in-process store instead of the remote index
    #[serde(default)]
    pub dry_run: bool,

    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector: VectorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Missing(key) => write!(f, "'{}' is required", key),
            ValidationError::Invalid(key, msg) => write!(f, "'{}': {}", key, msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SyncConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        match &self.notes_dir {
            None => errors.push(ValidationError::Missing("notes_dir")),
            Some(dir) if !dir.is_dir() => errors.push(ValidationError::Invalid(
                "notes_dir",
                format!("{} is not a directory", dir.display()),
            )),
            Some(_) => {}
        }

        if self.sync_interval_secs == 0 {
            errors.push(ValidationError::Invalid(
                "sync_interval_secs",
                "must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_uploads == 0 {
            errors.push(ValidationError::Invalid(
                "max_concurrent_uploads",
                "must be at least 1".to_string(),
            ));
        }
        if self.snapshot_file.trim().is_empty() {
            errors.push(ValidationError::Missing("snapshot_file"));
        }
        if self.extensions.is_empty() {
            errors.push(ValidationError::Invalid(
                "extensions",
                "at least one extension must be tracked".to_string(),
            ));
        }

        if !self.dry_run {
            if is_blank(&self.vector.host) {
                errors.push(ValidationError::Missing("vector.host"));
            }
            if is_blank(&self.vector.api_key) {
                errors.push(ValidationError::Missing("vector.api_key"));
            }
            if self.embedding.url.trim().is_empty() {
                errors.push(ValidationError::Missing("embedding.url"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// State directory, resolved against the notes directory
    pub fn state_dir(&self, notes_dir: &Path) -> PathBuf {
        match &self.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => notes_dir.join(dir),
            None => notes_dir.join(STATE_DIR_NAME),
        }
    }

    pub fn snapshot_path(&self, notes_dir: &Path) -> PathBuf {
        self.state_dir(notes_dir).join(&self.snapshot_file)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Path filter shared by the tree builder and the watcher
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            ignore_patterns: self.ignore_patterns.clone(),
            extensions: self.extensions.clone(),
            ..WalkerConfig::default()
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Path to the global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "notesync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Create a Config builder with the built-in defaults applied
fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("snapshot_file", "server.json")?
        .set_default("sync_interval_secs", 5)?
        .set_default("max_concurrent_uploads", 8)?
        .set_default("build_workers", 4)?
        .set_default("extensions", vec!["md"])?
        .set_default("ignore_patterns", vec![".git", STATE_DIR_NAME])?
        .set_default("embedding.url", DEFAULT_EMBEDDING_URL)?
        .set_default("embedding.model", DEFAULT_EMBEDDING_MODEL)
}

/// Loads [`SyncConfig`] from its layered sources
pub struct ConfigLoader {
    global_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            global_file: global_config_path(),
            config_file: None,
            env: HashMap::new(),
        }
    }

    /// Read variables from `.env` and the process environment
    pub fn with_process_env(mut self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        self.env = std::env::vars().collect();
        self
    }

    /// Use `env` in place of the process environment
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    pub fn without_global_file(mut self) -> Self {
        self.global_file = None;
        self
    }

    pub fn load(&self) -> Result<SyncConfig, SyncError> {
        let mut builder = builder_with_defaults()?;

        if let Some(global) = &self.global_file {
            if global.exists() {
                debug!(path = %global.display(), "Using global config file");
                builder = builder.add_source(File::from(global.as_path()).required(false));
            }
        }

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(SyncError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        let prefixed: config::Map<String, String> = self
            .env
            .iter()
            .filter(|(key, _)| key.starts_with("NOTESYNC_"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        builder = builder.add_source(
            Environment::with_prefix("NOTESYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("extensions")
                .with_list_parse_key("ignore_patterns")
                .source(Some(prefixed)),
        );

        for (name, key) in LEGACY_ENV {
            if let Some(value) = self.env.get(*name).filter(|v| !v.trim().is_empty()) {
                builder = builder.set_override(*key, value.as_str())?;
            }
        }

        let config: SyncConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}
