//! Configuration layering: file, environment, then command line

use super::test_utils::NotesDir;
use clap::Parser;
use notesync::cli::Cli;
use notesync::config::{ConfigLoader, ValidationError};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_layers_apply_in_order() {
    let notes = NotesDir::new(&[("a.md", "x")]);
    let config_path = notes.temp.path().join("notesync.toml");
    fs::write(
        &config_path,
        format!(
            "notes_dir = \"{}\"\nsync_interval_secs = 30\nmax_concurrent_uploads = 2\n\n[vector]\nhost = \"file-host\"\n",
            notes.root.display()
        ),
    )
    .unwrap();

    let mut config = ConfigLoader::new()
        .without_global_file()
        .with_config_file(Some(config_path))
        .with_env(env(&[
            ("NOTESYNC_SYNC_INTERVAL_SECS", "20"),
            ("PINECONE_HOST", "env-host"),
            ("PINECONE_API_KEY", "secret"),
        ]))
        .load()
        .unwrap();

    assert_eq!(config.sync_interval_secs, 20);
    assert_eq!(config.max_concurrent_uploads, 2);
    assert_eq!(config.vector.host.as_deref(), Some("env-host"));

    let cli = Cli::try_parse_from(["notesync", "--interval", "10"]).unwrap();
    cli.apply_to(&mut config);

    assert_eq!(config.sync_interval(), Duration::from_secs(10));
    assert!(config.validate().is_ok());
    assert_eq!(
        config.snapshot_path(&notes.root),
        notes.root.join(".notesync").join("server.json")
    );
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let result = ConfigLoader::new()
        .without_global_file()
        .with_config_file(Some(PathBuf::from("/nonexistent/notesync.toml")))
        .with_env(HashMap::new())
        .load();

    assert!(result.is_err());
}

#[test]
fn test_remote_store_requires_credentials() {
    let notes = NotesDir::new(&[]);
    let config = ConfigLoader::new()
        .without_global_file()
        .with_env(env(&[("NOTES_DIR", notes.root.to_str().unwrap())]))
        .load()
        .unwrap();

    let errors = config.validate().unwrap_err();
    assert!(errors.contains(&ValidationError::Missing("vector.host")));
    assert!(errors.contains(&ValidationError::Missing("vector.api_key")));
}

#[test]
fn test_dry_run_skips_credential_checks() {
    let notes = NotesDir::new(&[]);
    let mut config = ConfigLoader::new()
        .without_global_file()
        .with_env(env(&[("NOTES_DIR", notes.root.to_str().unwrap())]))
        .load()
        .unwrap();

    let cli = Cli::try_parse_from(["notesync", "--dry-run"]).unwrap();
    cli.apply_to(&mut config);

    assert!(config.validate().is_ok());
}

#[test]
fn test_walker_config_follows_settings() {
    let config = ConfigLoader::new()
        .without_global_file()
        .with_env(env(&[
            ("NOTESYNC_EXTENSIONS", "md,txt"),
            ("NOTESYNC_IGNORE_PATTERNS", ".git,archive"),
        ]))
        .load()
        .unwrap();

    let walker = config.walker_config();
    assert_eq!(walker.extensions, vec!["md".to_string(), "txt".to_string()]);
    assert!(walker.is_ignored(std::path::Path::new("archive/old.md")));
}
