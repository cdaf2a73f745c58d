//! Integration tests for tree building determinism

use super::test_utils::NotesDir;
use notesync::tree::{TreeBuilder, WalkerConfig};
use notesync::Tree;
use std::fs;

/// Test that the same filesystem produces the same root hash
#[test]
fn test_same_filesystem_same_root() {
    let notes = NotesDir::new(&[("file1.md", "content1"), ("file2.md", "content2"), ("dir1/file3.md", "content3")]);

    let builder = TreeBuilder::new(notes.root.clone());
    let first = builder.build().unwrap();
    let second = builder.build().unwrap();

    assert_eq!(first.root_hash(), second.root_hash());
    assert_eq!(first, second);
}

/// Test that worker count does not change the result
#[test]
fn test_worker_count_does_not_change_root() {
    let files: Vec<(String, String)> = (0..40)
        .map(|i| (format!("d{}/note{}.md", i % 5, i), format!("body {}", i)))
        .collect();
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    let notes = NotesDir::new(&borrowed);

    let single = TreeBuilder::new(notes.root.clone()).with_workers(1).build().unwrap();
    let many = TreeBuilder::new(notes.root.clone()).with_workers(8).build().unwrap();

    assert_eq!(single.root_hash(), many.root_hash());
    assert_eq!(single.leaf_paths().len(), 40);
}

/// Test that a built tree matches one assembled by hand
#[test]
fn test_build_matches_incremental_tree() {
    let notes = NotesDir::new(&[("a.md", "x"), ("b/c.md", "y")]);
    let built = TreeBuilder::new(notes.root.clone()).build().unwrap();

    let mut manual = Tree::new(notes.root.clone());
    manual.add_or_update("b/c.md", Some(b"y"));
    manual.add_or_update("a.md", Some(b"x"));

    assert_eq!(built.root_hash(), manual.root_hash());
}

/// Test that file content changes produce different root hashes
#[test]
fn test_file_content_change_different_root() {
    let notes = NotesDir::new(&[("test.md", "content1")]);
    let builder = TreeBuilder::new(notes.root.clone());
    let before = builder.build().unwrap();

    notes.write("test.md", "content2");
    let after = builder.build().unwrap();

    assert_ne!(before.root_hash(), after.root_hash());
}

/// Test that untracked files and ignored directories do not affect the tree
#[test]
fn test_untracked_files_do_not_change_root() {
    let notes = NotesDir::new(&[("a.md", "x")]);
    let builder = TreeBuilder::new(notes.root.clone());
    let before = builder.build().unwrap();

    notes.write("image.png", "binary");
    notes.write(".git/HEAD", "ref");
    notes.write(".notesync/server.json", "{}");
    let after = builder.build().unwrap();

    assert_eq!(before.root_hash(), after.root_hash());
    assert_eq!(after.leaf_paths(), vec!["a.md".to_string()]);
}

/// Test that empty directories are not part of the tree
#[test]
fn test_empty_directories_are_pruned() {
    let notes = NotesDir::new(&[("a.md", "x")]);
    let before = TreeBuilder::new(notes.root.clone()).build().unwrap();

    fs::create_dir_all(notes.path("empty/nested")).unwrap();
    let after = TreeBuilder::new(notes.root.clone()).build().unwrap();

    assert_eq!(before.root_hash(), after.root_hash());
    assert!(!after.contains("empty"));
}

/// Test that custom extensions are honored
#[test]
fn test_custom_extensions() {
    let notes = NotesDir::new(&[("a.md", "x"), ("b.txt", "y"), ("c.org", "z")]);
    let config = WalkerConfig {
        extensions: vec!["txt".to_string(), "org".to_string()],
        ..WalkerConfig::default()
    };

    let tree = TreeBuilder::new(notes.root.clone())
        .with_walker_config(config)
        .build()
        .unwrap();

    assert_eq!(tree.leaf_paths(), vec!["b.txt".to_string(), "c.org".to_string()]);
}
