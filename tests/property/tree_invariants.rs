//! Hashing and structural invariants of the tree

use notesync::tree::hasher;
use notesync::Tree;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Relative file paths up to three levels deep
///
/// Leaf names overlap directory names and contents come from a small pool, so
/// two trees often share content under different names or hold a file where
/// the other holds a directory. A path that is also a directory of another
/// path in the same set is dropped, since one tree cannot hold both.
pub fn note_files() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let path = (
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..3),
        prop::sample::select(vec!["a", "b", "note0.md", "note1.md"]),
    )
        .prop_map(|(dirs, leaf)| {
            let mut parts: Vec<&str> = dirs;
            parts.push(leaf);
            parts.join("/")
        });
    let content = prop::sample::select(vec![b"x".to_vec(), b"y".to_vec(), Vec::new()]);

    prop::collection::btree_map(path, content, 0..12).prop_map(|files| {
        let dirs: Vec<String> = files.keys().map(|p| format!("{}/", p)).collect();
        files
            .into_iter()
            .filter(|(path, _)| {
                let prefix = format!("{}/", path);
                !dirs.iter().any(|d| d != &prefix && d.starts_with(&prefix))
            })
            .collect()
    })
}

pub fn build(files: &BTreeMap<String, Vec<u8>>) -> Tree {
    let mut tree = Tree::new(PathBuf::from("/notes"));
    for (path, content) in files {
        tree.add_or_update(path, Some(content.as_slice()));
    }
    tree
}

/// Test that content hashing is deterministic
#[test]
fn test_content_hash_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any::<Vec<u8>>(), any::<Vec<u8>>()), |(content1, content2)| {
            let hash1 = hasher::compute_content_hash(&content1);
            let hash2 = hasher::compute_content_hash(&content2);

            if content1 == content2 {
                prop_assert_eq!(hash1, hash2);
            } else {
                prop_assert_ne!(hash1, hash2);
            }
            Ok(())
        })
        .unwrap();
}

proptest! {
    /// Insertion order never changes the root hash
    #[test]
    fn prop_insertion_order_independent(
        (files, order) in note_files().prop_flat_map(|files| {
            let keys: Vec<String> = files.keys().cloned().collect();
            (Just(files), Just(keys).prop_shuffle())
        })
    ) {
        let sorted = build(&files);

        let mut shuffled = Tree::new(PathBuf::from("/notes"));
        for path in &order {
            shuffled.add_or_update(path, Some(files[path].as_slice()));
        }

        prop_assert_eq!(sorted.root_hash(), shuffled.root_hash());
        prop_assert_eq!(sorted, shuffled);
    }

    /// Re-applying the same content is a no-op
    #[test]
    fn prop_update_is_idempotent(files in note_files()) {
        let mut tree = build(&files);
        let before = tree.clone();

        for (path, content) in &files {
            tree.add_or_update(path, Some(content.as_slice()));
        }

        prop_assert_eq!(tree, before);
    }

    /// Removing every file leaves an empty root with an empty hash
    #[test]
    fn prop_removing_all_files_prunes_directories(files in note_files()) {
        let mut tree = build(&files);

        for path in files.keys() {
            prop_assert!(tree.remove(path));
        }

        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.root_hash(), "");
        prop_assert_eq!(tree.node_count(), 1);
    }

    /// Leaves match exactly the inserted files
    #[test]
    fn prop_leaf_paths_match_inserted(files in note_files()) {
        let tree = build(&files);
        let expected: Vec<String> = files.keys().cloned().collect();
        prop_assert_eq!(tree.leaf_paths(), expected);
    }

    /// Snapshots decode to the tree they were encoded from
    #[test]
    fn prop_snapshot_round_trip(files in note_files()) {
        let tree = build(&files);
        let bytes = tree.to_snapshot_bytes().unwrap();
        let loaded = Tree::from_snapshot_bytes(PathBuf::from("/notes"), &bytes).unwrap();
        prop_assert_eq!(loaded, tree);
    }
}
