//! End-to-end reconciliation passes against the in-memory vector store

use super::test_utils::{abs, NotesDir};
use notesync::tree::hasher::compute_vector_id;
use notesync::vector::MemoryVectorStore;
use notesync::{DiffKind, PassReport, Synchronizer, Tree, TreeBuilder, TreeDiff};
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Setup {
    notes: NotesDir,
    store: Arc<MemoryVectorStore>,
    sync: Synchronizer,
}

fn setup(files: &[(&str, &str)]) -> Setup {
    let notes = NotesDir::new(files);
    let client = TreeBuilder::new(notes.root.clone()).build().unwrap().into_shared();
    let server = Tree::load_snapshot(notes.root.clone(), &notes.snapshot_path()).into_shared();
    let store = Arc::new(MemoryVectorStore::new());
    let sync = Synchronizer::new(client, server, store.clone(), notes.snapshot_path());
    Setup { notes, store, sync }
}

#[tokio::test]
async fn test_initial_pass_adds_every_file() {
    let s = setup(&[("a.md", "x"), ("b/c.md", "y")]);

    let pending = {
        let server = s.sync.server_tree().lock();
        let client = TreeBuilder::new(s.notes.root.clone()).build().unwrap();
        client.diff(&server, &CancellationToken::new()).unwrap()
    };
    assert_eq!(
        pending,
        vec![
            TreeDiff::new(DiffKind::Added, "a.md"),
            TreeDiff::new(DiffKind::Added, "b/c.md"),
        ]
    );

    let report = s.sync.run_pass().await.unwrap();
    assert_eq!(
        report,
        PassReport {
            diffs: 2,
            upserted: 2,
            removed: 0,
            replaced: 0,
            failed: 0
        }
    );

    let fresh = TreeBuilder::new(s.notes.root.clone()).build().unwrap();
    assert_eq!(s.sync.server_tree().lock().root_hash(), fresh.root_hash());

    let persisted = Tree::load_snapshot(s.notes.root.clone(), &s.notes.snapshot_path());
    assert_eq!(persisted.root_hash(), fresh.root_hash());
    assert_eq!(persisted.leaf_paths(), fresh.leaf_paths());

    assert_eq!(
        s.store.paths(),
        vec![abs(&s.notes.path("a.md")), abs(&s.notes.path("b/c.md"))]
    );
}

#[tokio::test]
async fn test_single_edit_yields_one_modification() {
    let s = setup(&[("a.md", "x"), ("b/c.md", "y")]);
    s.sync.run_pass().await.unwrap();

    s.notes.write("a.md", "z");
    let client = TreeBuilder::new(s.notes.root.clone()).build().unwrap();
    let diffs = client
        .diff(&s.sync.server_tree().lock(), &CancellationToken::new())
        .unwrap();
    assert_eq!(diffs, vec![TreeDiff::new(DiffKind::Modified, "a.md")]);

    let client = client.into_shared();
    let sync = Synchronizer::new(
        client.clone(),
        Tree::load_snapshot(s.notes.root.clone(), &s.notes.snapshot_path()).into_shared(),
        s.store.clone(),
        s.notes.snapshot_path(),
    );
    let report = sync.run_pass().await.unwrap();
    assert_eq!(report.diffs, 1);
    assert_eq!(report.upserted, 1);

    let id = compute_vector_id(&abs(&s.notes.path("a.md")));
    assert_eq!(s.store.get(&id).unwrap().content, "z");
    assert_eq!(s.store.upsert_count(), 3);
}

#[tokio::test]
async fn test_malformed_snapshot_starts_from_empty() {
    let notes = NotesDir::new(&[("a.md", "x"), ("b/c.md", "y")]);
    fs::create_dir_all(notes.snapshot_path().parent().unwrap()).unwrap();
    fs::write(notes.snapshot_path(), "{ not json").unwrap();

    let server = Tree::load_snapshot(notes.root.clone(), &notes.snapshot_path());
    assert!(server.is_empty());

    let client = TreeBuilder::new(notes.root.clone()).build().unwrap();
    let diffs = client.diff(&server, &CancellationToken::new()).unwrap();
    assert!(diffs.iter().all(|d| d.kind == DiffKind::Added));
    assert_eq!(diffs.len(), 2);

    let store = Arc::new(MemoryVectorStore::new());
    let sync = Synchronizer::new(
        client.into_shared(),
        server.into_shared(),
        store.clone(),
        notes.snapshot_path(),
    );
    let report = sync.run_pass().await.unwrap();
    assert_eq!(report.upserted, 2);

    // The malformed file is replaced by a valid snapshot
    let reloaded = Tree::load_snapshot(notes.root.clone(), &notes.snapshot_path());
    assert_eq!(reloaded.leaf_paths(), vec!["a.md".to_string(), "b/c.md".to_string()]);
}

#[tokio::test]
async fn test_converged_pass_is_quiet() {
    let s = setup(&[("a.md", "x")]);
    s.sync.run_pass().await.unwrap();

    let report = s.sync.run_pass().await.unwrap();
    assert_eq!(report, PassReport::default());
    assert_eq!(s.store.upsert_count(), 1);
}

#[tokio::test]
async fn test_restart_resumes_from_snapshot() {
    let s = setup(&[("a.md", "x"), ("b.md", "y")]);
    s.sync.run_pass().await.unwrap();

    s.notes.write("c.md", "new");
    let restarted = setup_from(&s.notes, s.store.clone());
    let report = restarted.run_pass().await.unwrap();

    assert_eq!(report.diffs, 1);
    assert_eq!(report.upserted, 1);
    assert_eq!(s.store.len(), 3);
}

fn setup_from(notes: &NotesDir, store: Arc<MemoryVectorStore>) -> Synchronizer {
    let client = TreeBuilder::new(notes.root.clone()).build().unwrap().into_shared();
    let server = Tree::load_snapshot(notes.root.clone(), &notes.snapshot_path()).into_shared();
    Synchronizer::new(client, server, store, notes.snapshot_path())
}

#[tokio::test]
async fn test_deleted_file_stays_in_store() {
    let s = setup(&[("a.md", "x"), ("b.md", "y")]);
    s.sync.run_pass().await.unwrap();

    fs::remove_file(s.notes.path("b.md")).unwrap();
    let restarted = setup_from(&s.notes, s.store.clone());
    let report = restarted.run_pass().await.unwrap();

    assert_eq!(report.removed, 1);
    assert!(!restarted.server_tree().lock().contains("b.md"));
    assert_eq!(s.store.len(), 2);
}

#[tokio::test]
async fn test_rename_without_edit_is_indexed() {
    let s = setup(&[("a.md", "x"), ("d/n.md", "y")]);
    s.sync.run_pass().await.unwrap();

    fs::rename(s.notes.path("a.md"), s.notes.path("b.md")).unwrap();
    fs::rename(s.notes.path("d"), s.notes.path("e")).unwrap();
    let restarted = setup_from(&s.notes, s.store.clone());
    let report = restarted.run_pass().await.unwrap();

    assert_eq!(report.upserted, 2);
    assert_eq!(report.removed, 2);
    assert_eq!(
        restarted.server_tree().lock().leaf_paths(),
        vec!["b.md".to_string(), "e/n.md".to_string()]
    );
    assert!(s.store.get(&compute_vector_id(&abs(&s.notes.path("b.md")))).is_some());
    assert!(s.store.get(&compute_vector_id(&abs(&s.notes.path("e/n.md")))).is_some());
}
