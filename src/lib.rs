//! Notesync: keeps a vector index in sync with a directory of notes
//!
//! The live notes directory and the last indexed state are both held as
//! content-addressed trees. A watcher keeps the client tree current, and a
//! periodic synchronizer diffs it against the server tree, pushes changes to
//! the vector store, and persists the server tree as a JSON snapshot.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod sync;
pub mod tree;
pub mod vector;
pub mod watch;

pub use error::{StorageError, SyncError, VectorStoreError};
pub use sync::{PassPhase, PassReport, Synchronizer};
pub use tree::{DiffKind, SharedTree, Tree, TreeBuilder, TreeDiff};
pub use watch::FileWatcher;
