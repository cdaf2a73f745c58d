//! Content-addressed directory tree
//!
//! Mirrors a notes directory as a Merkle tree: a file's hash is the digest of
//! its bytes and a directory's hash is the digest of its children's hashes in
//! name order. Two trees can be diffed and persisted as JSON snapshots.

pub mod builder;
pub mod diff;
pub mod hasher;
pub mod node;
pub mod path;
pub mod snapshot;
pub mod walker;

pub use builder::{SharedTree, Tree, TreeBuilder};
pub use diff::{DiffKind, TreeDiff};
pub use node::{NodeKind, TreeNode};
pub use walker::WalkerConfig;
