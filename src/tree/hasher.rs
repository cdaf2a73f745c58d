//! Hash computation for tree nodes using BLAKE3
//!
//! Every digest is rendered as 64 lowercase hex characters so it can be stored
//! directly in the JSON snapshot and compared as a string.

use blake3::Hasher;

/// Compute content hash for file bytes
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hex::encode(hasher.finalize().as_bytes())
}

/// Compute the hash of a directory from its children's hashes
///
/// The result is the content hash of the concatenated child hashes. Callers must
/// pass the hashes in ascending child-name order; `TreeNode::children` is a
/// `BTreeMap`, so iterating it already satisfies this.
pub fn compute_directory_hash<'a, I>(child_hashes: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Hasher::new();
    for hash in child_hashes {
        hasher.update(hash.as_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}

/// Compute the remote vector identifier for a file path
///
/// Derived from the path only, so re-indexing a changed file overwrites the
/// previous entry instead of adding a new one.
pub fn compute_vector_id(path: &str) -> String {
    compute_content_hash(path.as_bytes())
}
