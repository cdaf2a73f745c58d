//! Path splitting and normalization utilities
//!
//! Tree paths are relative, `/`-separated strings. Directory segments carry a
//! trailing `/`; whether the final segment does is decided by the caller.

use crate::error::StorageError;
use crate::tree::node::NodeKind;
use std::path::{Component, Path};
use unicode_normalization::UnicodeNormalization;

/// Separator used in tree paths and as the directory tag
pub const SEPARATOR: char = '/';

/// Split a relative path into tagged segments
///
/// Every non-final segment is tagged as a directory. The final segment is
/// tagged according to `kind`, never according to a trailing separator in the
/// input. Empty and `.` segments are dropped and names are normalized to NFC.
pub fn split_path(path: &str, kind: NodeKind) -> Vec<String> {
    let parts: Vec<String> = path
        .split(|c| c == '/' || c == '\\')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| s.nfc().collect::<String>())
        .collect();

    let last = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            if i < last || kind == NodeKind::Directory {
                format!("{}{}", segment, SEPARATOR)
            } else {
                segment
            }
        })
        .collect()
}

/// Strip the directory tag from a segment
pub fn segment_key(segment: &str) -> &str {
    segment.trim_end_matches(SEPARATOR)
}

/// Express `path` relative to `root` as a tree path string
pub fn relative_path_string(path: &Path, root: &Path) -> Result<String, StorageError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        StorageError::InvalidPath(format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_string_lossy().nfc().collect::<String>()),
            Component::CurDir => {}
            other => {
                return Err(StorageError::InvalidPath(format!(
                    "Unexpected component {:?} in {}",
                    other,
                    path.display()
                )))
            }
        }
    }
    Ok(segments.join("/"))
}
