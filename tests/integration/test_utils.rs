//! Shared test utilities for integration tests

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A canonical notes directory inside a fresh temp dir
///
/// The notes live in `<temp>/notes` so state files can sit next to them.
pub struct NotesDir {
    pub temp: TempDir,
    pub root: PathBuf,
}

impl NotesDir {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp.path()).unwrap().join("notes");
        fs::create_dir(&root).unwrap();
        let notes = Self { temp, root };
        for (path, content) in files {
            notes.write(path, content);
        }
        notes
    }

    pub fn write(&self, relative: &str, content: &str) {
        let full = self.root.join(relative);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.temp.path().join("state").join("server.json")
    }
}

pub fn abs(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn wait_for<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
