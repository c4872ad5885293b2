use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

/// Best-effort hint naming the output file gallery-dl is currently writing.
///
/// Overwritten whenever the classifier observes a new path; consumed once on
/// stop to remove the truncated artifact. Not a lock over filesystem state.
#[derive(Debug, Default)]
pub struct PartialFileGuard {
    path: Mutex<Option<PathBuf>>,
}

impl PartialFileGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `path` as the most recent in-flight output file
    pub fn observe(&self, path: PathBuf) {
        let abs = std::path::absolute(&path).unwrap_or(path);
        *self.path.lock().expect("partial file lock poisoned") = Some(abs);
    }

    /// Forget the current hint without touching the filesystem
    pub fn clear(&self) {
        self.path.lock().expect("partial file lock poisoned").take();
    }

    pub fn current(&self) -> Option<PathBuf> {
        self.path.lock().expect("partial file lock poisoned").clone()
    }

    /// Remove the hinted file if it exists. Removal failure is logged and
    /// swallowed; the hint is cleared either way.
    pub fn remove(&self) -> Option<PathBuf> {
        let path = self.path.lock().expect("partial file lock poisoned").take()?;
        if !path.exists() {
            return None;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed incomplete file");
                Some(path)
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "could not remove incomplete file");
                None
            }
        }
    }
}
