use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics;

/// Allocates scratch paths under one root and removes whatever is still
/// tracked on [`cleanup`](Self::cleanup) or drop.
#[derive(Debug)]
pub struct TempFileManager {
    root: PathBuf,
    tracked: Mutex<HashSet<PathBuf>>,
}

impl TempFileManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tracked: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserves a unique file path with extension `ext`.
    ///
    /// The file itself is not created; tools write to the path.
    pub fn create_temp_file(&self, ext: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let name = if ext.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), ext.trim_start_matches('.'))
        };
        let path = self.root.join(name);
        self.track(&path);
        Ok(path)
    }

    /// Creates a unique, empty directory.
    pub fn create_temp_directory(&self) -> io::Result<PathBuf> {
        let path = self.root.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&path)?;
        self.track(&path);
        Ok(path)
    }

    /// Adds an existing path to the tracked set.
    pub fn track(&self, path: &Path) {
        self.tracked.lock().insert(path.to_path_buf());
    }

    /// Stops tracking `path` and its parent directory without deleting
    /// anything. Used once a caller has taken ownership of the file.
    pub fn untrack(&self, path: &Path) {
        let mut tracked = self.tracked.lock();
        tracked.remove(path);
        if let Some(parent) = path.parent() {
            tracked.remove(parent);
        }
    }

    /// Deletes `path` and stops tracking it.
    pub fn remove(&self, path: &Path) -> io::Result<()> {
        self.tracked.lock().remove(path);
        remove_path(path)
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.tracked.lock().contains(path)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Removes every tracked path still on disk and clears the set.
    /// Returns the number of paths deleted.
    pub fn cleanup(&self) -> usize {
        let paths: Vec<PathBuf> = self.tracked.lock().drain().collect();
        if paths.is_empty() {
            return 0;
        }

        let mut removed = 0;
        for path in &paths {
            if !path.exists() && path.symlink_metadata().is_err() {
                continue;
            }
            match remove_path(path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp path"),
            }
        }

        metrics::TEMP_PATHS_REMOVED.inc_by(removed as u64);
        info!(removed, tracked = paths.len(), "Temp cleanup finished");
        removed
    }
}

impl Drop for TempFileManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Removes a file, symlink or directory tree. Missing paths are not an error.
pub(crate) fn remove_path(path: &Path) -> io::Result<()> {
    let result = match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
        Ok(()) => {
            debug!(path = %path.display(), "Removed temp path");
            Ok(())
        }
    }
}
