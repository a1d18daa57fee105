//! Per-job scratch ownership.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use super::manager::TempFileManager;

/// Output directory and scratch paths of a single job.
///
/// Dropping the workspace without [`commit`](Self::commit) (failure,
/// cancellation, panic) deletes everything it allocated. Committing removes
/// only the scratch paths and hands the output files over as tracked temp
/// files until the caller saves or discards them.
#[derive(Debug)]
pub struct JobWorkspace {
    temps: Arc<TempFileManager>,
    output_dir: PathBuf,
    scratch: Vec<PathBuf>,
    committed: bool,
}

impl JobWorkspace {
    pub fn new(temps: Arc<TempFileManager>) -> io::Result<Self> {
        let output_dir = temps.create_temp_directory()?;
        Ok(Self {
            temps,
            output_dir,
            scratch: Vec::new(),
            committed: false,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path for an output named `file_name`, made unique within the job.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        unique_path(&self.output_dir, file_name)
    }

    /// Reserves a scratch file removed no later than commit or drop.
    pub fn scratch_file(&mut self, ext: &str) -> io::Result<PathBuf> {
        let path = self.temps.create_temp_file(ext)?;
        self.scratch.push(path.clone());
        Ok(path)
    }

    pub fn scratch_dir(&mut self) -> io::Result<PathBuf> {
        let path = self.temps.create_temp_directory()?;
        self.scratch.push(path.clone());
        Ok(path)
    }

    /// Deletes one scratch path now.
    pub fn release(&mut self, path: &Path) {
        self.scratch.retain(|p| p != path);
        if let Err(e) = self.temps.remove(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove scratch path");
        }
    }

    fn release_all(&mut self) {
        for path in std::mem::take(&mut self.scratch) {
            if let Err(e) = self.temps.remove(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch path");
            }
        }
    }

    /// Keeps `outputs`, drops all scratch paths.
    pub fn commit(mut self, outputs: &[PathBuf]) {
        self.release_all();
        for output in outputs {
            self.temps.track(output);
        }
        self.committed = true;
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.release_all();
        if let Err(e) = self.temps.remove(&self.output_dir) {
            warn!(path = %self.output_dir.display(), error = %e, "Failed to remove job output");
        }
    }
}

/// Splits `name.tar.gz` style names into stem and (compound) extension.
/// `dir/file_name`, or the first free `stem (N).ext` when it is taken.
pub(crate) fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_name(file_name);
    (2..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn split_name(file_name: &str) -> (&str, Option<&str>) {
    for compound in [".tar.gz", ".tar.bz2", ".tar.xz"] {
        if let Some(stem) = file_name.strip_suffix(compound) {
            return (stem, Some(&compound[1..]));
        }
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}
