//! The runtime shared by the router and every backend.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nix::errno::Errno;
use tokio::fs;
use tracing::{debug, info};

use crate::compat::CompatibilityResolver;
use crate::config::Config;
use crate::converter::{ConvertedArtifact, ConverterError};
use crate::format::FormatRegistry;
use crate::process::ProcessManager;
use crate::tempfiles::{unique_path, TempFileManager};
use crate::tools::ToolLocator;

/// Process-wide collaborators, constructed once and passed explicitly.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    pub config: Arc<Config>,
    pub registry: Arc<FormatRegistry>,
    pub tools: Arc<ToolLocator>,
    pub processes: Arc<ProcessManager>,
    pub temps: Arc<TempFileManager>,
}

impl ConversionContext {
    pub fn new(config: Config) -> Self {
        Self {
            registry: Arc::new(FormatRegistry::new()),
            tools: Arc::new(ToolLocator::new(config.tools.clone())),
            processes: Arc::new(ProcessManager::new(config.process.clone())),
            temps: Arc::new(TempFileManager::new(config.temp.root.clone())),
            config: Arc::new(config),
        }
    }

    pub fn resolver(&self) -> CompatibilityResolver {
        CompatibilityResolver::new(self.registry.clone())
    }

    /// Moves an artifact to `destination` and hands ownership to the caller.
    ///
    /// When `destination` is an existing directory the suggested name is
    /// used inside it, numbered `name (2).ext` and so on if already taken.
    /// An explicit file path that already exists is refused. Returns the
    /// final path.
    pub async fn save_artifact(
        &self,
        artifact: &ConvertedArtifact,
        destination: &Path,
    ) -> Result<PathBuf, ConverterError> {
        let destination = if fs::metadata(destination)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            unique_path(destination, &artifact.suggested_name)
        } else if fs::try_exists(destination).await? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", destination.display()),
            )
            .into());
        } else {
            destination.to_path_buf()
        };

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if !try_atomic_move(&artifact.temp_path, &destination).await? {
            debug!(
                from = %artifact.temp_path.display(),
                to = %destination.display(),
                "Rename crosses filesystems, copying"
            );
            fs::copy(&artifact.temp_path, &destination).await?;
            fs::remove_file(&artifact.temp_path).await?;
        }

        self.temps.untrack(&artifact.temp_path);
        if let Some(job_dir) = artifact.temp_path.parent() {
            // Sibling outputs may still be waiting to be saved.
            if fs::remove_dir(job_dir).await.is_err() && job_dir.exists() {
                self.temps.track(job_dir);
            }
        }

        info!(
            artifact = %artifact.suggested_name,
            path = %destination.display(),
            size_bytes = artifact.size_bytes,
            "Saved artifact"
        );
        Ok(destination)
    }

    /// Deletes an artifact the caller does not want.
    pub fn discard_artifact(&self, artifact: &ConvertedArtifact) -> Result<(), ConverterError> {
        self.temps.remove(&artifact.temp_path)?;
        debug!(artifact = %artifact.suggested_name, "Discarded artifact");
        Ok(())
    }
}

/// Renames `source` to `destination`; `Ok(false)` when they live on
/// different filesystems.
async fn try_atomic_move(source: &Path, destination: &Path) -> io::Result<bool> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(true),
        Err(e) if e.raw_os_error() == Some(Errno::EXDEV as i32) => Ok(false),
        Err(e) => Err(e),
    }
}
