//! Scratch file lifecycle.
//!
//! Every temporary path a job allocates is tracked by the shared
//! [`TempFileManager`]. A path is either removed by the end of its job or
//! explicitly untracked after its owner takes it over, never both.

mod manager;
mod workspace;

pub(crate) use manager::remove_path;
pub use manager::TempFileManager;
pub(crate) use workspace::unique_path;
pub use workspace::JobWorkspace;
