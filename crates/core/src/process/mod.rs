//! Process lifecycle management.
//!
//! Every external tool runs through [`ProcessManager::run`], which keeps the
//! child registered for exactly as long as it is supervised. Cancellation and
//! shutdown escalate SIGINT, SIGTERM and SIGKILL so no child outlives its job.

mod invocation;
mod manager;
mod shutdown;

pub use invocation::{ProcessOutcome, ToolInvocation};
pub use manager::ProcessManager;
pub use shutdown::{install_shutdown_handler, ShutdownHandle};
