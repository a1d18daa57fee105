//! Process-wide shutdown handling.
//!
//! OS signals are received through tokio's signal driver, which only writes
//! to a pipe in signal context. The termination sweep and temp cleanup run
//! on an ordinary task once the listener wakes up.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::manager::ProcessManager;
use crate::tempfiles::TempFileManager;

/// Handle to the installed shutdown listener.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Starts shutdown as if a termination signal had arrived.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Token cancelled as soon as shutdown begins; batches derive their
    /// cancellation from it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once every process is terminated and temp files are removed.
    pub async fn completed(&mut self) {
        let _ = self.done.wait_for(|done| *done).await;
    }
}

/// Spawns the listener task for SIGINT, SIGTERM and
/// [`ShutdownHandle::trigger`].
pub fn install_shutdown_handler(
    processes: Arc<ProcessManager>,
    temps: Arc<TempFileManager>,
) -> (ShutdownHandle, JoinHandle<()>) {
    let token = CancellationToken::new();
    let (done_tx, done_rx) = watch::channel(false);

    let listener_token = token.clone();
    let task = tokio::spawn(async move {
        let reason = wait_for_trigger(&listener_token).await;
        info!(reason, "Shutting down");

        listener_token.cancel();
        processes.begin_shutdown();
        processes.terminate_all().await;
        temps.cleanup();

        let _ = done_tx.send(true);
        info!("Shutdown complete");
    });

    (
        ShutdownHandle {
            token,
            done: done_rx,
        },
        task,
    )
}

async fn wait_for_trigger(token: &CancellationToken) -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
        _ = token.cancelled() => "requested",
    }
}
