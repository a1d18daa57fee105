//! Registry of live child processes.

use futures::future::join_all;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::invocation::{ProcessOutcome, ToolInvocation};
use crate::config::ProcessConfig;
use crate::converter::ConverterError;
use crate::metrics;

/// Final state published by a process's waiter task.
#[derive(Debug, Clone, Copy)]
enum ChildExit {
    Exited(ExitStatus),
    WaitFailed,
}

type ExitReceiver = watch::Receiver<Option<ChildExit>>;

#[derive(Debug)]
struct ActiveProcess {
    tool: &'static str,
    exit: ExitReceiver,
}

/// Supervises every spawned external process.
///
/// Each child runs in its own process group so signals reach the whole tool
/// tree. A dedicated waiter task publishes the exit status on a `watch`
/// channel; callers select on it together with their cancellation token.
/// Registration is held by an RAII guard, so a process is unregistered
/// exactly once on every exit path, including a dropped future.
#[derive(Debug)]
pub struct ProcessManager {
    config: ProcessConfig,
    active: Mutex<HashMap<u32, ActiveProcess>>,
    shutting_down: AtomicBool,
}

impl ProcessManager {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            active: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    pub fn active_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.active.lock().keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Refuse new spawns from now on.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Spawns `invocation`, waits for it and captures its output.
    ///
    /// On cancellation the child gets SIGINT, up to the grace period to exit,
    /// then SIGKILL, and the call returns [`ConverterError::Cancelled`].
    /// A non-zero exit is not an error here; classification is up to the
    /// caller.
    pub async fn run(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, ConverterError> {
        if cancel.is_cancelled() || self.is_shutting_down() {
            return Err(ConverterError::Cancelled);
        }

        let tool = invocation.tool.name();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConverterError::tool_not_found(tool)
            } else {
                ConverterError::Io(e)
            }
        })?;
        let pid = child
            .id()
            .ok_or_else(|| std::io::Error::other("child exited before its pid was read"))?;

        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ChildExit::Exited(status),
                Err(e) => {
                    warn!(pid, error = %e, "Failed to wait for child");
                    ChildExit::WaitFailed
                }
            };
            let _ = exit_tx.send(Some(exit));
        });

        let _registration = self.register(pid, tool, exit_rx.clone());
        metrics::PROCESSES_SPAWNED.with_label_values(&[tool]).inc();
        debug!(tool, pid, command = %invocation.command_line(), "Spawned process");

        let mut waiter = exit_rx.clone();
        let exit = tokio::select! {
            biased;
            exit = wait_for_exit(&mut waiter) => exit,
            _ = cancel.cancelled() => {
                info!(tool, pid, "Cancelling process");
                self.interrupt(pid, tool, exit_rx).await;
                return Err(ConverterError::Cancelled);
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let exit_code = match exit {
            ChildExit::Exited(status) => status.code(),
            ChildExit::WaitFailed => None,
        };
        debug!(tool, pid, ?exit_code, elapsed_ms = started.elapsed().as_millis() as u64, "Process exited");

        Ok(ProcessOutcome {
            exit_code,
            stdout,
            stderr,
            elapsed: started.elapsed(),
        })
    }

    /// Terminates every registered process.
    ///
    /// SIGINT first, polled for up to the grace period, then SIGTERM with a
    /// bounded wait, then SIGKILL. When this returns no previously
    /// registered process is still running.
    pub async fn terminate_all(&self) {
        let targets: Vec<(u32, &'static str, ExitReceiver)> = self
            .active
            .lock()
            .iter()
            .map(|(pid, p)| (*pid, p.tool, p.exit.clone()))
            .collect();

        if targets.is_empty() {
            return;
        }
        info!(count = targets.len(), "Terminating active processes");

        join_all(
            targets
                .into_iter()
                .map(|(pid, tool, exit)| self.terminate_one(pid, tool, exit)),
        )
        .await;
    }

    async fn terminate_one(&self, pid: u32, tool: &'static str, exit: ExitReceiver) {
        send_signal(pid, Signal::SIGINT);
        if self.poll_exit(&exit, self.config.grace_period()).await {
            return;
        }

        warn!(tool, pid, "Process ignored SIGINT, sending SIGTERM");
        metrics::FORCED_TERMINATIONS
            .with_label_values(&["sigterm"])
            .inc();
        send_signal(pid, Signal::SIGTERM);
        if self.poll_exit(&exit, self.config.force_wait()).await {
            return;
        }

        self.kill(pid, tool, exit).await;
    }

    /// Cancellation path: SIGINT, grace period, then SIGKILL.
    async fn interrupt(&self, pid: u32, tool: &'static str, exit: ExitReceiver) {
        send_signal(pid, Signal::SIGINT);
        if !self.poll_exit(&exit, self.config.grace_period()).await {
            self.kill(pid, tool, exit).await;
        }
    }

    async fn kill(&self, pid: u32, tool: &'static str, mut exit: ExitReceiver) {
        warn!(tool, pid, "Killing process");
        metrics::FORCED_TERMINATIONS
            .with_label_values(&["sigkill"])
            .inc();
        send_signal(pid, Signal::SIGKILL);
        // SIGKILL cannot be ignored; the wait only covers reaping
        let _ = tokio::time::timeout(self.config.force_wait(), wait_for_exit(&mut exit)).await;
    }

    /// Checks for exit every poll interval until `window` elapses.
    async fn poll_exit(&self, exit: &ExitReceiver, window: Duration) -> bool {
        let deadline = Instant::now() + window;
        loop {
            if exit.borrow().is_some() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }

    fn register(&self, pid: u32, tool: &'static str, exit: ExitReceiver) -> Registration<'_> {
        self.active.lock().insert(pid, ActiveProcess { tool, exit });
        Registration { manager: self, pid }
    }

    fn unregister(&self, pid: u32) -> Option<ActiveProcess> {
        self.active.lock().remove(&pid)
    }
}

/// Removes a process from the registry when dropped.
struct Registration<'a> {
    manager: &'a ProcessManager,
    pid: u32,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let Some(process) = self.manager.unregister(self.pid) else {
            return;
        };
        // The owning future went away while the child still runs
        if process.exit.borrow().is_none() {
            warn!(tool = process.tool, pid = self.pid, "Supervisor dropped, killing process");
            send_signal(self.pid, Signal::SIGKILL);
        }
    }
}

async fn wait_for_exit(exit: &mut ExitReceiver) -> ChildExit {
    match exit.wait_for(Option::is_some).await {
        Ok(state) => (*state).unwrap_or(ChildExit::WaitFailed),
        Err(_) => ChildExit::WaitFailed,
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        debug!(error = %e, "Failed to read child output");
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Signals the child's process group. Returns false when it is already gone.
fn send_signal(pid: u32, signal: Signal) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(e) => {
            warn!(pid, ?signal, error = %e, "Failed to signal process group");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolkit;
    use crate::tools::{Tool, ToolHandle};
    use std::sync::Arc;

    fn fast_config() -> ProcessConfig {
        ProcessConfig {
            poll_interval_ms: 20,
            grace_period_ms: 300,
            force_wait_ms: 1000,
        }
    }

    fn invocation(kit: &FakeToolkit, name: &str, body: &str) -> ToolInvocation {
        let path = kit.install(name, body);
        ToolInvocation::new(&ToolHandle {
            tool: Tool::Pandoc,
            path,
        })
    }

    #[tokio::test]
    async fn test_run_captures_output_and_unregisters() {
        let kit = FakeToolkit::new();
        let inv = invocation(&kit, "echoer", "echo out; echo err >&2; exit 3");
        let manager = ProcessManager::new(fast_config());

        let outcome = manager
            .run(&inv, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");
        assert!(!outcome.success());
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let manager = ProcessManager::new(fast_config());
        let inv = ToolInvocation::new(&ToolHandle {
            tool: Tool::Tesseract,
            path: "/nonexistent/tesseract".into(),
        });
        let err = manager
            .run(&inv, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_process() {
        let kit = FakeToolkit::new();
        let inv = invocation(&kit, "sleeper", "exec sleep 30");
        let manager = Arc::new(ProcessManager::new(fast_config()));
        let cancel = CancellationToken::new();

        let task = {
            let manager = manager.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.run(&inv, &cancel).await })
        };

        // Wait until the child is registered
        for _ in 0..100 {
            if manager.active_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.active_count(), 1);

        let started = Instant::now();
        cancel.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConverterError::Cancelled)));
        // SIGINT ends `sleep` immediately, well before the grace period runs out
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_escalates_when_sigint_is_ignored() {
        let kit = FakeToolkit::new();
        let inv = invocation(&kit, "stubborn", "trap '' INT\nwhile true; do sleep 0.05; done");
        let manager = Arc::new(ProcessManager::new(fast_config()));
        let cancel = CancellationToken::new();

        let task = {
            let manager = manager.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.run(&inv, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        cancel.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(ConverterError::Cancelled)));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_terminate_all_stops_every_process() {
        let kit = FakeToolkit::new();
        let manager = Arc::new(ProcessManager::new(fast_config()));
        let mut tasks = Vec::new();
        for i in 0..3 {
            let inv = invocation(&kit, &format!("sleeper{}", i), "exec sleep 30");
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager.run(&inv, &CancellationToken::new()).await
            }));
        }

        for _ in 0..100 {
            if manager.active_count() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let pids = manager.active_pids();
        assert_eq!(pids.len(), 3);

        manager.terminate_all().await;

        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            // Killed by SIGINT, no exit code
            assert_eq!(outcome.exit_code, None);
        }
        assert_eq!(manager.active_count(), 0);
        for pid in pids {
            assert!(!send_signal(pid, Signal::SIGCONT));
        }
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_spawns() {
        let kit = FakeToolkit::new();
        let inv = invocation(&kit, "noop", "exit 0");
        let manager = ProcessManager::new(fast_config());
        manager.begin_shutdown();
        let err = manager
            .run(&inv, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
