//! Argument vectors handed to the process manager.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::{Tool, ToolHandle};

/// A fully built external command.
///
/// # Example
///
/// ```no_run
/// # use convertino_core::process::ToolInvocation;
/// # use convertino_core::tools::{Tool, ToolHandle};
/// # let handle = ToolHandle { tool: Tool::Pandoc, path: "pandoc".into() };
/// let mut invocation = ToolInvocation::new(&handle);
/// invocation.args(["-f", "markdown", "-t", "html"]).arg("-o").path("out.html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(handle: &ToolHandle) -> Self {
        Self {
            tool: handle.tool,
            program: handle.path.clone(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Append a path argument (lossy UTF-8).
    pub fn path(&mut self, p: impl AsRef<Path>) -> &mut Self {
        self.args.push(p.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output captured from a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
