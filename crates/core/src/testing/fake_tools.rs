//! Scripted stand-ins for the external tools.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{Config, ProcessConfig, TempConfig, ToolsConfig};
use crate::context::ConversionContext;
use crate::tools::Tool;

/// A temp directory of executable shell scripts registered as tool
/// overrides.
///
/// Scripts receive the real argument vector built by the backends, so tests
/// exercise argument building, spawning, supervision and exit
/// classification end to end.
///
/// # Example
///
/// ```rust,ignore
/// use convertino_core::testing::FakeToolkit;
///
/// let kit = FakeToolkit::new();
/// kit.install_tool(Tool::Pandoc, r#"for last; do :; done; echo ok > "$last""#);
/// let ctx = kit.context();
/// ```
#[derive(Debug)]
pub struct FakeToolkit {
    dir: TempDir,
    overrides: Mutex<HashMap<String, PathBuf>>,
}

impl Default for FakeToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create fake toolkit dir"),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding the scripts.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Writes an executable script `name` running `body` under `/bin/sh`.
    pub fn install(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
        self.overrides.lock().insert(name.to_string(), path.clone());
        path
    }

    /// Installs `tool` under its preferred executable name.
    pub fn install_tool(&self, tool: Tool, body: &str) -> PathBuf {
        let program = tool.candidates().first().copied().unwrap_or(tool.name());
        self.install_as(tool, program, body)
    }

    /// Installs `tool` under a specific executable name, e.g. `espeak-ng`
    /// for the speech tool.
    pub fn install_as(&self, tool: Tool, program: &str, body: &str) -> PathBuf {
        let path = self.install(program, body);
        self.overrides.lock().insert(tool.name().to_string(), path.clone());
        path
    }

    /// Tool configuration resolving only to installed scripts.
    pub fn tools_config(&self) -> ToolsConfig {
        ToolsConfig {
            search_prefixes: Vec::new(),
            bundled_dir: Some(self.dir.path().to_path_buf()),
            overrides: self.overrides.lock().clone(),
        }
    }

    /// Context wired to the installed scripts, with short process timeouts
    /// and a temp root inside the toolkit directory.
    pub fn context(&self) -> ConversionContext {
        ConversionContext::new(Config {
            tools: self.tools_config(),
            process: ProcessConfig {
                poll_interval_ms: 20,
                grace_period_ms: 300,
                force_wait_ms: 1000,
            },
            temp: TempConfig {
                root: self.dir.path().join("temp"),
            },
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_tool_registers_override() {
        let kit = FakeToolkit::new();
        let path = kit.install_tool(Tool::ImageMagick, "exit 0");
        assert_eq!(path, kit.dir().join("magick"));
        assert_eq!(kit.tools_config().overrides.get("magick"), Some(&path));

        let espeak = kit.install_as(Tool::Speech, "espeak-ng", "exit 0");
        assert_eq!(kit.tools_config().overrides.get("speech"), Some(&espeak));
    }

    #[test]
    fn test_context_locates_scripts() {
        let kit = FakeToolkit::new();
        kit.install_tool(Tool::Pandoc, "exit 0");
        let ctx = kit.context();
        assert_eq!(
            ctx.tools.locate(Tool::Pandoc).unwrap().path,
            kit.dir().join("pandoc")
        );
        assert!(ctx.temps.root().starts_with(kit.dir()));
    }
}
