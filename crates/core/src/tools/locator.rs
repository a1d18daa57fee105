use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{LocateStrategy, Tool};
use crate::config::ToolsConfig;
use crate::converter::ConverterError;

/// Bound on a `--version` probe.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// A resolved executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHandle {
    pub tool: Tool,
    pub path: PathBuf,
}

impl ToolHandle {
    /// File name of the executable, used to pick per-program argument
    /// conventions (`say` vs `espeak-ng`).
    pub fn program_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.tool.name().to_string())
    }
}

/// Availability information for a tool, returned by [`ToolLocator::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub tool: Tool,
    pub available: bool,
    /// First line of the version banner, if any.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Resolves tools and caches the results for the lifetime of the process.
#[derive(Debug)]
pub struct ToolLocator {
    config: ToolsConfig,
    cache: Mutex<HashMap<Tool, Option<PathBuf>>>,
}

impl ToolLocator {
    pub fn new(config: ToolsConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle for `tool` or [`ConverterError::ToolNotFound`].
    pub fn locate(&self, tool: Tool) -> Result<ToolHandle, ConverterError> {
        let mut cache = self.cache.lock();
        let resolved = cache
            .entry(tool)
            .or_insert_with(|| self.resolve(tool))
            .clone();

        resolved
            .map(|path| ToolHandle { tool, path })
            .ok_or_else(|| ConverterError::tool_not_found(tool.name()))
    }

    /// Drops cached results so the next lookup probes again.
    pub fn invalidate(&self) {
        self.cache.lock().clear();
    }

    fn resolve(&self, tool: Tool) -> Option<PathBuf> {
        if let Some(path) = self.config.overrides.get(tool.name()) {
            if path.exists() {
                debug!(tool = tool.name(), path = %path.display(), "Using tool override");
                return Some(path.clone());
            }
            warn!(
                tool = tool.name(),
                path = %path.display(),
                "Tool override does not exist, falling back to discovery"
            );
        }

        let found = match tool.strategy() {
            LocateStrategy::SearchPath => self.search(tool),
            LocateStrategy::Bundled => self
                .bundled_dir()
                .and_then(|dir| find_in_dir(&dir, tool.candidates())),
        };

        match &found {
            Some(path) => debug!(tool = tool.name(), path = %path.display(), "Located tool"),
            None => debug!(tool = tool.name(), "Tool not found"),
        }
        found
    }

    fn search(&self, tool: Tool) -> Option<PathBuf> {
        tool.candidates()
            .iter()
            .find_map(|name| which::which(name).ok())
            .or_else(|| {
                self.config
                    .search_prefixes
                    .iter()
                    .find_map(|prefix| find_in_dir(prefix, tool.candidates()))
            })
    }

    fn bundled_dir(&self) -> Option<PathBuf> {
        self.config.bundled_dir.clone().or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
        })
    }

    /// Reports availability and version of every known tool.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(Tool::ALL.len());
        for &tool in Tool::ALL {
            let info = match self.locate(tool) {
                Ok(handle) => ToolInfo {
                    tool,
                    available: true,
                    version: probe_version(&handle).await,
                    path: Some(handle.path),
                },
                Err(_) => ToolInfo {
                    tool,
                    available: false,
                    version: None,
                    path: None,
                },
            };
            infos.push(info);
        }
        infos
    }
}

fn find_in_dir(dir: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

async fn probe_version(handle: &ToolHandle) -> Option<String> {
    let args = handle.tool.version_args()?;
    let output = tokio::time::timeout(
        VERSION_TIMEOUT,
        Command::new(&handle.path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    // Some tools print their banner on stderr
    let banner = [&output.stdout, &output.stderr]
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
        .find_map(|text| {
            text.lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        });
    banner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolkit;

    fn config_with(overrides: HashMap<String, PathBuf>) -> ToolsConfig {
        ToolsConfig {
            search_prefixes: Vec::new(),
            bundled_dir: Some(PathBuf::from("/nonexistent/bundle")),
            overrides,
        }
    }

    #[test]
    fn test_override_wins() {
        let kit = FakeToolkit::new();
        let path = kit.install("pandoc", "exit 0");
        let locator = ToolLocator::new(config_with(HashMap::from([(
            "pandoc".to_string(),
            path.clone(),
        )])));

        let handle = locator.locate(Tool::Pandoc).unwrap();
        assert_eq!(handle.path, path);
        assert_eq!(handle.program_name(), "pandoc");
    }

    #[test]
    fn test_search_prefixes_are_probed_in_order() {
        let first = FakeToolkit::new();
        let second = FakeToolkit::new();
        // `convert` in the first prefix beats `magick` in the second
        first.install("convert", "exit 0");
        second.install("magick", "exit 0");

        let locator = ToolLocator::new(ToolsConfig {
            search_prefixes: vec![first.dir().to_path_buf(), second.dir().to_path_buf()],
            bundled_dir: None,
            overrides: HashMap::new(),
        });

        let resolved = locator.resolve_in_prefixes(Tool::ImageMagick);
        assert_eq!(resolved, Some(first.dir().join("convert")));
    }

    #[test]
    fn test_bundled_tools_ignore_path() {
        let locator = ToolLocator::new(config_with(HashMap::new()));
        let err = locator.locate(Tool::Ffmpeg).unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { ref tool } if tool == "ffmpeg"));
    }

    #[test]
    fn test_bundled_dir_lookup() {
        let kit = FakeToolkit::new();
        kit.install("ffprobe", "exit 0");
        let locator = ToolLocator::new(ToolsConfig {
            search_prefixes: Vec::new(),
            bundled_dir: Some(kit.dir().to_path_buf()),
            overrides: HashMap::new(),
        });
        assert_eq!(
            locator.locate(Tool::Ffprobe).unwrap().path,
            kit.dir().join("ffprobe")
        );
    }

    #[tokio::test]
    async fn test_check_all_reports_version() {
        let kit = FakeToolkit::new();
        let path = kit.install("tesseract", "echo 'tesseract 5.3.0'; echo ' leptonica-1.83'");
        let locator = ToolLocator::new(config_with(HashMap::from([(
            "tesseract".to_string(),
            path,
        )])));

        let infos = locator.check_all().await;
        let tesseract = infos.iter().find(|i| i.tool == Tool::Tesseract).unwrap();
        assert!(tesseract.available);
        assert_eq!(tesseract.version.as_deref(), Some("tesseract 5.3.0"));

        let ffmpeg = infos.iter().find(|i| i.tool == Tool::Ffmpeg).unwrap();
        assert!(!ffmpeg.available);
    }

    impl ToolLocator {
        fn resolve_in_prefixes(&self, tool: Tool) -> Option<PathBuf> {
            self.config
                .search_prefixes
                .iter()
                .find_map(|prefix| find_in_dir(prefix, tool.candidates()))
        }
    }
}
