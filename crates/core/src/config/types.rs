use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub temp: TempConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External tool discovery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Install prefixes probed, in order, after the `PATH` search fails.
    #[serde(default = "default_search_prefixes")]
    pub search_prefixes: Vec<PathBuf>,
    /// Directory holding the pinned ffmpeg/ffprobe builds.
    /// Defaults to the directory of the running executable.
    #[serde(default)]
    pub bundled_dir: Option<PathBuf>,
    /// Explicit tool paths keyed by tool name (e.g. `pandoc`).
    #[serde(default)]
    pub overrides: HashMap<String, PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_prefixes: default_search_prefixes(),
            bundled_dir: None,
            overrides: HashMap::new(),
        }
    }
}

fn default_search_prefixes() -> Vec<PathBuf> {
    [
        "/opt/homebrew/bin",
        "/usr/local/bin",
        "/opt/local/bin",
        "/usr/bin",
        "/bin",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// Child process supervision
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    /// Poll granularity used while waiting for a signalled child to exit.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Time a child gets to exit after SIGINT before escalation.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Bound on the wait after SIGTERM before SIGKILL.
    #[serde(default = "default_force_wait_ms")]
    pub force_wait_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            grace_period_ms: default_grace_period_ms(),
            force_wait_ms: default_force_wait_ms(),
        }
    }
}

impl ProcessConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn force_wait(&self) -> Duration {
        Duration::from_millis(self.force_wait_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_grace_period_ms() -> u64 {
    1000
}

fn default_force_wait_ms() -> u64 {
    5000
}

/// Scratch space
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TempConfig {
    #[serde(default = "default_temp_root")]
    pub root: PathBuf,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            root: default_temp_root(),
        }
    }
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("convertino")
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.process.poll_interval_ms, 100);
        assert_eq!(config.process.grace_period_ms, 1000);
        assert_eq!(config.process.force_wait_ms, 5000);
        assert_eq!(config.logging.filter, "info");
        assert!(!config.logging.json);
        assert!(config.tools.bundled_dir.is_none());
        assert_eq!(
            config.tools.search_prefixes.first(),
            Some(&PathBuf::from("/opt/homebrew/bin"))
        );
    }

    #[test]
    fn test_deserialize_tool_overrides() {
        let toml = r#"
[tools]
bundled_dir = "/app/bin"

[tools.overrides]
pandoc = "/custom/pandoc"
magick = "/custom/magick"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tools.bundled_dir, Some(PathBuf::from("/app/bin")));
        assert_eq!(
            config.tools.overrides.get("pandoc"),
            Some(&PathBuf::from("/custom/pandoc"))
        );
        // Prefixes keep their default when the section only sets other keys
        assert_eq!(config.tools.search_prefixes.len(), 5);
    }

    #[test]
    fn test_process_durations() {
        let toml = r#"
[process]
poll_interval_ms = 50
grace_period_ms = 250
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.process.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.process.grace_period(), Duration::from_millis(250));
        assert_eq!(config.process.force_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_temp_root_is_under_system_temp() {
        let config = Config::default();
        assert!(config.temp.root.starts_with(std::env::temp_dir()));
        assert!(config.temp.root.ends_with("convertino"));
    }
}
