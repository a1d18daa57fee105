use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CONVERTINO_CONFIG";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "convertino.toml";

fn env_provider() -> Env {
    Env::prefixed("CONVERTINO_").split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from the default locations.
///
/// An explicit `CONVERTINO_CONFIG` path must exist. Without one,
/// `convertino.toml` is used when present and built-in defaults otherwise;
/// environment overrides apply in every case.
pub fn load_default_config() -> Result<Config, ConfigError> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        return load_config(&PathBuf::from(explicit));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return load_config(&local);
    }

    Figment::from(Serialized::defaults(Config::default()))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
