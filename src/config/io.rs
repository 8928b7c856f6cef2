//! Configuration I/O operations

use std::fs;
use std::io;
use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration from file, or return defaults if not found
pub fn load(path: &Path) -> Result<Config> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }
        Err(err) => return Err(config_error(path, err)),
    };
    parse(path, &contents)
}

/// Parse and validate config file contents
pub fn parse(path: &Path, contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| config_error(path, e))?;
    if let Some(setting) = &config.daemon.interval {
        setting.resolve().map_err(|e| config_error(path, e))?;
    }
    Ok(config)
}

fn config_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Config {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
