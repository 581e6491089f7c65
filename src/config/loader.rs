//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::{MachineConfig, ParameterOverrides};

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
///
/// ```rust,ignore
/// use motion_core::load_config;
///
/// let config = load_config("printer.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MachineConfig> {
    let content = read(path.as_ref())?;
    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<MachineConfig> {
    let config: MachineConfig = toml::from_str(content).map_err(parse_error)?;

    // Validate the configuration
    super::validation::validate_config(&config)?;

    Ok(config)
}

/// Parse a stored parameter override table from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid.
pub fn parse_overrides(content: &str) -> Result<ParameterOverrides> {
    toml::from_str(content).map_err(parse_error)
}

/// Load a configuration file and apply an override file on top of it.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed, or if the
/// combined configuration fails validation.
pub fn load_config_with_overrides<P: AsRef<Path>, Q: AsRef<Path>>(
    path: P,
    overrides: Q,
) -> Result<MachineConfig> {
    let config = load_config(path)?;
    let overrides = parse_overrides(&read(overrides.as_ref())?)?;
    config.with_overrides(&overrides)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        let msg = truncate(&e.to_string());
        Error::Config(ConfigError::IoError(msg))
    })
}

fn parse_error(e: toml::de::Error) -> Error {
    Error::Config(ConfigError::ParseError(truncate(e.message())))
}

fn truncate(msg: &str) -> heapless::String<128> {
    let mut out = heapless::String::new();
    for c in msg.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
