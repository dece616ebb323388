//! Transfer protocol settings loaded from `transfer.toml`.
//!
//! Every key is optional; a missing file yields [`TransferConfig::default`].
//! Values are validated after parsing so a bad file fails at startup rather than
//! on the first TAC request.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "transfer.toml";

/// Settings for the transfer protocol
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Constant tag in front of every TAC (e.g. "TAC")
    pub tac_prefix: String,
    /// Days a freshly issued TAC stays valid
    pub tac_ttl_days: i64,
    /// Attempts the generator makes before giving up on uniqueness
    pub max_generation_attempts: u32,
    /// Page size used when a listing asks for `limit = 0`
    pub default_page_size: u64,
    /// Largest page size a listing may ask for
    pub max_page_size: u64,
    /// Whether notices are handed to the notifier at all
    pub notifications_enabled: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            tac_prefix: "TAC".to_string(),
            tac_ttl_days: 30,
            max_generation_attempts: 10,
            default_page_size: 20,
            max_page_size: 100,
            notifications_enabled: true,
        }
    }
}

impl TransferConfig {
    /// Checks that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        let prefix_ok = !self.tac_prefix.is_empty()
            && self
                .tac_prefix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !prefix_ok {
            return Err(Error::Config {
                message: format!(
                    "tac_prefix must be non-empty uppercase alphanumeric, got {:?}",
                    self.tac_prefix
                ),
            });
        }
        if self.tac_ttl_days <= 0 {
            return Err(Error::Config {
                message: format!("tac_ttl_days must be positive, got {}", self.tac_ttl_days),
            });
        }
        if self.max_generation_attempts == 0 {
            return Err(Error::Config {
                message: "max_generation_attempts must be at least 1".to_string(),
            });
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(Error::Config {
                message: "page sizes must be at least 1".to_string(),
            });
        }
        if self.default_page_size > self.max_page_size {
            return Err(Error::Config {
                message: format!(
                    "default_page_size ({}) exceeds max_page_size ({})",
                    self.default_page_size, self.max_page_size
                ),
            });
        }
        Ok(())
    }
}

/// Parses and validates settings from TOML text.
pub fn parse_config(contents: &str) -> Result<TransferConfig> {
    let config: TransferConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse transfer settings: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TransferConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read settings file {}: {e}",
            path.as_ref().display()
        ),
    })?;
    parse_config(&contents)
}

/// Loads settings from `TRANSFER_CONFIG` or `./transfer.toml`, falling back to
/// defaults when the file does not exist.
pub fn load_default_config() -> Result<TransferConfig> {
    let path = std::env::var("TRANSFER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        tracing::info!("No settings file at {}, using defaults", path);
        Ok(TransferConfig::default())
    }
}
