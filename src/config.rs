//! Engine configuration
//!
//! Loads tunables from a TOML file, by default `~/.udl.toml`
//! (or `%USERPROFILE%\.udl.toml` on Windows).
//!
//! Example:
//! ```text
//! # UDL engine configuration
//! lexres_dir = "/usr/share/udl"
//! redo_limit = 1000
//! nested_resync_window = 24
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::error::{Result, UdlError};

/// Engine configuration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory that bare identifiers resolve against (`<dir>/<id>.lexres`)
    pub lexres_dir: PathBuf,
    /// Consecutive non-advancing steps allowed at one position
    pub redo_limit: usize,
    /// Lines within which a nested (pushed) line may serve as a restart point
    pub nested_resync_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lexres_dir: PathBuf::from("."),
            redo_limit: 1000,
            nested_resync_window: 24,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE")
                .ok()
                .map(|home| PathBuf::from(home).join(".udl.toml"))
        }

        #[cfg(not(windows))]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".udl.toml"))
        }
    }

    /// Load configuration from the default path, falling back to defaults
    /// when the file is absent.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: Table = contents
            .parse()
            .map_err(|e: toml::de::Error| UdlError::Config(e.to_string()))?;
        let mut config = Config::default();
        config.apply(&table)?;
        Ok(config)
    }

    /// Apply settings from a parsed table
    fn apply(&mut self, table: &Table) -> Result<()> {
        if let Some(value) = table.get("lexres_dir") {
            let dir = value
                .as_str()
                .ok_or_else(|| UdlError::Config("lexres_dir must be a string".into()))?;
            self.lexres_dir = PathBuf::from(dir);
        }

        if let Some(value) = table.get("redo_limit") {
            self.redo_limit = int_setting("redo_limit", value)?.max(1); // At least one step
        }

        if let Some(value) = table.get("nested_resync_window") {
            self.nested_resync_window = int_setting("nested_resync_window", value)?.min(4096);
        }

        Ok(())
    }
}

/// Read a non-negative integer setting
fn int_setting(key: &str, value: &Value) -> Result<usize> {
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| UdlError::Config(format!("{key} must be a non-negative integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let contents = r#"
# Comment
lexres_dir = "/opt/udl"
redo_limit = 50
nested_resync_window = 8
        "#;

        let config = Config::from_toml_str(contents).unwrap();
        assert_eq!(config.lexres_dir, PathBuf::from("/opt/udl"));
        assert_eq!(config.redo_limit, 50);
        assert_eq!(config.nested_resync_window, 8);
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let config = Config::from_toml_str("redo_limit = 7").unwrap();
        assert_eq!(config.redo_limit, 7);
        assert_eq!(config.nested_resync_window, 24);
        assert_eq!(config.lexres_dir, PathBuf::from("."));
    }

    #[test]
    fn test_clamping() {
        let config = Config::from_toml_str("redo_limit = 0\nnested_resync_window = 100000").unwrap();
        assert_eq!(config.redo_limit, 1);
        assert_eq!(config.nested_resync_window, 4096);
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            Config::from_toml_str("redo_limit = -3"),
            Err(UdlError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("lexres_dir = 5"),
            Err(UdlError::Config(_))
        ));
        assert!(matches!(
            Config::from_toml_str("not toml ="),
            Err(UdlError::Config(_))
        ));
    }
}
