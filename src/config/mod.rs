//! Configuration management.
//!
//! Settings come from three layers, weakest first: built-in defaults, a TOML
//! config file, and command-line flags (which clap also backs with
//! environment variables). The config file lives at
//! `<config dir>/strandcli/config.toml` unless `--config` points elsewhere.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default endpoint used when neither file nor flags set one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/";

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Endpoint address of the Strand deployment.
    pub endpoint: String,
    /// Application API key.
    pub api_key: Option<String>,
    /// User access token.
    pub access_token: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            access_token: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    endpoint: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl CliConfig {
    /// Loads configuration from an explicit file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        let mut config = Self::default();
        if let Some(endpoint) = file.endpoint {
            config.endpoint = endpoint;
        }
        config.api_key = file.api_key;
        config.access_token = file.access_token;
        Ok(config)
    }

    /// Loads configuration from `path` if given, else from the default
    /// location if a file exists there, else built-in defaults.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        if let Some(base_dirs) = directories::BaseDirs::new() {
            let default_path = base_dirs.config_dir().join("strandcli").join("config.toml");
            if default_path.exists() {
                return Self::load_from_file(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Applies flag-level overrides on top of the loaded configuration.
    #[must_use]
    pub fn with_overrides(
        mut self,
        endpoint: Option<String>,
        api_key: Option<String>,
        access_token: Option<String>,
    ) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if api_key.is_some() {
            self.api_key = api_key;
        }
        if access_token.is_some() {
            self.access_token = access_token;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.api_key.is_none());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
endpoint = "https://api.example.com/"
api_key = "key-123"
"#,
        )
        .unwrap();

        let config = CliConfig::load_from_file(&path).unwrap();
        assert_eq!(config.endpoint, "https://api.example.com/");
        assert_eq!(config.api_key.as_deref(), Some("key-123"));
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(CliConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = [not toml").unwrap();
        assert!(CliConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let config = CliConfig {
            endpoint: "https://file.example.com/".to_string(),
            api_key: Some("file-key".to_string()),
            access_token: Some("file-token".to_string()),
        }
        .with_overrides(
            Some("https://flag.example.com/".to_string()),
            None,
            Some("flag-token".to_string()),
        );

        assert_eq!(config.endpoint, "https://flag.example.com/");
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.access_token.as_deref(), Some("flag-token"));
    }
}
