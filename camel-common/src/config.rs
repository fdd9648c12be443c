//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line arguments and environment variables are merged by the binary
//! (clap `env` attributes) into [`ConfigOverrides`] before resolution.

use crate::auth::MAX_TOKEN_TTL_MINUTES;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "camel-classifier";

/// SQLite database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "camel_classifier.db";

/// Default trained model artifact name inside the data folder
pub const MODEL_FILE_NAME: &str = "best_model.onnx";

/// Optional settings read from `config.toml`
///
/// Unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    pub data_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model_path: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: Option<i64>,
    pub frontend_url: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub log_level: Option<String>,
}

/// Settings supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model_path: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: Option<i64>,
    pub frontend_url: Option<String>,
    pub max_upload_bytes: Option<usize>,
    pub log_level: Option<String>,
}

/// Compiled-in defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub gemini_model: String,
    pub token_ttl_minutes: i64,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            data_folder: default_data_folder(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            gemini_model: "gemini-2.0-flash-exp".to_string(),
            token_ttl_minutes: 30,
            max_upload_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_folder: PathBuf,
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: i64,
    pub frontend_url: Option<String>,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides, TOML values and compiled defaults into a validated config
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let data_folder = overrides
            .data_folder
            .or(file.data_folder)
            .unwrap_or(defaults.data_folder);
        let model_path = overrides
            .model_path
            .or(file.model_path)
            .unwrap_or_else(|| data_folder.join(MODEL_FILE_NAME));

        let token_ttl_minutes = overrides
            .token_ttl_minutes
            .or(file.token_ttl_minutes)
            .unwrap_or(defaults.token_ttl_minutes);
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&token_ttl_minutes) {
            return Err(Error::Config(format!(
                "token_ttl_minutes must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_MINUTES, token_ttl_minutes
            )));
        }

        let max_upload_bytes = overrides
            .max_upload_bytes
            .or(file.max_upload_bytes)
            .unwrap_or(defaults.max_upload_bytes);
        if max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be non-zero".to_string()));
        }

        let jwt_secret = non_empty(overrides.jwt_secret).or_else(|| non_empty(file.jwt_secret));
        if let Some(secret) = &jwt_secret {
            if secret.len() < 16 {
                return Err(Error::Config(
                    "jwt_secret must be at least 16 characters".to_string(),
                ));
            }
        }

        Ok(Self {
            database_path: data_folder.join(DATABASE_FILE_NAME),
            data_folder,
            host: non_empty(overrides.host)
                .or_else(|| non_empty(file.host))
                .unwrap_or(defaults.host),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            model_path,
            gemini_api_key: non_empty(overrides.gemini_api_key)
                .or_else(|| non_empty(file.gemini_api_key)),
            gemini_model: non_empty(overrides.gemini_model)
                .or_else(|| non_empty(file.gemini_model))
                .unwrap_or(defaults.gemini_model),
            jwt_secret,
            token_ttl_minutes,
            frontend_url: non_empty(overrides.frontend_url)
                .or_else(|| non_empty(file.frontend_url)),
            max_upload_bytes,
            log_level: non_empty(overrides.log_level)
                .or_else(|| non_empty(file.log_level))
                .unwrap_or(defaults.log_level),
        })
    }

    /// `host:port` string suitable for `TcpListener::bind`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Default location of `config.toml` for the current user
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"))
}

/// Load the TOML config file
///
/// An explicitly requested file must exist. The default file is optional:
/// when it is missing the service starts with defaults. Returns the parsed
/// settings and the path they were read from, if any.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok((TomlConfig::default(), None)),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;
    Ok((config, Some(path)))
}

/// Get OS-dependent default data folder path
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./camel_classifier_data"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_without_overrides() {
        let config = ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default())
            .unwrap();
        let defaults = CompiledDefaults::for_current_platform();

        assert_eq!(config.data_folder, defaults.data_folder);
        assert_eq!(config.database_path, defaults.data_folder.join(DATABASE_FILE_NAME));
        assert_eq!(config.model_path, defaults.data_folder.join(MODEL_FILE_NAME));
        assert_eq!(config.port, 8000);
        assert_eq!(config.token_ttl_minutes, 30);
        assert!(config.gemini_api_key.is_none());
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_override_beats_toml() {
        let overrides = ConfigOverrides {
            port: Some(9100),
            ..Default::default()
        };
        let file = TomlConfig {
            port: Some(9200),
            host: Some("127.0.0.1".to_string()),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, file).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.bind_address(), "127.0.0.1:9100");
    }

    #[test]
    fn test_empty_strings_are_ignored() {
        let overrides = ConfigOverrides {
            frontend_url: Some("   ".to_string()),
            gemini_api_key: Some(String::new()),
            ..Default::default()
        };
        let file = TomlConfig {
            frontend_url: Some("https://camels.example.com".to_string()),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, file).unwrap();
        assert_eq!(config.frontend_url.as_deref(), Some("https://camels.example.com"));
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_model_path_follows_data_folder() {
        let overrides = ConfigOverrides {
            data_folder: Some(PathBuf::from("/srv/camels")),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(overrides, TomlConfig::default()).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/srv/camels/best_model.onnx"));
        assert_eq!(config.database_path, PathBuf::from("/srv/camels/camel_classifier.db"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_ttl = ConfigOverrides {
            token_ttl_minutes: Some(0),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(zero_ttl, TomlConfig::default()).is_err());

        let huge_ttl = ConfigOverrides {
            token_ttl_minutes: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(
            ServiceConfig::resolve(huge_ttl, TomlConfig::default()),
            Err(Error::Config(_))
        ));

        let year_ttl = ConfigOverrides {
            token_ttl_minutes: Some(MAX_TOKEN_TTL_MINUTES),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(year_ttl, TomlConfig::default()).is_ok());

        let short_secret = ConfigOverrides {
            jwt_secret: Some("short".to_string()),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(short_secret, TomlConfig::default()).is_err());
    }
}
