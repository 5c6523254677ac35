//! Configuration management for the caregiver registry.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validation::Validator;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "caregiver-registry";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "registry.db";

/// Default backup directory name, inside the data directory.
const BACKUP_DIR_NAME: &str = "backups";

/// Environment variable prefix.
const ENV_PREFIX: &str = "CAREREG_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CAREREG_`, sections separated by `__`)
/// 2. TOML config file at `~/.config/caregiver-registry/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Import configuration.
    pub import: ImportConfig,
    /// Verification workflow configuration.
    pub verification: VerificationConfig,
    /// Submission validation configuration.
    pub validation: ValidationConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/caregiver-registry/registry.db`
    pub database_path: Option<PathBuf>,
    /// Directory for backups taken before destructive writes.
    /// Defaults to `~/.local/share/caregiver-registry/backups`
    pub backup_dir: Option<PathBuf>,
    /// Take a backup before deletes, imports and migrations.
    pub backup_before_write: bool,
    /// Number of backups to keep. Set to 0 for unlimited.
    pub max_backups: usize,
}

/// Import-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Worksheet to read from spreadsheets; the first sheet when unset.
    pub default_sheet: Option<String>,
    /// Column holding names when uploading unverified names.
    pub name_column: String,
}

/// Verification workflow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Verifier label recorded for single verify/reject actions.
    pub verifier_label: String,
    /// Verifier label recorded for bulk actions.
    pub bulk_verifier_label: String,
}

/// Submission validation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Regex that non-blank phone numbers must match. Unset accepts anything.
    pub phone_pattern: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            backup_dir: None,
            backup_before_write: true,
            max_backups: 20,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_sheet: None,
            name_column: "name".to_string(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            verifier_label: "Manual Verification".to_string(),
            bulk_verifier_label: "Bulk Action".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing config file is not an error; defaults and environment
    /// variables still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.verification.verifier_label.trim().is_empty()
            || self.verification.bulk_verifier_label.trim().is_empty()
        {
            return Err(Error::ConfigValidation {
                message: "verifier labels must not be empty".to_string(),
            });
        }

        if self.import.name_column.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "name_column must not be empty".to_string(),
            });
        }

        self.validator().map(|_| ())
    }

    /// Build the submission validator described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if `phone_pattern` is not a valid regex.
    pub fn validator(&self) -> Result<Validator> {
        match &self.validation.phone_pattern {
            Some(pattern) => Validator::with_phone_pattern(pattern),
            None => Ok(Validator::new()),
        }
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the backup directory, resolving defaults if not set.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.storage
            .backup_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(BACKUP_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.backup_before_write);
        assert_eq!(config.storage.max_backups, 20);
        assert_eq!(config.import.name_column, "name");
        assert_eq!(config.verification.verifier_label, "Manual Verification");
        assert_eq!(config.verification.bulk_verifier_label, "Bulk Action");
        assert!(config.validation.phone_pattern.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_phone_pattern() {
        let mut config = Config::default();
        config.validation.phone_pattern = Some("[invalid".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("phone_pattern"));
    }

    #[test]
    fn test_validate_empty_verifier_label() {
        let mut config = Config::default();
        config.verification.bulk_verifier_label = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("verifier labels"));
    }

    #[test]
    fn test_validate_empty_name_column() {
        let mut config = Config::default();
        config.import.name_column = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("registry.db"));
        assert!(path.to_string_lossy().contains(DATA_DIR_NAME));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_backup_dir_default() {
        let dir = Config::default().backup_dir();
        assert!(dir.ends_with("backups"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let path =
            std::env::temp_dir().join(format!("carereg_config_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[storage]\nmax_backups = 3\n\n[validation]\nphone_pattern = \"^[0-9 +-]+$\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.storage.max_backups, 3);
        assert!(config.storage.backup_before_write);
        assert!(config.validation.phone_pattern.is_some());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("carereg_no_such_config.toml");
        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.import.name_column, "name");
    }

    #[test]
    fn test_validator_from_config() {
        let mut config = Config::default();
        config.validation.phone_pattern = Some(r"^\d+$".to_string());
        let validator = config.validator().unwrap();

        let input = crate::records::CaregiverInput::new("Jane", "0803-111");
        assert!(validator.check_caregiver(&input).is_err());
    }

    #[test]
    fn test_config_serializes_to_toml_sections() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert!(value.get("storage").is_some());
        assert!(value.get("verification").is_some());
    }
}
