//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine
//! configuration from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

use super::types::{
    AcademiesConfig, AcademySettings, AttendanceSettings, EngineConfig, EngineSettings,
    MeetingSettings, RetrySettings,
};

/// Loads and provides access to engine configuration.
///
/// # Directory Structure
///
/// The configuration directory should have the following structure:
/// ```text
/// config/default/
/// ├── engine.yaml      # Attendance, meeting, retry and job settings
/// └── academies.yaml   # Per-academy overrides
/// ```
///
/// # Example
///
/// ```no_run
/// use academy_sessions::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default")?;
/// let settings = loader.academy_settings(1);
/// println!("Preparation: {} minutes", settings.preparation_minutes);
/// # Ok::<(), academy_sessions::error::EngineError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if either file is missing or contains invalid YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let settings = Self::load_yaml::<EngineSettings>(&path.join("engine.yaml"))?;
        let academies = Self::load_yaml::<AcademiesConfig>(&path.join("academies.yaml"))?;

        tracing::debug!(
            path = %path.display(),
            academies = academies.academies.len(),
            "Loaded engine configuration"
        );

        Ok(Self {
            config: EngineConfig::new(settings, academies.academies),
        })
    }

    /// Wraps an already-built configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the underlying engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the attendance settings.
    pub fn attendance(&self) -> &AttendanceSettings {
        self.config.attendance()
    }

    /// Returns the meeting settings.
    pub fn meeting(&self) -> &MeetingSettings {
        self.config.meeting()
    }

    /// Returns the retry policy.
    pub fn retry(&self) -> &RetrySettings {
        self.config.retry()
    }

    /// Resolves the effective settings for an academy.
    pub fn academy_settings(&self, academy_id: u64) -> AcademySettings {
        self.config.academy_settings(academy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn config_path() -> &'static str {
        "./config/default"
    }

    #[test]
    fn test_load_valid_configuration() {
        let result = ConfigLoader::load(config_path());
        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());

        let loader = result.unwrap();
        assert_eq!(loader.attendance().grace_period_minutes, 15);
        assert_eq!(loader.attendance().attended_threshold_percent, Decimal::from(50));
        assert_eq!(loader.retry().backoff_seconds, vec![30, 60, 120]);
    }

    #[test]
    fn test_academy_override_loaded() {
        let loader = ConfigLoader::load(config_path()).unwrap();

        let settings = loader.academy_settings(2);
        assert_eq!(settings.preparation_minutes, 15);
        assert_eq!(settings.late_tolerance_minutes, 10);
        assert!(settings.recording_enabled);
    }

    #[test]
    fn test_unconfigured_academy_uses_defaults() {
        let loader = ConfigLoader::load(config_path()).unwrap();

        let settings = loader.academy_settings(404);
        assert_eq!(settings.preparation_minutes, 10);
        assert_eq!(settings.buffer_minutes, 5);
        assert_eq!(settings.late_tolerance_minutes, 15);
    }

    #[test]
    fn test_load_missing_directory_returns_error() {
        let result = ConfigLoader::load("/nonexistent/path");
        assert!(result.is_err());

        match result {
            Err(EngineError::ConfigNotFound { path }) => {
                assert!(path.contains("engine.yaml"));
            }
            _ => panic!("Expected ConfigNotFound error"),
        }
    }

    #[test]
    fn test_malformed_yaml_returns_parse_error() {
        let dir = std::env::temp_dir().join(format!("academy-sessions-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("engine.yaml"), "attendance: [not, a, map").unwrap();

        let result = ConfigLoader::load(&dir);
        fs::remove_dir_all(&dir).ok();

        match result {
            Err(EngineError::ConfigParseError { path, .. }) => {
                assert!(path.contains("engine.yaml"));
            }
            other => panic!("Expected ConfigParseError, got {:?}", other),
        }
    }
}
