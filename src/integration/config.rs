//! Application configuration
//!
//! One TOML file with a section per component. Every field has a default, so
//! a missing file or a partial file both work.

use crate::capture::CaptureConfig;
use crate::location::LocationConfig;
use crate::proximity::ProximityConfig;
use crate::{Result, SoundtrailError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remote collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the data API; the in-memory store is used when unset
    pub data_url: Option<String>,
    pub data_api_key: Option<String>,
    /// Endpoint that accepts multipart audio uploads
    pub upload_url: Option<String>,
    pub recordings_table: String,
    /// Name stored with submitted recordings
    pub username: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_url: None,
            data_api_key: None,
            upload_url: None,
            recordings_table: "AudioUpload".to_string(),
            username: Some("guest_user".to_string()),
        }
    }
}

impl ServiceConfig {
    /// Whether remote services are configured
    pub fn is_remote(&self) -> bool {
        self.data_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Configuration for the whole application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub proximity: ProximityConfig,
    pub location: LocationConfig,
    pub capture: CaptureConfig,
    pub services: ServiceConfig,
}

impl AppConfig {
    /// `<config dir>/soundtrail/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("soundtrail").join("config.toml"))
    }

    /// Load from the default path, falling back to defaults when there is no
    /// file
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a TOML file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SoundtrailError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            SoundtrailError::ConfigError(msg) => {
                SoundtrailError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| SoundtrailError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_proximity(mut self, proximity: ProximityConfig) -> Self {
        self.proximity = proximity;
        self
    }

    pub fn with_location(mut self, location: LocationConfig) -> Self {
        self.location = location;
        self
    }

    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_services(mut self, services: ServiceConfig) -> Self {
        self.services = services;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.proximity.validate()?;
        self.capture.validate()?;

        if self.location.timeout_ms == 0 {
            return Err(SoundtrailError::ConfigError(
                "location.timeout_ms must be positive".into(),
            ));
        }
        if self.services.recordings_table.trim().is_empty() {
            return Err(SoundtrailError::ConfigError(
                "services.recordings_table must not be empty".into(),
            ));
        }
        if self.services.is_remote() && self.services.upload_url.is_none() {
            return Err(SoundtrailError::ConfigError(
                "services.upload_url is required when services.data_url is set".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.proximity.load_distance_m, 20.0);
        assert_eq!(config.capture.max_seconds, 60);
        assert_eq!(config.services.recordings_table, "AudioUpload");
        assert!(!config.services.is_remote());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [proximity]
            load_distance_m = 15.0

            [services]
            username = "walker"
            "#,
        )
        .unwrap();

        assert_eq!(config.proximity.load_distance_m, 15.0);
        assert_eq!(config.proximity.unload_distance_m, 40.0);
        assert_eq!(config.services.username.as_deref(), Some("walker"));
        assert_eq!(config.location.timeout_ms, 10_000);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [proximity]
            load_distance_m = 50.0
            unload_distance_m = 40.0
            "#,
        );
        assert!(matches!(result, Err(SoundtrailError::ConfigError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[capture]\nmax_seconds = 30").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.capture.max_seconds, 30);
        assert!(AppConfig::load_from("/nonexistent/soundtrail.toml").is_err());
    }

    #[test]
    fn test_load_from_reports_path_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[proximity\nload_distance_m = ").unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, SoundtrailError::ConfigError(_)));
        assert_eq!(message.matches("Configuration error").count(), 1, "{}", message);
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_config_builder() {
        let services = ServiceConfig {
            data_url: Some("https://db.example".into()),
            ..ServiceConfig::default()
        };
        let config = AppConfig::default().with_services(services);
        assert!(config.validate().is_err(), "remote data needs an upload endpoint");
    }
}
