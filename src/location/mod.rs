//! Position acquisition
//!
//! [`PositionSource`] wraps a [`LocationSensor`] and keeps the latest
//! accepted reading plus the status a UI needs to render. Sensor failures are
//! recorded as status instead of being thrown.

mod scripted;
mod source;

pub use scripted::{ManualSensor, ScriptStep, ScriptedSensor};
pub use source::{LocationEvent, LocationSnapshot, PositionSource};

use crate::geo::Position;
use crate::SoundtrailError;
use async_trait::async_trait;
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a position could not be produced
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location access denied by user")]
    PermissionDenied,

    #[error("Location information unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Geolocation is not supported on this device")]
    Unsupported,
}

impl LocationError {
    /// Retrying cannot help until the user changes device settings
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LocationError::PermissionDenied | LocationError::Unsupported
        )
    }
}

impl From<LocationError> for SoundtrailError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::PermissionDenied => SoundtrailError::PermissionError(e.to_string()),
            LocationError::PositionUnavailable => {
                SoundtrailError::PositionError(e.to_string())
            }
            LocationError::Timeout => SoundtrailError::TimeoutError(e.to_string()),
            LocationError::Unsupported => SoundtrailError::PositionError(e.to_string()),
        }
    }
}

/// Outcome of a single sensor read
pub type SensorReading = std::result::Result<Position, LocationError>;

/// Sensor tuning, shared by single-shot and continuous reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    pub high_accuracy: bool,
    /// Longest wait for a fix (per update when watching)
    pub timeout: Duration,
    /// Oldest cached fix the sensor may hand back
    pub maximum_age: Duration,
}

/// Location section of the application config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub once_max_age_ms: u64,
    pub watch_max_age_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            once_max_age_ms: 60_000,
            watch_max_age_ms: 30_000,
        }
    }
}

impl LocationConfig {
    /// Options for a single-shot read
    pub fn once_options(&self) -> LocationOptions {
        LocationOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.once_max_age_ms),
        }
    }

    /// Options for a continuous watch
    pub fn watch_options(&self) -> LocationOptions {
        LocationOptions {
            high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.watch_max_age_ms),
        }
    }
}

/// The platform's location capability
#[async_trait]
pub trait LocationSensor: Send + Sync {
    /// Resolve one fix
    async fn current_position(&self, options: &LocationOptions) -> SensorReading;

    /// Open a continuous feed of readings.
    ///
    /// Dropping the returned receiver cancels the subscription.
    fn watch_position(
        &self,
        options: &LocationOptions,
    ) -> std::result::Result<Receiver<SensorReading>, LocationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let config = LocationConfig::default();
        let once = config.once_options();
        let watch = config.watch_options();
        assert!(once.high_accuracy);
        assert_eq!(once.timeout, Duration::from_secs(10));
        assert_eq!(once.maximum_age, Duration::from_secs(60));
        assert_eq!(watch.maximum_age, Duration::from_secs(30));
    }

    #[test]
    fn test_error_conversion_keeps_kind() {
        let err: SoundtrailError = LocationError::PermissionDenied.into();
        assert!(matches!(err, SoundtrailError::PermissionError(_)));
        assert!(!err.is_recoverable());

        let err: SoundtrailError = LocationError::Timeout.into();
        assert!(err.is_recoverable());
        assert!(!LocationError::Timeout.is_fatal());

        let err: SoundtrailError = LocationError::Unsupported.into();
        assert!(matches!(err, SoundtrailError::PositionError(_)));
        assert!(
            !err.user_message().contains("microphone"),
            "location failure must not blame the microphone"
        );
    }
}
