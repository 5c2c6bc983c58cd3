//! Proximity engine
//!
//! Decides, on every position update, which recordings are loaded (shown as
//! nearby) and which are close enough to play. Loading uses two thresholds so
//! GPS jitter near the edge does not make a recording flicker in and out.

mod engine;

pub use engine::{NearbyRecording, ProximityEngine, ProximityMap, ProximityState};

use crate::{Result, SoundtrailError};
use serde::{Deserialize, Serialize};

/// Distance thresholds in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// A recording becomes loaded at or inside this distance
    pub load_distance_m: f64,
    /// A loaded recording unloads beyond this distance
    pub unload_distance_m: f64,
    /// A recording can be played at or inside this distance
    pub interaction_distance_m: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            load_distance_m: 20.0,
            unload_distance_m: 40.0,
            interaction_distance_m: 40.0,
        }
    }
}

impl ProximityConfig {
    pub fn new(load_distance_m: f64, unload_distance_m: f64, interaction_distance_m: f64) -> Self {
        Self {
            load_distance_m,
            unload_distance_m,
            interaction_distance_m,
        }
    }

    /// Width of the band in which loaded state does not change
    pub fn hysteresis_band(&self) -> f64 {
        self.unload_distance_m - self.load_distance_m
    }

    pub fn validate(&self) -> Result<()> {
        let values = [
            ("load_distance_m", self.load_distance_m),
            ("unload_distance_m", self.unload_distance_m),
            ("interaction_distance_m", self.interaction_distance_m),
        ];
        for (name, value) in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(SoundtrailError::ConfigError(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.load_distance_m >= self.unload_distance_m {
            return Err(SoundtrailError::ConfigError(format!(
                "load_distance_m ({}) must be smaller than unload_distance_m ({})",
                self.load_distance_m, self.unload_distance_m
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = ProximityConfig::default();
        assert_eq!(config.load_distance_m, 20.0);
        assert_eq!(config.unload_distance_m, 40.0);
        assert_eq!(config.interaction_distance_m, 40.0);
        assert_eq!(config.hysteresis_band(), 20.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        assert!(ProximityConfig::new(40.0, 20.0, 10.0).validate().is_err());
        assert!(ProximityConfig::new(20.0, 20.0, 10.0).validate().is_err());
        assert!(ProximityConfig::new(20.0, 40.0, f64::NAN).validate().is_err());
        assert!(ProximityConfig::new(-1.0, 40.0, 10.0).validate().is_err());
    }
}
