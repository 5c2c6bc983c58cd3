//! Microphone capture
//!
//! [`CaptureSession`] runs the `Idle -> Recording -> Recorded` lifecycle over
//! a [`CaptureDevice`] and packages the result as a WAV buffer.

#[cfg(feature = "audio-io")]
mod microphone;
mod session;
mod wav;

#[cfg(feature = "audio-io")]
pub use microphone::CpalMicrophone;
pub use session::{CaptureSession, CaptureState, PREVIEW_KEY};
pub use wav::encode_wav;

use crate::{Result, SoundtrailError};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the capture stream is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

/// Capture section of the application config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Hard ceiling on a single recording
    pub max_seconds: u32,
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_seconds: 60,
            sample_rate: 44_100,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

impl CaptureConfig {
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            sample_rate: self.sample_rate,
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_seconds == 0 {
            return Err(SoundtrailError::ConfigError(
                "capture.max_seconds must be at least 1".into(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(SoundtrailError::ConfigError(
                "capture.sample_rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The platform's microphone
pub trait CaptureDevice {
    /// Open the input stream and send sample chunks to `audio_tx`
    fn open(&mut self, constraints: &CaptureConstraints, audio_tx: Sender<Vec<f32>>) -> Result<()>;

    /// Release the input stream. Safe to call when closed.
    fn close(&mut self);

    /// Sample rate of the opened stream
    fn sample_rate(&self) -> u32;

    /// Channels per frame in the chunks sent
    fn channels(&self) -> u16;
}

/// A finished recording, ready for preview or upload
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// 16-bit PCM WAV file contents
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
}

impl CapturedAudio {
    pub fn from_samples(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Self> {
        let bytes = encode_wav(samples, sample_rate, channels)?;
        let frames = samples.len() / channels.max(1) as usize;
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(frames as f64 / sample_rate as f64)
        };
        Ok(Self {
            bytes,
            sample_rate,
            channels,
            duration,
        })
    }

    /// No audio was recorded
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() || self.duration.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let constraints = CaptureConfig::default().constraints();
        assert_eq!(constraints.sample_rate, 44_100);
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
    }

    #[test]
    fn test_captured_duration() {
        let audio = CapturedAudio::from_samples(&vec![0.0; 88_200], 44_100, 1).unwrap();
        assert_eq!(audio.duration, Duration::from_secs(2));
        assert!(!audio.is_empty());

        let stereo = CapturedAudio::from_samples(&vec![0.0; 88_200], 44_100, 2).unwrap();
        assert_eq!(stereo.duration, Duration::from_secs(1));
    }

    #[test]
    fn test_silence_is_empty() {
        let audio = CapturedAudio::from_samples(&[], 44_100, 1).unwrap();
        assert!(audio.is_empty());
        assert!(!audio.bytes.is_empty(), "header is still written");
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let config = CaptureConfig {
            max_seconds: 0,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
