use super::{AudioBackend, PlaybackSession};
use crate::{Result, SoundtrailError};
use std::io::Cursor;
use std::time::{Duration, Instant};
use tracing::debug;

/// Backend without an output device.
///
/// Accepts WAV data, checks it decodes and "plays" it against the wall clock
/// for its real duration. Used when no audio output is available.
#[derive(Debug, Default)]
pub struct SilentBackend;

impl SilentBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for SilentBackend {
    fn open(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackSession>> {
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| SoundtrailError::PlaybackError(format!("Failed to decode audio: {}", e)))?;
        let spec = reader.spec();
        let frames = reader.duration() as f64;
        let duration = Duration::from_secs_f64(frames / spec.sample_rate.max(1) as f64);
        debug!("Silent session of {:.1}s", duration.as_secs_f32());

        Ok(Box::new(SilentSession {
            duration,
            played: Duration::ZERO,
            started_at: None,
        }))
    }
}

struct SilentSession {
    duration: Duration,
    played: Duration,
    started_at: Option<Instant>,
}

impl SilentSession {
    fn elapsed(&self) -> Duration {
        self.played + self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }
}

impl PlaybackSession for SilentSession {
    fn play(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(start) = self.started_at.take() {
            self.played += start.elapsed();
        }
    }

    fn stop(&mut self) {
        self.started_at = None;
        self.played = self.duration;
    }

    fn is_finished(&self) -> bool {
        self.elapsed() >= self.duration
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }
}
