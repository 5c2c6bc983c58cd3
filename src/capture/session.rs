use super::{CaptureConfig, CaptureDevice, CapturedAudio};
use crate::playback::AudioSource;
use crate::{Result, SoundtrailError};
use crossbeam_channel::{unbounded, Receiver};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key under which the capture preview is handed to playback
pub const PREVIEW_KEY: &str = "capture-preview";

/// Capture lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
    Recorded,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Recording => write!(f, "Recording"),
            CaptureState::Recorded => write!(f, "Recorded"),
        }
    }
}

/// One recording at a time from a [`CaptureDevice`].
///
/// The elapsed counter advances through [`CaptureSession::tick`], once per
/// second. [`CaptureSession::record`] drives that clock on the tokio timer;
/// callers with their own clock can tick by hand. Reaching `max_seconds`
/// stops the recording.
pub struct CaptureSession {
    device: Box<dyn CaptureDevice>,
    config: CaptureConfig,
    state: CaptureState,
    elapsed_seconds: u32,
    chunks: Option<Receiver<Vec<f32>>>,
    samples: Vec<f32>,
    captured: Option<CapturedAudio>,
}

impl CaptureSession {
    pub fn new(device: Box<dyn CaptureDevice>, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            state: CaptureState::Idle,
            elapsed_seconds: 0,
            chunks: None,
            samples: Vec::new(),
            captured: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn max_seconds(&self) -> u32 {
        self.config.max_seconds
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.config.max_seconds.saturating_sub(self.elapsed_seconds)
    }

    /// The finished recording, kept until [`CaptureSession::reset`]
    pub fn captured(&self) -> Option<&CapturedAudio> {
        self.captured.as_ref()
    }

    /// The finished recording as an in-memory playback source
    pub fn preview_source(&self) -> Option<AudioSource> {
        self.captured
            .as_ref()
            .map(|audio| AudioSource::memory(PREVIEW_KEY, audio.bytes.clone()))
    }

    /// Open the microphone and begin recording. Only valid from `Idle`.
    pub fn start(&mut self) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(SoundtrailError::StateError(format!(
                "Cannot start recording while {}",
                self.state
            )));
        }

        let (audio_tx, audio_rx) = unbounded();
        if let Err(e) = self.device.open(&self.config.constraints(), audio_tx) {
            warn!("Failed to open microphone: {}", e);
            self.device.close();
            return Err(match e {
                SoundtrailError::AudioDeviceError(_) | SoundtrailError::PermissionError(_) => e,
                other => SoundtrailError::AudioDeviceError(other.to_string()),
            });
        }

        self.chunks = Some(audio_rx);
        self.samples.clear();
        self.elapsed_seconds = 0;
        self.state = CaptureState::Recording;
        info!(
            "Recording started ({} Hz, limit {}s)",
            self.device.sample_rate(),
            self.config.max_seconds
        );
        Ok(())
    }

    /// Advance the elapsed counter by one second
    pub fn tick(&mut self) -> Result<CaptureState> {
        if self.state != CaptureState::Recording {
            return Ok(self.state);
        }

        self.drain();
        self.elapsed_seconds += 1;
        if self.elapsed_seconds >= self.config.max_seconds {
            info!("Reached {}s recording limit", self.config.max_seconds);
            self.finish()?;
        }
        Ok(self.state)
    }

    /// Run the 1 Hz clock until `stop` resolves or the ceiling is reached,
    /// then return the finished recording. Only valid from `Recording`.
    pub async fn record<F>(&mut self, stop: F) -> Result<&CapturedAudio>
    where
        F: Future<Output = ()>,
    {
        if self.state != CaptureState::Recording {
            return Err(SoundtrailError::StateError(format!(
                "Cannot run the capture clock while {}",
                self.state
            )));
        }

        let period = Duration::from_secs(1);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => {
                    debug!("Capture stopped by caller after {}s", self.elapsed_seconds);
                    self.stop()?;
                    break;
                }
                _ = ticker.tick() => {
                    if self.tick()? != CaptureState::Recording {
                        break;
                    }
                }
            }
        }

        self.captured
            .as_ref()
            .ok_or_else(|| SoundtrailError::StateError("Recording produced no audio".into()))
    }

    /// Finish the recording. Only valid from `Recording`.
    pub fn stop(&mut self) -> Result<&CapturedAudio> {
        if self.state != CaptureState::Recording {
            return Err(SoundtrailError::StateError(format!(
                "Cannot stop recording while {}",
                self.state
            )));
        }
        self.finish()
    }

    /// Discard everything and release the microphone. Valid from any state.
    pub fn reset(&mut self) {
        self.device.close();
        self.chunks = None;
        self.samples = Vec::new();
        self.captured = None;
        self.elapsed_seconds = 0;
        if self.state != CaptureState::Idle {
            debug!("Capture reset from {}", self.state);
        }
        self.state = CaptureState::Idle;
    }

    fn drain(&mut self) {
        if let Some(rx) = &self.chunks {
            for chunk in rx.try_iter() {
                self.samples.extend_from_slice(&chunk);
            }
        }
    }

    fn finish(&mut self) -> Result<&CapturedAudio> {
        self.device.close();
        self.drain();
        self.chunks = None;

        let samples = std::mem::take(&mut self.samples);
        let audio = match CapturedAudio::from_samples(
            &samples,
            self.device.sample_rate(),
            self.device.channels(),
        ) {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Failed to package recording: {}", e);
                self.reset();
                return Err(e);
            }
        };

        info!(
            "Recording stopped after {}s ({:.1}s of audio, {} bytes)",
            self.elapsed_seconds,
            audio.duration.as_secs_f32(),
            audio.bytes.len()
        );
        self.state = CaptureState::Recorded;
        let audio: &CapturedAudio = self.captured.insert(audio);
        Ok(audio)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.device.close();
    }
}
