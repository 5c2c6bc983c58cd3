use super::{CaptureConstraints, CaptureDevice};
use crate::{Result, SoundtrailError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use crossbeam_channel::Sender;
use tracing::{debug, error, info};

/// Default input device through cpal, downmixed to mono
pub struct CpalMicrophone {
    device: Device,
    config: Option<StreamConfig>,
    stream: Option<Stream>,
}

impl CpalMicrophone {
    /// Use the default input device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| SoundtrailError::AudioDeviceError("No input device available".into()))?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            device,
            config: None,
            stream: None,
        })
    }

    /// Prefer an f32 config at the requested rate, else the device default
    fn select_config(&self, constraints: &CaptureConstraints) -> Result<StreamConfig> {
        let wanted = SampleRate(constraints.sample_rate);
        let matching = self
            .device
            .supported_input_configs()
            .map_err(|e| {
                SoundtrailError::AudioDeviceError(format!("Failed to query input configs: {}", e))
            })?
            .filter(|range| range.sample_format() == SampleFormat::F32)
            .find(|range| range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate());

        if let Some(range) = matching {
            return Ok(range.with_sample_rate(wanted).into());
        }

        debug!(
            "Input device does not offer {} Hz, using its default",
            constraints.sample_rate
        );
        self.device
            .default_input_config()
            .map(Into::into)
            .map_err(|e| SoundtrailError::AudioDeviceError(format!("Failed to get input config: {}", e)))
    }
}

impl CaptureDevice for CpalMicrophone {
    fn open(&mut self, constraints: &CaptureConstraints, audio_tx: Sender<Vec<f32>>) -> Result<()> {
        self.close();

        let config = self.select_config(constraints)?;
        let channels = config.channels as usize;
        if constraints.echo_cancellation || constraints.noise_suppression {
            debug!("Echo cancellation and noise suppression are left to the host audio stack");
        }

        let err_fn = |err| {
            error!("Audio input stream error: {}", err);
        };

        let stream = self
            .device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let samples = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };

                    if let Err(e) = audio_tx.try_send(samples) {
                        debug!("Failed to send audio data: {}", e);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                SoundtrailError::AudioDeviceError(format!("Failed to build input stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            SoundtrailError::AudioDeviceError(format!("Failed to start input stream: {}", e))
        })?;

        info!(
            "Microphone open at {} Hz, {} channel(s)",
            config.sample_rate.0, config.channels
        );
        self.config = Some(config);
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!("Microphone closed");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.config.as_ref().map(|c| c.sample_rate.0).unwrap_or(44_100)
    }

    fn channels(&self) -> u16 {
        1
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.close();
    }
}
