use super::{AudioBackend, PlaybackSession};
use crate::{Result, SoundtrailError};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::time::Duration;
use tracing::info;

/// Plays through the default output device
pub struct RodioBackend {
    // Output stops when the stream is dropped
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn new() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| SoundtrailError::AudioDeviceError(format!("No output device: {}", e)))?;
        info!("Opened default audio output");
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackSession>> {
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| SoundtrailError::PlaybackError(format!("Failed to create sink: {}", e)))?;
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| SoundtrailError::PlaybackError(format!("Failed to decode audio: {}", e)))?;
        let duration = source.total_duration();

        sink.pause();
        sink.append(source);
        Ok(Box::new(RodioSession { sink, duration }))
    }
}

struct RodioSession {
    sink: Sink,
    duration: Option<Duration>,
}

impl PlaybackSession for RodioSession {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}
