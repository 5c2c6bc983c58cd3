//! Single-session audio playback
//!
//! [`PlaybackController`] owns at most one decoded audio session. Starting a
//! new source always tears the previous one down first.

mod controller;
#[cfg(feature = "http")]
mod fetch;
#[cfg(feature = "audio-io")]
mod rodio_backend;
mod silent;

pub use controller::{format_time, PlaybackController, PlaybackEvent, PlaybackState};
#[cfg(feature = "http")]
pub use fetch::HttpAudioFetcher;
#[cfg(feature = "audio-io")]
pub use rodio_backend::RodioBackend;
pub use silent::SilentBackend;

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// What to play
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Audio referenced by URL, fetched on play
    Url(String),
    /// Audio already in memory, e.g. a capture preview
    Memory { key: String, bytes: Arc<Vec<u8>> },
}

impl AudioSource {
    pub fn url(url: impl Into<String>) -> Self {
        AudioSource::Url(url.into())
    }

    pub fn memory(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        AudioSource::Memory {
            key: key.into(),
            bytes: Arc::new(bytes),
        }
    }

    /// Identity used to tell whether two requests target the same audio
    pub fn key(&self) -> &str {
        match self {
            AudioSource::Url(url) => url,
            AudioSource::Memory { key, .. } => key,
        }
    }
}

/// Retrieves the bytes behind an audio reference
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, audio_ref: &str) -> Result<Vec<u8>>;
}

/// Decodes audio into a playable session
pub trait AudioBackend {
    /// Decode `bytes` into a paused session
    fn open(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackSession>>;
}

/// One decoded audio resource
pub trait PlaybackSession {
    fn play(&mut self);
    fn pause(&mut self);
    /// Halt output and release the decoded audio
    fn stop(&mut self);
    /// Reached the end of the stream
    fn is_finished(&self) -> bool;
    fn duration(&self) -> Option<Duration>;
}
