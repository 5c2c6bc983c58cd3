use super::AudioFetcher;
use crate::{Result, SoundtrailError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches `http(s)://` audio over the network and `file://` audio from disk
#[derive(Debug, Clone)]
pub struct HttpAudioFetcher {
    client: Client,
}

impl HttpAudioFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SoundtrailError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(&self, audio_ref: &str) -> Result<Vec<u8>> {
        if let Some(path) = audio_ref.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .map_err(|e| SoundtrailError::PlaybackError(format!("{}: {}", path, e)));
        }

        let response = self
            .client
            .get(audio_ref)
            .send()
            .await
            .map_err(|e| SoundtrailError::PlaybackError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SoundtrailError::PlaybackError(format!(
                "Fetching {} failed with {}",
                audio_ref, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SoundtrailError::PlaybackError(e.to_string()))?;
        debug!("Fetched {} bytes from {}", bytes.len(), audio_ref);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"RIFF").unwrap();
        let url = format!("file://{}", file.path().display());

        let fetcher = HttpAudioFetcher::new().unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap(), b"RIFF".to_vec());
    }

    #[tokio::test]
    async fn test_missing_file_is_playback_error() {
        let fetcher = HttpAudioFetcher::new().unwrap();
        let err = fetcher
            .fetch("file:///nonexistent/soundtrail.wav")
            .await
            .unwrap_err();
        assert!(matches!(err, SoundtrailError::PlaybackError(_)));
    }
}
