use super::{AudioBackend, AudioFetcher, AudioSource, PlaybackSession};
use crate::{Result, SoundtrailError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Audio playback state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing held
    #[default]
    Stopped,
    /// A session is producing sound
    Playing,
    /// A session is held but silent
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// Notifications for subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started { key: String },
    Paused { key: String },
    Resumed { key: String },
    /// Stopped on request
    Stopped { key: String },
    /// Reached the end of the stream
    Ended { key: String },
    Error { key: String, message: String },
}

/// Wall-clock position of the active session
#[derive(Debug, Default)]
struct PlaybackClock {
    started_at: Option<Instant>,
    accumulated: Duration,
}

impl PlaybackClock {
    fn resume(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(start) = self.started_at.take() {
            self.accumulated += start.elapsed();
        }
    }

    fn position(&self) -> Duration {
        self.accumulated + self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }
}

struct ActiveSession {
    key: String,
    session: Box<dyn PlaybackSession>,
    clock: PlaybackClock,
}

/// Owner of the one audio session the application may hold
pub struct PlaybackController {
    backend: Box<dyn AudioBackend>,
    fetcher: Arc<dyn AudioFetcher>,
    active: Option<ActiveSession>,
    state: PlaybackState,
    last_error: Option<SoundtrailError>,
    subscribers: Vec<Sender<PlaybackEvent>>,
}

impl PlaybackController {
    pub fn new(backend: Box<dyn AudioBackend>, fetcher: Arc<dyn AudioFetcher>) -> Self {
        Self {
            backend,
            fetcher,
            active: None,
            state: PlaybackState::Stopped,
            last_error: None,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Key of the held session, playing or paused
    pub fn current_key(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.key.as_str())
    }

    pub fn last_error(&self) -> Option<&SoundtrailError> {
        self.last_error.as_ref()
    }

    /// Elapsed play time of the held session, zero when stopped
    pub fn position(&self) -> Duration {
        self.active
            .as_ref()
            .map(|a| a.clock.position())
            .unwrap_or_default()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.active.as_ref().and_then(|a| a.session.duration())
    }

    /// Fraction of the track played (0.0 to 1.0)
    pub fn progress(&self) -> f32 {
        match self.duration() {
            Some(total) if !total.is_zero() => {
                (self.position().as_secs_f32() / total.as_secs_f32()).min(1.0)
            }
            _ => 0.0,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Play `source` from the start.
    ///
    /// Any held session is released before the new audio is fetched. On
    /// failure the controller ends up stopped and the error is both returned
    /// and kept in [`PlaybackController::last_error`].
    pub async fn play(&mut self, source: AudioSource) -> Result<()> {
        self.release();
        self.last_error = None;
        let key = source.key().to_string();

        let bytes = match source {
            AudioSource::Url(url) => match self.fetcher.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(e) => return Err(self.fail(key, e)),
            },
            AudioSource::Memory { bytes, .. } => bytes.as_ref().clone(),
        };

        let mut session = match self.backend.open(bytes) {
            Ok(session) => session,
            Err(e) => return Err(self.fail(key, e)),
        };

        session.play();
        let mut clock = PlaybackClock::default();
        clock.resume();
        self.active = Some(ActiveSession {
            key: key.clone(),
            session,
            clock,
        });
        self.state = PlaybackState::Playing;
        info!("Playing {}", key);
        self.emit(PlaybackEvent::Started { key });
        Ok(())
    }

    /// Pause a playing `source`, resume a paused one, otherwise start it
    pub async fn toggle(&mut self, source: AudioSource) -> Result<()> {
        let same = self.current_key() == Some(source.key());
        match (same, self.state) {
            (true, PlaybackState::Playing) => {
                self.pause();
                Ok(())
            }
            (true, PlaybackState::Paused) => {
                self.resume();
                Ok(())
            }
            _ => self.play(source).await,
        }
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(active) = self.active.as_mut() {
            active.session.pause();
            active.clock.pause();
            let key = active.key.clone();
            self.state = PlaybackState::Paused;
            debug!("Paused {}", key);
            self.emit(PlaybackEvent::Paused { key });
        }
    }

    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        if let Some(active) = self.active.as_mut() {
            active.session.play();
            active.clock.resume();
            let key = active.key.clone();
            self.state = PlaybackState::Playing;
            debug!("Resumed {}", key);
            self.emit(PlaybackEvent::Resumed { key });
        }
    }

    /// Stop and release the held session. Does nothing when stopped.
    pub fn stop(&mut self) {
        if let Some(key) = self.release() {
            info!("Stopped {}", key);
            self.emit(PlaybackEvent::Stopped { key });
        }
    }

    /// Detect natural end of stream; call regularly while playing
    pub fn poll(&mut self) -> Option<PlaybackEvent> {
        let finished = self.state == PlaybackState::Playing
            && self.active.as_ref().is_some_and(|a| a.session.is_finished());
        if !finished {
            return None;
        }

        let key = self.release()?;
        info!("Finished {}", key);
        let event = PlaybackEvent::Ended { key };
        self.emit(event.clone());
        Some(event)
    }

    /// Tear the active session down, returning its key
    fn release(&mut self) -> Option<String> {
        self.state = PlaybackState::Stopped;
        let mut active = self.active.take()?;
        active.session.stop();
        debug!("Released audio session {}", active.key);
        Some(active.key)
    }

    fn fail(&mut self, key: String, error: SoundtrailError) -> SoundtrailError {
        let error = match error {
            SoundtrailError::PlaybackError(_) | SoundtrailError::AudioDeviceError(_) => error,
            other => SoundtrailError::PlaybackError(other.to_string()),
        };
        warn!("Playback of {} failed: {}", key, error);
        self.state = PlaybackState::Stopped;
        self.last_error = Some(error.clone());
        self.emit(PlaybackEvent::Error {
            key,
            message: error.to_string(),
        });
        error
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.release();
    }
}

/// Format time in MM:SS format
pub fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Ledger {
        live: usize,
        opened: usize,
        finished: bool,
    }

    struct MockSession {
        ledger: Arc<Mutex<Ledger>>,
        released: bool,
    }

    impl PlaybackSession for MockSession {
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn stop(&mut self) {
            if !self.released {
                self.released = true;
                self.ledger.lock().live -= 1;
            }
        }
        fn is_finished(&self) -> bool {
            self.ledger.lock().finished
        }
        fn duration(&self) -> Option<Duration> {
            Some(Duration::from_secs(90))
        }
    }

    struct MockBackend {
        ledger: Arc<Mutex<Ledger>>,
    }

    impl AudioBackend for MockBackend {
        fn open(&mut self, bytes: Vec<u8>) -> Result<Box<dyn PlaybackSession>> {
            if bytes.is_empty() {
                return Err(SoundtrailError::PlaybackError("cannot decode".into()));
            }
            let mut ledger = self.ledger.lock();
            ledger.live += 1;
            ledger.opened += 1;
            Ok(Box::new(MockSession {
                ledger: Arc::clone(&self.ledger),
                released: false,
            }))
        }
    }

    struct MockFetcher;

    #[async_trait]
    impl AudioFetcher for MockFetcher {
        async fn fetch(&self, audio_ref: &str) -> Result<Vec<u8>> {
            if audio_ref.contains("missing") {
                Err(SoundtrailError::PlaybackError("404".into()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    fn controller() -> (PlaybackController, Arc<Mutex<Ledger>>) {
        let ledger = Arc::new(Mutex::new(Ledger::default()));
        let backend = MockBackend {
            ledger: Arc::clone(&ledger),
        };
        (
            PlaybackController::new(Box::new(backend), Arc::new(MockFetcher)),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_second_play_releases_first() {
        let (mut player, ledger) = controller();
        player.play(AudioSource::url("https://a")).await.unwrap();
        player.play(AudioSource::url("https://b")).await.unwrap();

        assert_eq!(ledger.lock().live, 1);
        assert_eq!(ledger.lock().opened, 2);
        assert_eq!(player.current_key(), Some("https://b"));
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_toggle_pauses_and_resumes() {
        let (mut player, ledger) = controller();
        let source = AudioSource::url("https://a");

        player.toggle(source.clone()).await.unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        player.toggle(source.clone()).await.unwrap();
        assert_eq!(player.state(), PlaybackState::Paused);
        player.toggle(source).await.unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(ledger.lock().opened, 1);
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let (mut player, ledger) = controller();
        let events = player.subscribe();
        player.play(AudioSource::url("https://a")).await.unwrap();

        player.stop();
        player.stop();

        assert_eq!(ledger.lock().live, 0);
        assert_eq!(player.position(), Duration::ZERO);
        let stops = events
            .try_iter()
            .filter(|e| matches!(e, PlaybackEvent::Stopped { .. }))
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_and_stops() {
        let (mut player, ledger) = controller();
        player.play(AudioSource::url("https://a")).await.unwrap();

        let err = player
            .play(AudioSource::url("https://missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SoundtrailError::PlaybackError(_)));
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.last_error(), Some(&err));
        assert_eq!(ledger.lock().live, 0);
    }

    #[tokio::test]
    async fn test_decode_failure_reports() {
        let (mut player, _) = controller();
        let err = player
            .play(AudioSource::memory("preview", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SoundtrailError::PlaybackError(_)));
        assert_eq!(player.current_key(), None);
    }

    #[tokio::test]
    async fn test_natural_end_resets() {
        let (mut player, ledger) = controller();
        player.play(AudioSource::url("https://a")).await.unwrap();
        assert_eq!(player.poll(), None);

        ledger.lock().finished = true;
        assert_eq!(
            player.poll(),
            Some(PlaybackEvent::Ended {
                key: "https://a".into()
            })
        );
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.position(), Duration::ZERO);
        assert_eq!(ledger.lock().live, 0);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::from_secs(0)), "00:00");
        assert_eq!(format_time(Duration::from_secs(75)), "01:15");
    }
}
