use crate::catalog::{RecordingCatalog, RecordingEntity};
use crate::location::{LocationEvent, LocationSensor, PositionSource};
use crate::playback::{AudioSource, PlaybackController, PlaybackEvent, PlaybackState};
use crate::proximity::{NearbyRecording, ProximityEngine, ProximityMap, ProximityState};
use crate::{Result, SoundtrailError};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{debug, info};

use super::AppConfig;

/// Listening side of the app: position feeds proximity, proximity gates
/// playback.
///
/// Call [`ListeningSession::update`] whenever the position or the catalog
/// changes, and [`ListeningSession::poll`] regularly while audio plays.
pub struct ListeningSession {
    source: PositionSource,
    engine: ProximityEngine,
    catalog: RecordingCatalog,
    player: PlaybackController,
    states: ProximityMap,
    /// Recording whose audio the player currently holds
    playing_id: Option<String>,
}

impl ListeningSession {
    pub fn new(
        config: &AppConfig,
        sensor: Arc<dyn LocationSensor>,
        catalog: RecordingCatalog,
        player: PlaybackController,
    ) -> Result<Self> {
        Ok(Self {
            source: PositionSource::new(sensor, config.location),
            engine: ProximityEngine::new(config.proximity)?,
            catalog,
            player,
            states: ProximityMap::default(),
            playing_id: None,
        })
    }

    pub fn source(&self) -> &PositionSource {
        &self.source
    }

    pub fn catalog(&self) -> &RecordingCatalog {
        &self.catalog
    }

    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlaybackController {
        &mut self.player
    }

    pub fn playing_id(&self) -> Option<&str> {
        self.playing_id.as_deref()
    }

    pub fn subscribe(&self) -> Receiver<LocationEvent> {
        self.source.subscribe()
    }

    /// Begin following the user's position
    pub fn start(&mut self) -> Result<()> {
        self.source.watch().map_err(SoundtrailError::from)
    }

    /// Stop following the position and silence playback
    pub fn stop(&mut self) {
        self.source.stop_watching();
        self.player.stop();
        self.playing_id = None;
    }

    /// Resolve one fix without watching
    pub async fn locate_once(&mut self) -> Result<&ProximityMap> {
        self.source.get_once().await.map_err(SoundtrailError::from)?;
        Ok(self.update())
    }

    /// Recompute proximity from the latest position and catalog.
    ///
    /// Playback of a recording that is no longer interactable is stopped.
    pub fn update(&mut self) -> &ProximityMap {
        let position = self.source.position();
        let entities = self.catalog.all();
        self.states = self.engine.update(position.as_ref(), &entities);

        if let Some(id) = self.playing_id.clone() {
            if !self.states.state(&id).interactable {
                info!("Left the range of {}, stopping playback", id);
                self.player.stop();
                self.playing_id = None;
            }
        }
        &self.states
    }

    pub fn states(&self) -> &ProximityMap {
        &self.states
    }

    pub fn state(&self, id: &str) -> ProximityState {
        self.states.state(id)
    }

    /// Loaded recordings nearest first
    pub fn nearby(&self) -> Vec<NearbyRecording> {
        self.engine.nearby(&self.states, &self.catalog.all())
    }

    /// Play, pause or resume a recording.
    ///
    /// Fails with `RangeError` unless the recording is loaded and close
    /// enough to interact with.
    pub async fn toggle_recording(&mut self, id: &str) -> Result<PlaybackState> {
        let entity = self
            .catalog
            .get(id)
            .ok_or_else(|| SoundtrailError::CatalogError(format!("Unknown recording {}", id)))?;

        let state = self.states.state(id);
        if !(state.loaded && state.interactable) {
            debug!("Refusing to play {} at {:.1} m", id, state.distance_m);
            return Err(SoundtrailError::RangeError(format!(
                "Move closer to listen to {}",
                entity.display_title()
            )));
        }

        match self.player.toggle(AudioSource::url(&entity.audio_ref)).await {
            Ok(()) => {
                self.playing_id = Some(entity.id);
                Ok(self.player.state())
            }
            Err(e) => {
                self.playing_id = None;
                Err(e)
            }
        }
    }

    /// Pick up the end of playback
    pub fn poll(&mut self) -> Option<PlaybackEvent> {
        let event = self.player.poll();
        if event.is_some() {
            self.playing_id = None;
        }
        event
    }

    /// Entity behind the audio currently held by the player
    pub fn now_playing(&self) -> Option<RecordingEntity> {
        self.playing_id.as_deref().and_then(|id| self.catalog.get(id))
    }
}
