use anyhow::{Context, Result};
use soundtrail::capture::CapturedAudio;
use soundtrail::catalog::{RecordingCatalog, RecordingEntity};
use soundtrail::geo::{offset, Coordinate, Position};
use soundtrail::integration::{AppConfig, ListeningSession};
use soundtrail::location::{LocationEvent, ScriptedSensor};
use soundtrail::playback::{format_time, AudioBackend, AudioFetcher, PlaybackController};
use soundtrail::store::{BlobStorage, MemoryStore, RecordingStore};
use soundtrail::submission::{Category, SubmissionMetadata, SubmissionWorkflow};
use std::collections::HashSet;
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_ORIGIN: Coordinate = Coordinate {
    latitude: 57.7056,
    longitude: 11.9400,
};
const STEP_INTERVAL: Duration = Duration::from_millis(400);
const DEMO_RECORDING: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soundtrail=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Soundtrail");

    let config = AppConfig::load().context("Failed to load configuration")?;
    let memory = MemoryStore::new();
    let (records, fetcher) = collaborators(&config, &memory).await?;

    let catalog = RecordingCatalog::new();
    catalog
        .refresh(records.as_ref())
        .await
        .context("Failed to load recordings")?;

    let player = PlaybackController::new(audio_backend(), fetcher);
    let sensor = Arc::new(demo_walk());
    let mut session = ListeningSession::new(&config, sensor, catalog, player)?;

    walk(&mut session).await?;

    if !config.services.is_remote() {
        submit_demo_recording(&config, &memory, session.source().position()).await?;
    }

    info!("Done");
    Ok(())
}

/// Replay the walk, logging what comes into range and playing what can be
/// played
async fn walk(session: &mut ListeningSession) -> Result<()> {
    let events = session.subscribe();
    session.start()?;

    let mut loaded: HashSet<String> = HashSet::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        ticker.tick().await;

        let mut moved = false;
        let mut finished = false;
        for event in events.try_iter() {
            match event {
                LocationEvent::PositionChanged(position) => {
                    info!("At {}", position.coordinate);
                    moved = true;
                }
                LocationEvent::Error(e) => warn!("Location: {}", e),
                LocationEvent::WatchStopped => finished = true,
                LocationEvent::WatchStarted => {}
            }
        }

        if moved {
            session.update();
            report_changes(session, &mut loaded);
            autoplay(session).await;
        }

        if let Some(event) = session.poll() {
            info!("Playback: {:?}", event);
        }
        if moved && session.player().is_playing() {
            info!(
                "Playing {} / {}",
                format_time(session.player().position()),
                format_time(session.player().duration().unwrap_or_default())
            );
        }

        if finished {
            break;
        }
    }

    session.stop();
    Ok(())
}

fn report_changes(session: &ListeningSession, loaded: &mut HashSet<String>) {
    let nearby = session.nearby();
    let current: HashSet<String> = nearby.iter().map(|n| n.entity.id.clone()).collect();

    for n in nearby.iter().filter(|n| !loaded.contains(&n.entity.id)) {
        info!(
            "Loaded \"{}\" at {:.0} m{}",
            n.entity.display_title(),
            n.distance_m,
            if n.interactable { ", in range" } else { "" }
        );
    }
    for id in loaded.difference(&current) {
        info!("Unloaded {}", id);
    }
    *loaded = current;
}

async fn autoplay(session: &mut ListeningSession) {
    if session.playing_id().is_some() {
        return;
    }
    let Some(target) = session.nearby().into_iter().find(|n| n.interactable) else {
        return;
    };
    match session.toggle_recording(&target.entity.id).await {
        Ok(state) => info!("{} \"{}\"", state, target.entity.display_title()),
        Err(e) => warn!("{}", e.user_message()),
    }
}

type Collaborators = (Arc<dyn RecordingStore>, Arc<dyn AudioFetcher>);

/// REST collaborators when configured, otherwise a seeded in-memory store
async fn collaborators(config: &AppConfig, memory: &MemoryStore) -> Result<Collaborators> {
    #[cfg(feature = "http")]
    if config.services.is_remote() {
        use soundtrail::playback::HttpAudioFetcher;
        use soundtrail::store::RestRecordingStore;

        info!("Using remote recordings");
        let records: Arc<dyn RecordingStore> = Arc::new(RestRecordingStore::new(&config.services)?);
        let fetcher: Arc<dyn AudioFetcher> = Arc::new(HttpAudioFetcher::new()?);
        return Ok((records, fetcher));
    }
    #[cfg(not(feature = "http"))]
    if config.services.is_remote() {
        warn!("Built without the http feature, ignoring services.data_url");
    }

    seed_demo_recordings(memory).await?;
    let records: Arc<dyn RecordingStore> = Arc::new(memory.clone());
    let fetcher: Arc<dyn AudioFetcher> = Arc::new(memory.clone());
    Ok((records, fetcher))
}

async fn seed_demo_recordings(store: &MemoryStore) -> Result<()> {
    let places = [
        ("harbour", "Harbour bells", 0.0, 0.0, 440.0),
        ("market", "Market voices", 0.0, 60.0, 523.0),
        ("park", "Park birds", 90.0, 150.0, 660.0),
    ];

    for (id, title, bearing, meters, frequency) in places {
        let audio = tone(frequency, 3.0)?;
        let blob = store.upload(audio.bytes, &format!("{}.wav", id)).await?;
        let entity = RecordingEntity::new(id, offset(DEMO_ORIGIN, bearing, meters), blob.url)
            .with_title(title)
            .with_themes(["demo"]);
        store.seed(entity, true);
    }
    Ok(())
}

/// South to north through the demo area in 10 m steps
fn demo_walk() -> ScriptedSensor {
    let points: Vec<Coordinate> = (-8..=14)
        .map(|step| offset(DEMO_ORIGIN, 0.0, step as f64 * 10.0))
        .collect();
    ScriptedSensor::walk(&points, STEP_INTERVAL, chrono::Utc::now().timestamp_millis())
}

fn audio_backend() -> Box<dyn AudioBackend> {
    #[cfg(feature = "audio-io")]
    match soundtrail::playback::RodioBackend::new() {
        Ok(backend) => return Box::new(backend),
        Err(e) => warn!("{}, playing silently", e),
    }
    Box::new(soundtrail::playback::SilentBackend::new())
}

/// A few seconds from the microphone, or a tone when there is none
async fn demo_clip(config: &AppConfig) -> Result<CapturedAudio> {
    #[cfg(feature = "audio-io")]
    match record_microphone(config).await {
        Ok(audio) => return Ok(audio),
        Err(e) => warn!("{}, submitting a tone instead", e.user_message()),
    }
    #[cfg(not(feature = "audio-io"))]
    let _ = config;
    tone(330.0, 2.0)
}

#[cfg(feature = "audio-io")]
async fn record_microphone(config: &AppConfig) -> soundtrail::Result<CapturedAudio> {
    use soundtrail::capture::{CaptureSession, CpalMicrophone};

    let microphone = CpalMicrophone::new()?;
    let mut capture = CaptureSession::new(Box::new(microphone), config.capture);
    capture.start()?;
    info!("Recording for {}s", DEMO_RECORDING.as_secs());
    let audio = capture.record(tokio::time::sleep(DEMO_RECORDING)).await?;
    Ok(audio.clone())
}

fn tone(frequency: f32, seconds: f32) -> Result<CapturedAudio> {
    let sample_rate = 22_050;
    let samples: Vec<f32> = (0..(sample_rate as f32 * seconds) as usize)
        .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin() * 0.3)
        .collect();
    Ok(CapturedAudio::from_samples(&samples, sample_rate, 1)?)
}

async fn submit_demo_recording(
    config: &AppConfig,
    store: &MemoryStore,
    position: Option<Position>,
) -> Result<()> {
    let workflow = SubmissionWorkflow::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        config.services.username.clone(),
    );
    let metadata = SubmissionMetadata::new("End of the walk", position.map(|p| p.coordinate))
        .with_category(Category::Nature);

    let row = workflow.submit(&demo_clip(config).await?, &metadata).await?;
    info!(
        "Submitted \"{}\" ({}), awaiting moderation",
        row.fields.title.as_deref().unwrap_or_default(),
        row.fields.description.as_deref().unwrap_or_default()
    );
    Ok(())
}
