use super::{LocationConfig, LocationError, LocationOptions, LocationSensor, SensorReading};
use crate::geo::Position;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// What a consumer sees of the position source at a given instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationSnapshot {
    /// Latest accepted reading
    pub position: Option<Position>,
    /// Last failure, cleared by the next accepted reading
    pub error: Option<LocationError>,
    /// A single-shot read is in flight
    pub is_loading: bool,
    pub is_watching: bool,
}

/// Notifications for subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A newer reading replaced the current position
    PositionChanged(Position),
    /// The sensor reported a failure
    Error(LocationError),
    WatchStarted,
    WatchStopped,
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: LocationSnapshot,
    /// Bumped on every watch start/stop; stale watch threads compare against it
    watch_generation: u64,
    pending_reads: usize,
    subscribers: Vec<Sender<LocationEvent>>,
}

impl Shared {
    fn emit(&mut self, event: LocationEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Store `position` unless a newer reading is already in place
    fn accept(&mut self, position: Position) -> bool {
        if let Some(current) = self.snapshot.position {
            if position.timestamp < current.timestamp {
                debug!(
                    "Ignoring stale reading from {} (have {})",
                    position.timestamp, current.timestamp
                );
                return false;
            }
        }
        self.snapshot.position = Some(position);
        self.snapshot.error = None;
        self.emit(LocationEvent::PositionChanged(position));
        true
    }

    fn record_error(&mut self, error: LocationError) {
        self.snapshot.error = Some(error);
        self.emit(LocationEvent::Error(error));
    }

    fn end_watch(&mut self) {
        self.watch_generation += 1;
        if self.snapshot.is_watching {
            self.snapshot.is_watching = false;
            self.emit(LocationEvent::WatchStopped);
        }
    }
}

/// Marks a single-shot read as in flight until dropped, including when the
/// caller abandons the read
struct PendingRead {
    shared: Arc<Mutex<Shared>>,
}

impl PendingRead {
    fn begin(shared: &Arc<Mutex<Shared>>) -> Self {
        let mut guard = shared.lock();
        guard.pending_reads += 1;
        guard.snapshot.is_loading = true;
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl Drop for PendingRead {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.pending_reads = shared.pending_reads.saturating_sub(1);
        shared.snapshot.is_loading = shared.pending_reads > 0;
    }
}

struct WatchHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Current-position holder over a location sensor.
///
/// At most one watch runs at a time. Once [`PositionSource::stop_watching`]
/// returns, the sensor subscription has been dropped and no further reading
/// from it is applied.
pub struct PositionSource {
    sensor: Arc<dyn LocationSensor>,
    config: LocationConfig,
    shared: Arc<Mutex<Shared>>,
    watch: Option<WatchHandle>,
}

impl PositionSource {
    pub fn new(sensor: Arc<dyn LocationSensor>, config: LocationConfig) -> Self {
        Self {
            sensor,
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
            watch: None,
        }
    }

    pub fn snapshot(&self) -> LocationSnapshot {
        self.shared.lock().snapshot
    }

    pub fn position(&self) -> Option<Position> {
        self.shared.lock().snapshot.position
    }

    pub fn is_watching(&self) -> bool {
        self.shared.lock().snapshot.is_watching
    }

    /// Receive every future [`LocationEvent`]
    pub fn subscribe(&self) -> Receiver<LocationEvent> {
        let (tx, rx) = unbounded();
        self.shared.lock().subscribers.push(tx);
        rx
    }

    /// Offer a reading obtained elsewhere; applied only if not older than the
    /// current one
    pub fn accept(&self, position: Position) -> bool {
        self.shared.lock().accept(position)
    }

    /// Resolve one fix.
    ///
    /// Concurrent calls resolve independently. A reading older than the
    /// stored position is returned to the caller but not stored.
    pub async fn get_once(&self) -> SensorReading {
        let options = self.config.once_options();
        let pending = PendingRead::begin(&self.shared);

        let reading = match tokio::time::timeout(
            options.timeout,
            self.sensor.current_position(&options),
        )
        .await
        {
            Ok(reading) => reading,
            Err(_) => Err(LocationError::Timeout),
        };
        drop(pending);

        let mut shared = self.shared.lock();
        match reading {
            Ok(position) => {
                shared.accept(position);
            }
            Err(e) => {
                warn!("Single-shot location read failed: {}", e);
                shared.record_error(e);
            }
        }
        reading
    }

    /// Start continuous updates. Calling it while already watching does
    /// nothing.
    pub fn watch(&mut self) -> std::result::Result<(), LocationError> {
        if self.watch.is_some() && self.is_watching() {
            debug!("Already watching position");
            return Ok(());
        }
        // A watch that ended on its own still has a finished thread to reap
        self.reap_watch();

        let options = self.config.watch_options();
        let readings = match self.sensor.watch_position(&options) {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Failed to start position watch: {}", e);
                self.shared.lock().record_error(e);
                return Err(e);
            }
        };

        let generation = {
            let mut shared = self.shared.lock();
            shared.watch_generation += 1;
            shared.snapshot.is_watching = true;
            shared.snapshot.error = None;
            shared.emit(LocationEvent::WatchStarted);
            shared.watch_generation
        };

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let shared = Arc::clone(&self.shared);
        let thread = thread::spawn(move || {
            run_watch(readings, stop_rx, shared, generation, options);
        });

        self.watch = Some(WatchHandle { stop_tx, thread });
        info!("Started watching position");
        Ok(())
    }

    /// Cancel the watch. Safe to call when not watching.
    pub fn stop_watching(&mut self) {
        let Some(handle) = self.watch.take() else {
            return;
        };

        self.shared.lock().end_watch();
        drop(handle.stop_tx);
        if handle.thread.join().is_err() {
            warn!("Position watch thread panicked");
        }
        info!("Stopped watching position");
    }

    fn reap_watch(&mut self) {
        if let Some(handle) = self.watch.take() {
            drop(handle.stop_tx);
            let _ = handle.thread.join();
        }
    }
}

impl Drop for PositionSource {
    fn drop(&mut self) {
        self.stop_watching();
    }
}

fn run_watch(
    readings: Receiver<SensorReading>,
    stop_rx: Receiver<()>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    options: LocationOptions,
) {
    loop {
        let outcome = select! {
            recv(stop_rx) -> _ => return,
            recv(readings) -> msg => match msg {
                Ok(reading) => Some(reading),
                Err(_) => None,
            },
            default(options.timeout) => Some(Err(LocationError::Timeout)),
        };

        let mut guard = shared.lock();
        if guard.watch_generation != generation {
            return;
        }

        match outcome {
            Some(Ok(position)) => {
                guard.accept(position);
            }
            Some(Err(e)) => {
                warn!("Position watch reported: {}", e);
                guard.record_error(e);
                if e.is_fatal() {
                    guard.end_watch();
                    return;
                }
            }
            None => {
                debug!("Location sensor closed the watch feed");
                guard.end_watch();
                return;
            }
        }
    }
}
