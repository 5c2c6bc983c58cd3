//! Sensors that replay prepared readings instead of asking hardware

use super::{LocationError, LocationOptions, LocationSensor, SensorReading};
use crate::geo::{Coordinate, Position};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One reading of a scripted track, delivered after `delay`
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub delay: Duration,
    pub reading: SensorReading,
}

impl ScriptStep {
    pub fn position(position: Position, delay: Duration) -> Self {
        Self {
            delay,
            reading: Ok(position),
        }
    }

    pub fn error(error: LocationError, delay: Duration) -> Self {
        Self {
            delay,
            reading: Err(error),
        }
    }
}

/// Replays a fixed track.
///
/// A watch delivers every step in order and then closes the feed. Single-shot
/// reads walk the same track one step per call and keep answering the last
/// step once the track is exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    steps: Arc<Vec<ScriptStep>>,
    cursor: Arc<AtomicUsize>,
}

impl ScriptedSensor {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Arc::new(steps),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A walk through `points`, one fix every `interval`, timestamps starting
    /// at `start_ms`
    pub fn walk(points: &[Coordinate], interval: Duration, start_ms: i64) -> Self {
        let step_ms = interval.as_millis() as i64;
        let steps = points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let position = Position::new(*point, 5.0, start_ms + i as i64 * step_ms);
                ScriptStep::position(position, interval)
            })
            .collect();
        Self::new(steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[async_trait]
impl LocationSensor for ScriptedSensor {
    async fn current_position(&self, _options: &LocationOptions) -> SensorReading {
        if self.steps.is_empty() {
            return Err(LocationError::PositionUnavailable);
        }
        let index = self
            .cursor
            .fetch_add(1, Ordering::SeqCst)
            .min(self.steps.len() - 1);
        let step = &self.steps[index];
        tokio::time::sleep(step.delay).await;
        step.reading
    }

    fn watch_position(
        &self,
        _options: &LocationOptions,
    ) -> std::result::Result<Receiver<SensorReading>, LocationError> {
        let (tx, rx) = unbounded();
        let steps = Arc::clone(&self.steps);
        std::thread::spawn(move || {
            for step in steps.iter() {
                std::thread::sleep(step.delay);
                if tx.send(step.reading).is_err() {
                    debug!("Scripted watch cancelled");
                    return;
                }
            }
        });
        Ok(rx)
    }
}

#[derive(Debug, Default)]
struct ManualState {
    watcher: Option<Sender<SensorReading>>,
    once: VecDeque<SensorReading>,
    watch_count: usize,
    deny_watch: Option<LocationError>,
}

/// A sensor driven by hand, one reading at a time.
///
/// Single-shot reads answer queued readings and otherwise never resolve, so
/// the caller's timeout decides.
#[derive(Debug, Clone, Default)]
pub struct ManualSensor {
    state: Arc<Mutex<ManualState>>,
}

impl ManualSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a reading to the active watch. Returns false when nobody is
    /// subscribed.
    pub fn push(&self, reading: SensorReading) -> bool {
        let mut state = self.state.lock();
        let delivered = state
            .watcher
            .as_ref()
            .is_some_and(|tx| tx.send(reading).is_ok());
        if !delivered {
            state.watcher = None;
        }
        delivered
    }

    /// Queue the answer for the next single-shot read
    pub fn queue_once(&self, reading: SensorReading) {
        self.state.lock().once.push_back(reading);
    }

    /// Make the next watch request fail
    pub fn deny_watch(&self, error: LocationError) {
        self.state.lock().deny_watch = Some(error);
    }

    /// How many watches were opened
    pub fn watch_count(&self) -> usize {
        self.state.lock().watch_count
    }
}

#[async_trait]
impl LocationSensor for ManualSensor {
    async fn current_position(&self, _options: &LocationOptions) -> SensorReading {
        let queued = self.state.lock().once.pop_front();
        match queued {
            Some(reading) => reading,
            None => std::future::pending::<SensorReading>().await,
        }
    }

    fn watch_position(
        &self,
        _options: &LocationOptions,
    ) -> std::result::Result<Receiver<SensorReading>, LocationError> {
        let mut state = self.state.lock();
        if let Some(error) = state.deny_watch.take() {
            return Err(error);
        }
        let (tx, rx) = unbounded();
        state.watcher = Some(tx);
        state.watch_count += 1;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LocationOptions {
        crate::location::LocationConfig::default().once_options()
    }

    #[tokio::test]
    async fn test_single_shot_walks_track() {
        let points = [Coordinate::new(1.0, 1.0), Coordinate::new(2.0, 2.0)];
        let sensor = ScriptedSensor::walk(&points, Duration::ZERO, 1_000);

        let first = sensor.current_position(&options()).await.unwrap();
        let second = sensor.current_position(&options()).await.unwrap();
        let third = sensor.current_position(&options()).await.unwrap();

        assert_eq!(first.coordinate, points[0]);
        assert_eq!(second.coordinate, points[1]);
        assert_eq!(third, second);
    }

    #[test]
    fn test_watch_delivers_then_closes() {
        let steps = vec![
            ScriptStep::position(Position::new(Coordinate::new(1.0, 1.0), 3.0, 1), Duration::ZERO),
            ScriptStep::error(LocationError::PositionUnavailable, Duration::ZERO),
        ];
        let sensor = ScriptedSensor::new(steps);
        let rx = sensor.watch_position(&options()).unwrap();

        let readings: Vec<_> = rx.iter().collect();
        assert_eq!(readings.len(), 2);
        assert!(readings[0].is_ok());
        assert_eq!(readings[1], Err(LocationError::PositionUnavailable));
    }

    #[test]
    fn test_manual_push_without_watch() {
        let sensor = ManualSensor::new();
        assert!(!sensor.push(Err(LocationError::Timeout)));
    }
}
