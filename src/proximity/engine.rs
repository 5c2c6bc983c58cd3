use super::ProximityConfig;
use crate::catalog::RecordingEntity;
use crate::geo::{distance, Position};
use crate::Result;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Per-recording result of one engine update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityState {
    /// Meters to the observer, infinite without a position
    pub distance_m: f64,
    pub loaded: bool,
    pub interactable: bool,
}

impl ProximityState {
    /// State of anything that cannot be reached
    pub const UNREACHABLE: ProximityState = ProximityState {
        distance_m: f64::INFINITY,
        loaded: false,
        interactable: false,
    };
}

/// Proximity states keyed by recording id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityMap {
    states: HashMap<String, ProximityState>,
}

impl ProximityMap {
    pub fn get(&self, id: &str) -> Option<&ProximityState> {
        self.states.get(id)
    }

    /// State for `id`, unreachable when the id was not part of the update
    pub fn state(&self, id: &str) -> ProximityState {
        self.states
            .get(id)
            .copied()
            .unwrap_or(ProximityState::UNREACHABLE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProximityState)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A loaded recording with its distance, as listed to the user
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyRecording {
    pub entity: RecordingEntity,
    pub distance_m: f64,
    pub interactable: bool,
}

/// Hysteretic load/unload tracking for a moving observer
#[derive(Debug, Clone)]
pub struct ProximityEngine {
    config: ProximityConfig,
    loaded_ids: HashSet<String>,
}

impl Default for ProximityEngine {
    fn default() -> Self {
        Self {
            config: ProximityConfig::default(),
            loaded_ids: HashSet::new(),
        }
    }
}

impl ProximityEngine {
    pub fn new(config: ProximityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            loaded_ids: HashSet::new(),
        })
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded_ids.contains(id)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded_ids.len()
    }

    /// Recompute proximity for every entity against the observer.
    ///
    /// Without an observer (or with a non-finite one) nothing is loaded or
    /// interactable. Ids that are not in `entities` are dropped from the
    /// loaded set, and entities with non-finite coordinates are left out of
    /// the result.
    pub fn update(
        &mut self,
        observer: Option<&Position>,
        entities: &[RecordingEntity],
    ) -> ProximityMap {
        let mut states = HashMap::with_capacity(entities.len());

        let observer = match observer {
            Some(pos) if pos.coordinate.is_finite() => pos,
            _ => {
                if !self.loaded_ids.is_empty() {
                    debug!("No observer, unloading {} recordings", self.loaded_ids.len());
                    self.loaded_ids.clear();
                }
                for entity in entities.iter().filter(|e| e.coordinate.is_finite()) {
                    states.insert(entity.id.clone(), ProximityState::UNREACHABLE);
                }
                return ProximityMap { states };
            }
        };

        let mut still_present = HashSet::with_capacity(self.loaded_ids.len());

        for entity in entities {
            if !entity.coordinate.is_finite() {
                continue;
            }

            let d = distance(observer.coordinate, entity.coordinate);
            let was_loaded = self.loaded_ids.contains(&entity.id);

            let loaded = if was_loaded {
                d <= self.config.unload_distance_m
            } else {
                d <= self.config.load_distance_m
            };

            if loaded != was_loaded {
                debug!(
                    "Recording {} {} at {:.1} m",
                    entity.id,
                    if loaded { "loaded" } else { "unloaded" },
                    d
                );
            }
            if loaded {
                still_present.insert(entity.id.clone());
            }

            states.insert(
                entity.id.clone(),
                ProximityState {
                    distance_m: d,
                    loaded,
                    interactable: d <= self.config.interaction_distance_m,
                },
            );
        }

        self.loaded_ids = still_present;
        ProximityMap { states }
    }

    /// Loaded recordings ordered nearest first
    pub fn nearby(&self, states: &ProximityMap, entities: &[RecordingEntity]) -> Vec<NearbyRecording> {
        let mut nearby: Vec<NearbyRecording> = entities
            .iter()
            .filter_map(|entity| {
                let state = states.get(&entity.id)?;
                state.loaded.then(|| NearbyRecording {
                    entity: entity.clone(),
                    distance_m: state.distance_m,
                    interactable: state.interactable,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        nearby
    }

    /// Forget every loaded recording
    pub fn reset(&mut self) {
        self.loaded_ids.clear();
    }
}
