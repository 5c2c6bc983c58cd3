//! Proximity behaviour of a walking observer against a small catalog

use soundtrail::catalog::RecordingEntity;
use soundtrail::geo::{distance, offset, Coordinate, Position};
use soundtrail::proximity::{ProximityConfig, ProximityEngine, ProximityState};

fn entity_at(id: &str, coordinate: Coordinate) -> RecordingEntity {
    RecordingEntity::new(id, coordinate, format!("https://blob.example/{}.wav", id))
}

fn at(coordinate: Coordinate, ts: i64) -> Position {
    Position::new(coordinate, 5.0, ts)
}

#[test]
fn test_walk_away_through_band() {
    let observer = Coordinate::new(57.7056, 11.9400);
    let target = Coordinate::new(57.7057, 11.9401);
    let entities = vec![entity_at("quay", target)];
    let mut engine = ProximityEngine::default();

    let d = distance(observer, target);
    assert!(d > 10.0 && d < 15.0, "expected about 12 m, got {}", d);

    let first = engine.update(Some(&at(observer, 1)), &entities).state("quay");
    assert!(first.loaded && first.interactable);

    let band = engine
        .update(Some(&at(offset(target, 180.0, 30.0), 2)), &entities)
        .state("quay");
    assert!(band.loaded, "30 m is inside the hysteresis band");
    assert!(band.interactable, "30 m is within interaction distance");

    let gone = engine
        .update(Some(&at(offset(target, 180.0, 45.0), 3)), &entities)
        .state("quay");
    assert!(!gone.loaded);
    assert!(!gone.interactable);
}

#[test]
fn test_approach_loads_only_at_load_distance() {
    let target = Coordinate::new(59.3293, 18.0686);
    let entities = vec![entity_at("square", target)];
    let mut engine = ProximityEngine::default();

    let mut loaded_at = None;
    for (i, meters) in [60.0, 45.0, 35.0, 25.0, 19.0, 10.0].into_iter().enumerate() {
        let states = engine.update(Some(&at(offset(target, 90.0, meters), i as i64)), &entities);
        if states.state("square").loaded && loaded_at.is_none() {
            loaded_at = Some(meters);
        }
    }
    assert_eq!(loaded_at, Some(19.0));
}

#[test]
fn test_jitter_at_edge_does_not_flicker() {
    let target = Coordinate::new(57.7, 11.97);
    let entities = vec![entity_at("bench", target)];
    let mut engine = ProximityEngine::default();

    engine.update(Some(&at(offset(target, 0.0, 15.0), 0)), &entities);
    for (i, meters) in [21.0, 19.5, 25.0, 20.5, 35.0, 22.0].into_iter().enumerate() {
        let states = engine.update(Some(&at(offset(target, 0.0, meters), i as i64 + 1)), &entities);
        assert!(states.state("bench").loaded, "unloaded at {} m", meters);
    }
}

#[test]
fn test_interaction_is_independent_of_history() {
    let target = Coordinate::new(57.7, 11.97);
    let entities = vec![entity_at("bench", target)];
    let config = ProximityConfig::new(20.0, 40.0, 30.0);
    let mut engine = ProximityEngine::new(config).unwrap();

    let states = engine.update(Some(&at(offset(target, 0.0, 25.0), 0)), &entities);
    let state = states.state("bench");
    assert!(!state.loaded, "never came within 20 m");
    assert!(state.interactable, "25 m is within 30 m");
}

#[test]
fn test_lost_position_unloads_everything() {
    let target = Coordinate::new(57.7, 11.97);
    let entities = vec![entity_at("a", target), entity_at("b", offset(target, 0.0, 5.0))];
    let mut engine = ProximityEngine::default();

    engine.update(Some(&at(target, 0)), &entities);
    assert_eq!(engine.loaded_count(), 2);

    let states = engine.update(None, &entities);
    assert_eq!(engine.loaded_count(), 0);
    assert_eq!(states.state("a"), ProximityState::UNREACHABLE);
}

#[test]
fn test_bad_coordinates_are_skipped() {
    let target = Coordinate::new(57.7, 11.97);
    let entities = vec![
        entity_at("ok", target),
        entity_at("broken", Coordinate::new(f64::NAN, 11.97)),
    ];
    let mut engine = ProximityEngine::default();

    let states = engine.update(Some(&at(target, 0)), &entities);
    assert!(states.state("ok").loaded);
    assert!(states.get("broken").is_none());
    assert!(!engine.is_loaded("broken"));
}
