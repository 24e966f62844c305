// Replays a JSON Lines recording through the producer, collector and writer,
// the same path the `pitlane replay` command takes.

use std::io::Write;
use std::sync::{Arc, atomic::AtomicBool, mpsc};
use std::thread;

use pitlane::StrategyEngine;
use pitlane::config::StrategyConfig;
use pitlane::strategy::StrategicRecommendation;
use pitlane::telemetry::{
    ReplayTelemetryProducer, TelemetrySnapshot, TireWear, collect_recommendations,
};
use pitlane::writer::write_recommendations;

fn recording(laps: u32) -> Vec<TelemetrySnapshot> {
    (1..=laps)
        .map(|lap| {
            let mut snapshot = TelemetrySnapshot::default();
            snapshot.timestamp_ms = lap as u128 * 120_000;
            snapshot.session.track_name = "Nurburgring".to_string();
            snapshot.session.total_laps = 24;
            snapshot.player.position = 2;
            snapshot.player.current_lap = lap;
            snapshot.player.last_lap_time_s = 114.2;
            snapshot.player.best_lap_time_s = 113.9;
            snapshot.player.fuel_level_l = 90. - lap as f32 * 3.5;
            snapshot.player.fuel_per_lap_l = 3.5;
            snapshot.player.tire_wear = TireWear::uniform(lap as f32 * 3.);
            snapshot
        })
        .collect()
}

fn write_recording(snapshots: &[TelemetrySnapshot]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for snapshot in snapshots {
        writeln!(file, "{}", serde_json::to_string(snapshot).unwrap()).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_replay_file_to_recommendation_file() {
    let input = write_recording(&recording(12));
    let output_dir = tempfile::tempdir().unwrap();
    let output_path = output_dir.path().join("recommendations.jsonl");

    let producer = ReplayTelemetryProducer::from_file(input.path()).unwrap();
    let mut engine = StrategyEngine::default();
    let (sender, receiver) = mpsc::channel();

    let writer_path = output_path.clone();
    let writer = thread::spawn(move || write_recommendations(&writer_path, receiver));
    let processed = collect_recommendations(
        producer,
        &mut engine,
        sender,
        2,
        Arc::new(AtomicBool::new(true)),
    )
    .unwrap();
    let written = writer.join().unwrap().unwrap();

    assert_eq!(processed, 12);
    assert_eq!(written, 6);

    let recommendations: Vec<StrategicRecommendation> = serde_jsonlines::json_lines(&output_path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(recommendations.len(), 6);
    assert_eq!(recommendations[5].timestamp_ms, 12 * 120_000);
    let Some(pit_stop) = &recommendations[5].pit_stop else {
        panic!("expected a pit analysis");
    };
    assert_eq!(pit_stop.track_name, "Nürburgring GP");
}

#[test]
fn test_replay_matches_direct_ingest() {
    let snapshots = recording(10);
    let input = write_recording(&snapshots);

    let mut replayed = StrategyEngine::default();
    let (sender, receiver) = mpsc::channel();
    collect_recommendations(
        ReplayTelemetryProducer::from_file(input.path()).unwrap(),
        &mut replayed,
        sender,
        1,
        Arc::new(AtomicBool::new(true)),
    )
    .unwrap();
    let from_replay: Vec<StrategicRecommendation> = receiver.iter().collect();

    let mut direct = StrategyEngine::default();
    let from_direct: Vec<StrategicRecommendation> = snapshots
        .into_iter()
        .map(|s| direct.generate_recommendation(s))
        .collect();

    assert_eq!(from_replay, from_direct);
}

#[test]
fn test_config_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = StrategyConfig::default();
    config.safety_margin = 1.25;
    config.policy.pit.strategic_wear = 55.;
    config.save_to(&path).unwrap();

    let loaded = StrategyConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut engine = StrategyEngine::new(loaded);
    let mut snapshot = recording(1).remove(0);
    snapshot.player.tire_wear = TireWear::uniform(50.);
    let recommendation = engine.generate_recommendation(snapshot);
    let Some(pit_stop) = recommendation.pit_stop else {
        panic!("expected a pit analysis");
    };
    // 50% is under the raised strategic threshold
    assert!(pit_stop.optimal_windows.is_empty());
}
