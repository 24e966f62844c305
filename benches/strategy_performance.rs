use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pitlane::config::StrategyConfig;
use pitlane::pit_stop::PitStopCalculator;
use pitlane::strategy::{DerivedState, RaceAnalysis, StrategyEngine, recompute};
use pitlane::telemetry::{HISTORY_CAPACITY, OpponentState, TelemetryHistory, TelemetrySnapshot, TireWear};
use std::time::Duration;

fn create_sample_snapshot(point_no: usize) -> TelemetrySnapshot {
    let lap = (point_no / 10) as u32 + 1;
    let mut snapshot = TelemetrySnapshot::default();
    snapshot.timestamp_ms = (point_no * 16) as u128;
    snapshot.session.track_name = "Spa-Francorchamps".to_string();
    snapshot.session.total_laps = 60;
    snapshot.player.position = 8;
    snapshot.player.current_lap = lap;
    snapshot.player.last_lap_time_s = 138.5 + (point_no % 7) as f32 * 0.1;
    snapshot.player.best_lap_time_s = 138.1;
    snapshot.player.fuel_level_l = (110. - point_no as f32 * 0.3).max(0.);
    snapshot.player.fuel_per_lap_l = 3.;
    snapshot.player.tire_wear = TireWear::uniform((lap as f32 * 1.2).min(100.));
    snapshot.player.lap_distance_pct = (point_no % 10) as f32 / 10.;
    snapshot.opponents = (0..19)
        .map(|i| OpponentState {
            car_index: i,
            driver_name: format!("Driver {}", i),
            position: i + 1,
            current_lap: lap,
            gap_to_player_s: i as f32 * 2. - 14.,
            last_lap_time_s: 138.8,
            ..Default::default()
        })
        .collect();
    snapshot
}

fn bench_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute");
    let config = StrategyConfig::default();

    for size in [10, 100, HISTORY_CAPACITY] {
        let mut history = TelemetryHistory::new();
        for point_no in 0..size {
            history.append(create_sample_snapshot(point_no));
        }
        let previous = DerivedState::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| black_box(recompute(history, &previous, &config)));
        });
    }

    group.finish();
}

fn bench_pit_stop_timing(c: &mut Criterion) {
    let mut calculator = PitStopCalculator::default();
    let snapshot = create_sample_snapshot(250);
    let race = RaceAnalysis::default();

    c.bench_function("calculate_pit_stop_timing", |b| {
        b.iter(|| black_box(calculator.calculate_pit_stop_timing(&snapshot, &race)));
    });
}

fn bench_generate_recommendation(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.measurement_time(Duration::from_secs(10));

    let mut engine = StrategyEngine::default();
    for point_no in 0..HISTORY_CAPACITY {
        engine.add_snapshot(create_sample_snapshot(point_no));
    }
    let mut point_no = HISTORY_CAPACITY;

    group.bench_function("generate_recommendation_full_history", |b| {
        b.iter(|| {
            point_no += 1;
            black_box(engine.generate_recommendation(create_sample_snapshot(point_no)))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_recompute,
    bench_pit_stop_timing,
    bench_generate_recommendation
);
criterion_main!(benches);
