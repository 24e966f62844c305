use log::debug;

use crate::config::StrategyConfig;
use crate::pit_stop::{PitStopAnalysis, PitStopCalculator};
use crate::telemetry::{TelemetryHistory, TelemetrySnapshot};

use super::{DerivedState, RaceAnalysis, RecommendationSynthesizer, StrategicRecommendation, recompute};

/// Owns the telemetry history and the latest derived state. Every call that
/// ingests telemetry takes `&mut self`, so there is a single writer; share an
/// engine across threads behind a `Mutex`.
pub struct StrategyEngine {
    config: StrategyConfig,
    history: TelemetryHistory,
    state: DerivedState,
    pit_calculator: PitStopCalculator,
    synthesizer: RecommendationSynthesizer,
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            pit_calculator: PitStopCalculator::new(&config),
            synthesizer: RecommendationSynthesizer::with_policy(&config.policy),
            history: TelemetryHistory::new(),
            state: DerivedState::default(),
            config,
        }
    }

    /// Appends a snapshot and refreshes the derived state.
    pub fn add_snapshot(&mut self, snapshot: TelemetrySnapshot) {
        self.history.append(snapshot);
        self.state = recompute(&self.history, &self.state, &self.config);
    }

    /// Ingests the snapshot, then builds a recommendation including the
    /// detailed pit-stop view.
    pub fn generate_recommendation(
        &mut self,
        snapshot: TelemetrySnapshot,
    ) -> StrategicRecommendation {
        self.add_snapshot(snapshot);

        let Some(current) = self.history.latest() else {
            return self.synthesizer.synthesize(
                &TelemetrySnapshot::default(),
                &self.history,
                &self.state,
                None,
            );
        };

        let pit_stop = self
            .pit_calculator
            .calculate_pit_stop_timing(current, &self.state.race);
        let recommendation =
            self.synthesizer
                .synthesize(current, &self.history, &self.state, Some(pit_stop));

        debug!(
            "Lap {}: {:?}, confidence {:.2}, risk {}",
            current.player.current_lap,
            recommendation.primary_strategy,
            recommendation.confidence_level,
            recommendation.risk_assessment
        );
        recommendation
    }

    /// Pit-stop timing for a snapshot without adding it to the history. The
    /// calculator's own trackers still advance.
    pub fn calculate_pit_stop_timing(
        &mut self,
        snapshot: &TelemetrySnapshot,
        race_context: &RaceAnalysis,
    ) -> PitStopAnalysis {
        self.pit_calculator
            .calculate_pit_stop_timing(snapshot, race_context)
    }

    pub fn state(&self) -> &DerivedState {
        &self.state
    }

    pub fn history(&self) -> &TelemetryHistory {
        &self.history
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{OpponentState, TireWear};
    use proptest::prelude::*;

    fn lap(current_lap: u32) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.timestamp_ms = current_lap as u128 * 90_000;
        snapshot.session.track_name = "Spa".to_string();
        snapshot.session.total_laps = 30;
        snapshot.player.position = 6;
        snapshot.player.current_lap = current_lap;
        snapshot.player.last_lap_time_s = 138. + (current_lap % 3) as f32 * 0.2;
        snapshot.player.best_lap_time_s = 137.9;
        snapshot.player.fuel_level_l = 100. - current_lap as f32 * 3.;
        snapshot.player.fuel_per_lap_l = 3.;
        snapshot.player.tire_wear = TireWear::uniform(current_lap as f32 * 2.5);
        snapshot
    }

    #[test]
    fn test_add_snapshot_updates_state() {
        let mut engine = StrategyEngine::default();
        for current_lap in 1..=5 {
            engine.add_snapshot(lap(current_lap));
        }
        assert_eq!(engine.history().len(), 5);
        assert!(engine.state().lap.average_lap_time_s > 138.);
        assert!((engine.state().fuel.average_consumption_l - 3.).abs() < 1e-3);
    }

    #[test]
    fn test_recommendation_carries_pit_analysis() {
        let mut engine = StrategyEngine::default();
        let mut recommendation = engine.generate_recommendation(lap(1));
        for current_lap in 2..=20 {
            recommendation = engine.generate_recommendation(lap(current_lap));
        }

        assert_eq!(recommendation.timestamp_ms, 20 * 90_000);
        let Some(pit_stop) = &recommendation.pit_stop else {
            panic!("expected a pit stop analysis");
        };
        assert_eq!(pit_stop.track_name, "Spa-Francorchamps");
        // 50% worn after 20 laps
        assert!(pit_stop.primary.should_pit);
        assert_eq!(recommendation.race_analysis, engine.state().race);
        assert!((0.1..=1.).contains(&recommendation.confidence_level));
    }

    #[test]
    fn test_direct_pit_calculation_leaves_history_alone() {
        let mut engine = StrategyEngine::default();
        engine.add_snapshot(lap(1));
        let race = engine.state().race.clone();
        let analysis = engine.calculate_pit_stop_timing(&lap(2), &race);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(analysis.current_position.laps_remaining, 28);
    }

    #[test]
    fn test_lap_counter_limit_with_close_leader() {
        let mut engine = StrategyEngine::default();
        let mut snapshot = lap(20);
        snapshot.player.current_lap = u32::MAX;
        snapshot.opponents.push(OpponentState {
            car_index: 3,
            position: 5,
            current_lap: u32::MAX,
            gap_to_player_s: -2.,
            ..Default::default()
        });
        engine.add_snapshot(snapshot.clone());
        let recommendation = engine.generate_recommendation(snapshot);
        assert!(recommendation.pit_stop.is_some());
    }

    #[test]
    fn test_tiny_lap_time_in_timed_session() {
        let mut engine = StrategyEngine::default();
        let mut snapshot = lap(30);
        snapshot.session.total_laps = 0;
        snapshot.session.session_length_s = 3600.;
        snapshot.session.time_remaining_s = 1000.;
        snapshot.player.last_lap_time_s = 1e-7;

        let recommendation = engine.generate_recommendation(snapshot);
        let Some(pit_stop) = recommendation.pit_stop else {
            panic!("expected a pit stop analysis");
        };
        assert_eq!(pit_stop.current_position.laps_remaining, u32::MAX);
        assert!(pit_stop
            .optimal_windows
            .iter()
            .all(|window| window.start_lap <= window.end_lap));
    }

    #[test]
    fn test_degenerate_policy_from_config_file() {
        let config: StrategyConfig = serde_json::from_str(
            r#"{"policy": {
                "fuel": {"smoothing_min_samples": 1},
                "tire": {"sample_count": 0, "min_samples": 0},
                "lap": {"trend_window": 0, "min_samples": 0}
            }}"#,
        )
        .unwrap();
        let mut engine = StrategyEngine::new(config);

        let mut first = lap(1);
        first.player.fuel_level_l = 50.;
        let mut second = lap(2);
        second.player.fuel_level_l = 47.;
        engine.add_snapshot(first);
        let recommendation = engine.generate_recommendation(second);

        assert!((engine.state().fuel.average_consumption_l - 3.).abs() < 1e-3);
        assert!((0.1..=1.).contains(&recommendation.confidence_level));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_extreme_telemetry_does_not_panic(
            current_lap in prop_oneof![Just(u32::MAX), Just(u32::MAX - 1), 0u32..100],
            position in prop_oneof![Just(u32::MAX), 0u32..30],
            last_lap_time in prop_oneof![Just(1e-7f32), Just(0f32), 60f32..200f32],
            total_laps in prop_oneof![Just(0u32), 1u32..60],
            time_remaining in 0f32..3600f32,
        ) {
            let mut engine = StrategyEngine::default();
            for offset in 0..3u32 {
                let mut snapshot = lap(1 + offset);
                snapshot.session.total_laps = total_laps;
                snapshot.session.session_length_s = 3600.;
                snapshot.session.time_remaining_s = time_remaining;
                snapshot.player.current_lap = current_lap.saturating_add(offset);
                snapshot.player.position = position;
                snapshot.player.last_lap_time_s = last_lap_time;
                snapshot.opponents.push(OpponentState {
                    car_index: 1,
                    position: position.saturating_sub(1),
                    current_lap: current_lap.saturating_add(offset),
                    gap_to_player_s: -2.,
                    ..Default::default()
                });
                let recommendation = engine.generate_recommendation(snapshot);
                prop_assert!((0.1..=1.).contains(&recommendation.confidence_level));
            }
        }
    }
}
