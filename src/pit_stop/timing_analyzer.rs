use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use simple_moving_average::{SMA, SumTreeSMA};

use crate::config::PitPolicy;
use crate::telemetry::TelemetrySnapshot;

/// Laps of pattern history kept, also the race pace averaging window
pub const LAP_PATTERN_WINDOW: usize = 20;
/// A completed lap split into its base time and the estimated cost of tires,
/// fuel load and traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LapTimePattern {
    pub lap: u32,
    pub base_time_s: f32,
    pub tire_delta_s: f32,
    pub fuel_delta_s: f32,
    pub traffic_delta_s: f32,
}

impl LapTimePattern {
    pub fn adjusted_time_s(&self) -> f32 {
        self.base_time_s + self.tire_delta_s + self.fuel_delta_s + self.traffic_delta_s
    }
}

pub struct TimingAnalyzer {
    tire_wear_penalty_s_per_pct: f32,
    fuel_weight_penalty_s_per_l: f32,
    traffic_gap_s: f32,
    traffic_penalty_s: f32,
    patterns: VecDeque<LapTimePattern>,
    race_pace: SumTreeSMA<f32, f32, LAP_PATTERN_WINDOW>,
    last_recorded_lap: Option<u32>,
}

impl Default for TimingAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingAnalyzer {
    pub fn new() -> Self {
        Self::with_policy(&PitPolicy::default())
    }

    pub fn with_policy(policy: &PitPolicy) -> Self {
        Self {
            tire_wear_penalty_s_per_pct: policy.tire_wear_penalty_s_per_pct,
            fuel_weight_penalty_s_per_l: policy.fuel_weight_penalty_s_per_l,
            traffic_gap_s: policy.traffic_gap_s,
            traffic_penalty_s: policy.traffic_penalty_s,
            patterns: VecDeque::with_capacity(LAP_PATTERN_WINDOW),
            race_pace: SumTreeSMA::new(),
            last_recorded_lap: None,
        }
    }

    /// Records the last completed lap once per lap number.
    pub fn update(&mut self, snapshot: &TelemetrySnapshot) {
        let player = &snapshot.player;
        if player.last_lap_time_s <= 0. || self.last_recorded_lap == Some(player.current_lap) {
            return;
        }
        self.last_recorded_lap = Some(player.current_lap);

        let tire_delta_s = player.tire_wear.average() * self.tire_wear_penalty_s_per_pct;
        let fuel_delta_s = player.fuel_level_l.max(0.) * self.fuel_weight_penalty_s_per_l;
        let traffic_delta_s = if player.gap_ahead_s > 0. && player.gap_ahead_s < self.traffic_gap_s {
            self.traffic_penalty_s
        } else {
            0.
        };
        let pattern = LapTimePattern {
            lap: player.current_lap,
            base_time_s: player.last_lap_time_s - tire_delta_s - fuel_delta_s - traffic_delta_s,
            tire_delta_s,
            fuel_delta_s,
            traffic_delta_s,
        };

        if self.patterns.len() >= LAP_PATTERN_WINDOW {
            self.patterns.pop_front();
        }
        self.patterns.push_back(pattern);
        self.race_pace.add_sample(pattern.adjusted_time_s());
    }

    pub fn patterns(&self) -> &VecDeque<LapTimePattern> {
        &self.patterns
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Average of the recorded lap times, None before the first lap.
    pub fn race_pace_s(&self) -> Option<f32> {
        if self.race_pace.get_num_samples() == 0 {
            None
        } else {
            Some(self.race_pace.get_average())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TireWear;

    fn lap(current_lap: u32, lap_time: f32) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.player.current_lap = current_lap;
        snapshot.player.last_lap_time_s = lap_time;
        snapshot.player.fuel_level_l = 50.;
        snapshot.player.tire_wear = TireWear::uniform(10.);
        snapshot.player.gap_ahead_s = 5.;
        snapshot
    }

    #[test]
    fn test_records_each_lap_once() {
        let mut analyzer = TimingAnalyzer::new();
        analyzer.update(&lap(2, 90.));
        analyzer.update(&lap(2, 90.));
        analyzer.update(&lap(3, 92.));
        assert_eq!(analyzer.pattern_count(), 2);
        assert!((analyzer.race_pace_s().unwrap_or_default() - 91.).abs() < 1e-3);
    }

    #[test]
    fn test_no_lap_time_no_pattern() {
        let mut analyzer = TimingAnalyzer::new();
        analyzer.update(&lap(1, 0.));
        assert_eq!(analyzer.pattern_count(), 0);
        assert_eq!(analyzer.race_pace_s(), None);
    }

    #[test]
    fn test_pattern_deltas_add_back_to_lap_time() {
        let mut analyzer = TimingAnalyzer::new();
        let mut snapshot = lap(4, 95.);
        snapshot.player.gap_ahead_s = 0.8;
        analyzer.update(&snapshot);

        let pattern = analyzer.patterns()[0];
        assert!((pattern.fuel_delta_s - 1.5).abs() < 1e-4);
        assert!((pattern.tire_delta_s - 0.2).abs() < 1e-4);
        assert_eq!(pattern.traffic_delta_s, 0.3);
        assert!((pattern.adjusted_time_s() - 95.).abs() < 1e-4);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut analyzer = TimingAnalyzer::new();
        for current_lap in 1..=30 {
            analyzer.update(&lap(current_lap, 90. + current_lap as f32));
        }
        assert_eq!(analyzer.pattern_count(), LAP_PATTERN_WINDOW);
        assert_eq!(analyzer.patterns()[0].lap, 11);
        // laps 11..=30 averaged
        assert!((analyzer.race_pace_s().unwrap_or_default() - 110.5).abs() < 1e-3);
    }

    #[test]
    fn test_penalties_follow_policy() {
        let policy = PitPolicy {
            fuel_weight_penalty_s_per_l: 0.,
            traffic_gap_s: 0.5,
            ..Default::default()
        };
        let mut analyzer = TimingAnalyzer::with_policy(&policy);
        let mut snapshot = lap(4, 95.);
        snapshot.player.gap_ahead_s = 0.8;
        analyzer.update(&snapshot);

        let pattern = analyzer.patterns()[0];
        assert_eq!(pattern.fuel_delta_s, 0.);
        assert_eq!(pattern.traffic_delta_s, 0.);
        assert!((pattern.base_time_s - 94.8).abs() < 1e-4);
    }
}
