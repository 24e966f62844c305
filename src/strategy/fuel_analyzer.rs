use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::FuelPolicy;
use crate::telemetry::{FlagState, TelemetryHistory, TelemetrySnapshot};

use super::LapAnalysis;

/// How hard the driver can push given the fuel situation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelStrategy {
    AggressiveSave,
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl std::fmt::Display for FuelStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuelStrategy::AggressiveSave => write!(f, "aggressive_save"),
            FuelStrategy::Conservative => write!(f, "conservative"),
            FuelStrategy::Balanced => write!(f, "balanced"),
            FuelStrategy::Aggressive => write!(f, "aggressive"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelAnalysis {
    pub sample_count: usize,
    /// Liters used per lap
    pub average_consumption_l: f32,
    /// Whole laps the current fuel load lasts
    pub remaining_laps: u32,
    /// Laps left in the race, estimated from lap times for timed sessions
    pub race_laps_remaining: f32,
    pub fuel_to_finish_l: f32,
    /// Liters per lap that must be saved to finish, negative when there is spare fuel
    pub save_required_l: f32,
    pub safety_margin_l: f32,
    /// Reported consumption delta from track conditions, not applied to other figures
    pub weather_impact: f32,
    pub strategy: FuelStrategy,
}

pub struct FuelAnalyzer {
    policy: FuelPolicy,
    safety_margin_factor: f32,
}

impl FuelAnalyzer {
    pub fn new(safety_margin_factor: f32) -> Self {
        Self::with_policy(FuelPolicy::default(), safety_margin_factor)
    }

    pub fn with_policy(policy: FuelPolicy, safety_margin_factor: f32) -> Self {
        Self {
            policy,
            safety_margin_factor,
        }
    }

    pub fn analyze(
        &self,
        history: &TelemetryHistory,
        lap_analysis: &LapAnalysis,
        previous: &FuelAnalysis,
    ) -> FuelAnalysis {
        let Some(current) = history.latest() else {
            return previous.clone();
        };
        if history.len() < self.policy.min_history {
            debug!("Fuel analysis skipped, history too short");
            return previous.clone();
        }

        let samples = self.consumption_samples(history);
        if samples.is_empty() {
            debug!("Fuel analysis skipped, no plausible consumption samples");
            return previous.clone();
        }

        let mut analysis = previous.clone();
        analysis.sample_count = samples.len();
        analysis.average_consumption_l = self.smoothed_consumption(&samples);

        let fuel = current.player.fuel_level_l;
        if analysis.average_consumption_l > 0. {
            analysis.remaining_laps = (fuel / analysis.average_consumption_l).floor() as u32;
        }

        if let Some(laps_to_go) = self.laps_to_go(current, lap_analysis) {
            analysis.race_laps_remaining = laps_to_go;
            analysis.fuel_to_finish_l = laps_to_go * analysis.average_consumption_l;
            if laps_to_go > 0. {
                analysis.save_required_l = (analysis.fuel_to_finish_l - fuel) / laps_to_go;
            }
        }

        analysis.safety_margin_l = analysis.fuel_to_finish_l * (self.safety_margin_factor - 1.);
        analysis.weather_impact = self.weather_impact(current);
        analysis.strategy = self.strategy(analysis.save_required_l);

        analysis
    }

    /// Fuel used between consecutive snapshots where a lap was completed,
    /// newest first, discarding implausible readings.
    fn consumption_samples(&self, history: &TelemetryHistory) -> Vec<f32> {
        history
            .recent(history.len())
            .tuple_windows()
            .filter(|(newer, older)| {
                newer.player.current_lap > older.player.current_lap
                    && newer.player.fuel_level_l < older.player.fuel_level_l
            })
            .map(|(newer, older)| older.player.fuel_level_l - newer.player.fuel_level_l)
            .filter(|used| *used > 0. && *used < self.policy.max_plausible_consumption_l)
            .take(self.policy.sample_count)
            .collect()
    }

    fn smoothed_consumption(&self, samples: &[f32]) -> f32 {
        let average = samples.iter().sum::<f32>() / samples.len() as f32;
        if samples.len() < self.policy.smoothing_min_samples {
            return average;
        }

        // a policy may ask for smoothing with fewer samples than it needs
        let (&[first, second, ..], &[.., second_last, last]) = (samples, samples) else {
            return average;
        };
        let recent = (first + second) / 2.;
        let older = (second_last + last) / 2.;
        if (recent - older).abs() > self.policy.smoothing_threshold_l {
            (average + recent) / 2.
        } else {
            average
        }
    }

    fn laps_to_go(&self, current: &TelemetrySnapshot, lap_analysis: &LapAnalysis) -> Option<f32> {
        if let Some(laps) = current.laps_remaining() {
            return Some(laps as f32);
        }

        if lap_analysis.average_lap_time_s > 0. {
            Some(current.session.time_remaining_s / lap_analysis.average_lap_time_s)
        } else {
            debug!("No average lap time yet, cannot estimate laps left in timed session");
            None
        }
    }

    fn strategy(&self, save_required_l: f32) -> FuelStrategy {
        if save_required_l > self.policy.aggressive_save_threshold_l {
            FuelStrategy::AggressiveSave
        } else if save_required_l > self.policy.conservative_threshold_l {
            FuelStrategy::Conservative
        } else if save_required_l < self.policy.aggressive_threshold_l {
            FuelStrategy::Aggressive
        } else {
            FuelStrategy::Balanced
        }
    }

    fn weather_impact(&self, current: &TelemetrySnapshot) -> f32 {
        let mut impact = 0.;
        match current.session.flag {
            FlagState::Yellow => impact += self.policy.yellow_flag_impact,
            FlagState::Red => impact += self.policy.red_flag_impact,
            _ => {}
        }
        if current.session.air_temp_c > self.policy.hot_air_temp_c {
            impact += self.policy.hot_air_impact;
        } else if current.session.air_temp_c < self.policy.cold_air_temp_c {
            impact += self.policy.cold_air_impact;
        }
        impact
    }
}
