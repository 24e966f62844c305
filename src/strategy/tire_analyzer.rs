use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::TirePolicy;
use crate::telemetry::{TelemetryHistory, TelemetrySnapshot};

use super::FuelAnalysis;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TireCompound {
    Soft,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for TireCompound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TireCompound::Soft => write!(f, "soft"),
            TireCompound::Medium => write!(f, "medium"),
            TireCompound::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TireAnalysis {
    /// Average wear across the four tires, percent
    pub current_wear: f32,
    pub current_stint_lap: u32,
    /// Wear percentage accumulated per lap
    pub degradation_rate: f32,
    /// Laps left before the wear ceiling is reached
    pub optimal_stint_length: f32,
    /// Lap time lost to wear, seconds
    pub performance_delta_s: f32,
    pub pit_window_open: bool,
    pub undercut_threat: bool,
    pub overcut_opportunity: bool,
    pub compound_recommendation: TireCompound,
}

pub struct TireAnalyzer {
    policy: TirePolicy,
    include_opponents: bool,
}

impl Default for TireAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TireAnalyzer {
    pub fn new() -> Self {
        Self::with_policy(TirePolicy::default(), true)
    }

    pub fn with_policy(policy: TirePolicy, include_opponents: bool) -> Self {
        Self {
            policy,
            include_opponents,
        }
    }

    pub fn analyze(
        &self,
        history: &TelemetryHistory,
        fuel_analysis: &FuelAnalysis,
        previous: &TireAnalysis,
    ) -> TireAnalysis {
        let Some(current) = history.latest() else {
            return previous.clone();
        };

        let mut analysis = previous.clone();
        let wear = current.player.tire_wear.average();
        analysis.current_wear = wear;
        analysis.current_stint_lap = current.player.stint_lap();

        if let Some(rate) = self.degradation_rate(history) {
            analysis.degradation_rate = rate;
        }
        if analysis.degradation_rate > 0. {
            analysis.optimal_stint_length =
                (self.policy.wear_ceiling - wear) / analysis.degradation_rate;
        }

        analysis.performance_delta_s = (wear - self.policy.performance_wear_floor).max(0.)
            * self.policy.performance_loss_s_per_pct;
        analysis.pit_window_open = self.pit_window_open(current, wear, fuel_analysis);

        if self.include_opponents {
            let (undercut_threat, overcut_opportunity) = self.rival_pressure(current);
            analysis.undercut_threat = undercut_threat;
            analysis.overcut_opportunity = overcut_opportunity;
        } else {
            analysis.undercut_threat = false;
            analysis.overcut_opportunity = false;
        }

        analysis.compound_recommendation = self.compound(current);
        analysis
    }

    /// Wear per lap between the oldest and newest of the recent samples, if
    /// the stint advanced between them.
    fn degradation_rate(&self, history: &TelemetryHistory) -> Option<f32> {
        let samples: Vec<(f32, u32)> = history
            .recent(self.policy.sample_count)
            .map(|s| (s.player.tire_wear.average(), s.player.stint_lap()))
            .collect();

        if samples.len() < self.policy.min_samples {
            debug!("Tire degradation skipped, {} samples", samples.len());
            return None;
        }

        let (Some(&(newest_wear, newest_lap)), Some(&(oldest_wear, oldest_lap))) =
            (samples.first(), samples.last())
        else {
            return None;
        };
        let lap_delta = newest_lap as f32 - oldest_lap as f32;
        if lap_delta > 0. {
            Some((newest_wear - oldest_wear) / lap_delta)
        } else {
            None
        }
    }

    fn pit_window_open(
        &self,
        current: &TelemetrySnapshot,
        wear: f32,
        fuel_analysis: &FuelAnalysis,
    ) -> bool {
        if current.is_lap_based() {
            let progress = current.race_progress();
            if progress < self.policy.pit_window_min_progress
                || progress > self.policy.pit_window_max_progress
            {
                return false;
            }
        }

        // remaining_laps keeps its zero default until a consumption rate is
        // known, so zero there means unknown rather than an empty tank
        let fuel_short = fuel_analysis.average_consumption_l > 0.
            && fuel_analysis.remaining_laps < self.policy.pit_window_fuel_laps;
        wear > self.policy.pit_window_wear || fuel_short
    }

    /// Returns whether a trailing car threatens an undercut and whether a
    /// leading car on older tires can be overcut.
    fn rival_pressure(&self, current: &TelemetrySnapshot) -> (bool, bool) {
        let player_stint = current.player.stint_lap();
        let mut undercut_threat = false;
        let mut overcut_opportunity = false;

        for opponent in current
            .opponents
            .iter()
            .filter(|o| o.gap_to_player_s.abs() <= self.policy.undercut_gap_s)
        {
            if opponent.position > current.player.position {
                undercut_threat = true;
            } else if opponent.position < current.player.position
                && opponent.stint_lap() > player_stint.saturating_add(self.policy.overcut_stint_margin)
            {
                overcut_opportunity = true;
            }
        }

        (undercut_threat, overcut_opportunity)
    }

    fn compound(&self, current: &TelemetrySnapshot) -> TireCompound {
        let track_temp = current.session.track_temp_c;
        if track_temp > self.policy.hot_track_temp_c {
            TireCompound::Hard
        } else if track_temp < self.policy.cold_track_temp_c {
            TireCompound::Soft
        } else if current.race_progress() > self.policy.late_race_progress {
            TireCompound::Soft
        } else {
            TireCompound::Medium
        }
    }
}
