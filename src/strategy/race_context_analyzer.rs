use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{RaceFormatOverride, RacePolicy};
use crate::telemetry::{FlagState, TelemetryHistory, TelemetrySnapshot};

use super::{FuelAnalysis, FuelStrategy, LapAnalysis, LapTrend, RiskLevel, TireAnalysis};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceFormat {
    Sprint,
    #[default]
    Standard,
    Endurance,
}

/// Coarse race-progress bucket driving strategy bias.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategicPhase {
    #[default]
    Early,
    Middle,
    Late,
    Critical,
}

impl std::fmt::Display for StrategicPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategicPhase::Early => write!(f, "early"),
            StrategicPhase::Middle => write!(f, "middle"),
            StrategicPhase::Late => write!(f, "late"),
            StrategicPhase::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionTrend {
    Gaining,
    Stable,
    Losing,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceAnalysis {
    pub race_format: RaceFormat,
    pub strategic_phase: StrategicPhase,
    pub race_progress: f32,
    pub position_trend: Option<PositionTrend>,
    /// Gap in seconds to each opponent within a few positions, keyed by position
    pub competitive_gaps: BTreeMap<u32, f32>,
    pub risk_level: RiskLevel,
    pub opportunity_score: f32,
}

pub struct RaceContextAnalyzer {
    policy: RacePolicy,
    format_override: RaceFormatOverride,
    include_opponents: bool,
}

impl Default for RaceContextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RaceContextAnalyzer {
    pub fn new() -> Self {
        Self::with_policy(RacePolicy::default(), RaceFormatOverride::Auto, true)
    }

    pub fn with_policy(
        policy: RacePolicy,
        format_override: RaceFormatOverride,
        include_opponents: bool,
    ) -> Self {
        Self {
            policy,
            format_override,
            include_opponents,
        }
    }

    pub fn analyze(
        &self,
        history: &TelemetryHistory,
        lap_analysis: &LapAnalysis,
        fuel_analysis: &FuelAnalysis,
        tire_analysis: &TireAnalysis,
        previous: &RaceAnalysis,
    ) -> RaceAnalysis {
        let Some(current) = history.latest() else {
            return previous.clone();
        };

        let mut analysis = previous.clone();
        analysis.race_format = self.race_format(current);
        analysis.race_progress = current.race_progress();
        analysis.strategic_phase = self.strategic_phase(analysis.race_progress);

        if let Some(trend) = self.position_trend(history) {
            analysis.position_trend = Some(trend);
        }

        analysis.competitive_gaps = if self.include_opponents {
            self.competitive_gaps(current)
        } else {
            BTreeMap::new()
        };
        analysis.risk_level = self.risk_level(current, fuel_analysis, tire_analysis);
        analysis.opportunity_score =
            self.opportunity_score(current, lap_analysis, fuel_analysis, tire_analysis);

        analysis
    }

    pub fn race_format(&self, current: &TelemetrySnapshot) -> RaceFormat {
        match self.format_override {
            RaceFormatOverride::Sprint => return RaceFormat::Sprint,
            RaceFormatOverride::Endurance => return RaceFormat::Endurance,
            RaceFormatOverride::Standard => return RaceFormat::Standard,
            RaceFormatOverride::Auto => {}
        }

        let total_laps = current.session.total_laps;
        let time_remaining = current.session.time_remaining_s;
        if total_laps > 0 && total_laps <= self.policy.sprint_max_laps {
            RaceFormat::Sprint
        } else if total_laps >= self.policy.endurance_min_laps {
            RaceFormat::Endurance
        } else if time_remaining > 0. && time_remaining < self.policy.sprint_max_time_s {
            RaceFormat::Sprint
        } else if time_remaining > self.policy.endurance_min_time_s {
            RaceFormat::Endurance
        } else {
            RaceFormat::Standard
        }
    }

    pub fn strategic_phase(&self, progress: f32) -> StrategicPhase {
        if progress < self.policy.early_phase_end {
            StrategicPhase::Early
        } else if progress < self.policy.middle_phase_end {
            StrategicPhase::Middle
        } else if progress < self.policy.late_phase_end {
            StrategicPhase::Late
        } else {
            StrategicPhase::Critical
        }
    }

    fn position_trend(&self, history: &TelemetryHistory) -> Option<PositionTrend> {
        let lookback = self.policy.position_trend_lookback;
        if lookback == 0 || history.len() < lookback {
            debug!("Position trend skipped, {} samples", history.len());
            return None;
        }

        let current = history.latest()?.player.position as i64;
        let earlier = history.recent(lookback).last()?.player.position as i64;
        // positive when the player moved up the order
        let gained = earlier - current;
        let deadband = self.policy.position_trend_deadband as i64;

        Some(if gained > deadband {
            PositionTrend::Gaining
        } else if gained < -deadband {
            PositionTrend::Losing
        } else {
            PositionTrend::Stable
        })
    }

    fn competitive_gaps(&self, current: &TelemetrySnapshot) -> BTreeMap<u32, f32> {
        let player_position = current.player.position;
        current
            .opponents
            .iter()
            .filter(|o| {
                o.position != player_position
                    && o.position.abs_diff(player_position) <= self.policy.gap_position_range
            })
            .map(|o| (o.position, o.gap_to_player_s))
            .collect()
    }

    fn risk_level(
        &self,
        current: &TelemetrySnapshot,
        fuel_analysis: &FuelAnalysis,
        tire_analysis: &TireAnalysis,
    ) -> RiskLevel {
        let flags = [
            current.player.fuel_level_l < fuel_analysis.fuel_to_finish_l * self.policy.fuel_risk_factor,
            tire_analysis.current_wear > self.policy.risk_wear,
            current.session.flag != FlagState::Green,
            tire_analysis.undercut_threat,
        ];

        match flags.iter().filter(|f| **f).count() {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            2 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    fn opportunity_score(
        &self,
        current: &TelemetrySnapshot,
        lap_analysis: &LapAnalysis,
        fuel_analysis: &FuelAnalysis,
        tire_analysis: &TireAnalysis,
    ) -> f32 {
        let policy = &self.policy;
        let mut score = policy.opportunity_base;

        if tire_analysis.overcut_opportunity {
            score += policy.opportunity_overcut_bonus;
        }
        if lap_analysis.trend == Some(LapTrend::Improving) {
            score += policy.opportunity_improving_bonus;
        }
        if current.session.flag == FlagState::Yellow {
            score += policy.opportunity_yellow_bonus;
        }
        if fuel_analysis.strategy == FuelStrategy::Aggressive {
            score += policy.opportunity_aggressive_fuel_bonus;
        }

        if tire_analysis.undercut_threat {
            score -= policy.opportunity_undercut_penalty;
        }
        if lap_analysis.trend == Some(LapTrend::Degrading) {
            score -= policy.opportunity_degrading_penalty;
        }
        if tire_analysis.current_wear > policy.opportunity_worn_tire_wear {
            score -= policy.opportunity_worn_tire_penalty;
        }

        score.clamp(0., 1.)
    }
}
