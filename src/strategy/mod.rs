pub mod engine;
pub mod fuel_analyzer;
pub mod lap_time_analyzer;
pub mod race_context_analyzer;
pub mod synthesizer;
pub mod tire_analyzer;

use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::telemetry::TelemetryHistory;

pub use engine::StrategyEngine;
pub use fuel_analyzer::{FuelAnalysis, FuelAnalyzer, FuelStrategy};
pub use lap_time_analyzer::{LapAnalysis, LapTimeAnalyzer, LapTrend};
pub use race_context_analyzer::{
    PositionTrend, RaceAnalysis, RaceContextAnalyzer, RaceFormat, StrategicPhase,
};
pub use synthesizer::{
    ActionPriority, ActionTiming, FinishPrediction, FuelManagementPlan, ImmediateAction,
    LapTargets, PrimaryStrategy, RecommendationSynthesizer, StrategicRecommendation,
    TireManagementPlan,
};
pub use tire_analyzer::{TireAnalysis, TireAnalyzer, TireCompound};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Output of the four per-snapshot analyzers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedState {
    pub lap: LapAnalysis,
    pub fuel: FuelAnalysis,
    pub tire: TireAnalysis,
    pub race: RaceAnalysis,
}

/// Recomputes every analysis from the history. Analyses without enough data
/// carry over their values from `previous`.
pub fn recompute(
    history: &TelemetryHistory,
    previous: &DerivedState,
    config: &StrategyConfig,
) -> DerivedState {
    if history.is_empty() {
        return previous.clone();
    }

    let policy = &config.policy;
    let lap = LapTimeAnalyzer::with_policy(policy.lap.clone()).analyze(history, &previous.lap);
    let fuel = FuelAnalyzer::with_policy(policy.fuel.clone(), config.safety_margin).analyze(
        history,
        &lap,
        &previous.fuel,
    );
    let tire = TireAnalyzer::with_policy(policy.tire.clone(), config.include_opponents).analyze(
        history,
        &fuel,
        &previous.tire,
    );
    let race = RaceContextAnalyzer::with_policy(
        policy.race.clone(),
        config.race_format,
        config.include_opponents,
    )
    .analyze(history, &lap, &fuel, &tire, &previous.race);

    DerivedState {
        lap,
        fuel,
        tire,
        race,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{TelemetrySnapshot, TireWear};

    fn snapshot(lap: u32, lap_time: f32, fuel: f32) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.session.total_laps = 30;
        snapshot.player.position = 4;
        snapshot.player.current_lap = lap;
        snapshot.player.last_lap_time_s = lap_time;
        snapshot.player.best_lap_time_s = 89.8;
        snapshot.player.fuel_level_l = fuel;
        snapshot.player.fuel_per_lap_l = 2.5;
        snapshot.player.tire_wear = TireWear::uniform(lap as f32 * 2.);
        snapshot
    }

    #[test]
    fn test_empty_history_returns_previous() {
        let previous = DerivedState {
            lap: LapAnalysis {
                average_lap_time_s: 90.,
                ..Default::default()
            },
            ..Default::default()
        };
        let state = recompute(&TelemetryHistory::new(), &previous, &StrategyConfig::default());
        assert_eq!(state, previous);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut history = TelemetryHistory::new();
        for lap in 1..=8 {
            history.append(snapshot(lap, 90. + lap as f32 * 0.1, 60. - lap as f32 * 2.5));
        }
        let config = StrategyConfig::default();

        let first = recompute(&history, &DerivedState::default(), &config);
        let second = recompute(&history, &DerivedState::default(), &config);
        assert_eq!(first, second);
        assert!(first.lap.average_lap_time_s > 90.);
        assert!(first.fuel.average_consumption_l > 0.);
        assert!(first.tire.current_wear > 0.);
        assert!(first.race.race_progress > 0.);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.to_string(), "critical");
    }
}
