use serde::{Deserialize, Serialize};

use crate::config::{FuelPolicy, StrategyPolicy, SynthesisPolicy, TirePolicy};
use crate::pit_stop::PitStopAnalysis;
use crate::telemetry::{FlagState, TelemetryHistory, TelemetrySnapshot};

use super::{
    DerivedState, FuelAnalysis, FuelStrategy, LapAnalysis, RaceAnalysis, RiskLevel,
    StrategicPhase, TireAnalysis, TireCompound,
};

/// Headline call for the current state of the race.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryStrategy {
    #[default]
    EstablishRhythm,
    MaintainPace,
    Attack,
    PitForAdvantage,
    PitInWindow,
    ManageToFinish,
    FinalStop,
}

impl PrimaryStrategy {
    fn select(phase: StrategicPhase, pit_window_open: bool, high_opportunity: bool) -> Self {
        match (phase, pit_window_open, high_opportunity) {
            (StrategicPhase::Critical, true, _) => PrimaryStrategy::FinalStop,
            (_, true, true) => PrimaryStrategy::PitForAdvantage,
            (_, true, false) => PrimaryStrategy::PitInWindow,
            (_, false, true) => PrimaryStrategy::Attack,
            (StrategicPhase::Early, false, false) => PrimaryStrategy::EstablishRhythm,
            (StrategicPhase::Middle, false, false) => PrimaryStrategy::MaintainPace,
            (StrategicPhase::Late | StrategicPhase::Critical, false, false) => {
                PrimaryStrategy::ManageToFinish
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PrimaryStrategy::EstablishRhythm => "Settle in, build consistency and protect the car",
            PrimaryStrategy::MaintainPace => "Hold current pace and monitor rivals",
            PrimaryStrategy::Attack => "Push to gain positions while the opportunity lasts",
            PrimaryStrategy::PitForAdvantage => "Pit now to jump cars through the stop",
            PrimaryStrategy::PitInWindow => "Pit window is open, plan the stop",
            PrimaryStrategy::ManageToFinish => "Manage tires and fuel to the flag",
            PrimaryStrategy::FinalStop => "Make the final stop and bring it home",
        }
    }
}

impl std::fmt::Display for PrimaryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Immediate,
    High,
    Medium,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTiming {
    Now,
    NextLap,
    PitWindow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImmediateAction {
    pub priority: ActionPriority,
    pub timing: ActionTiming,
    pub action: String,
    pub reason: String,
}

/// Lap time targets in seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LapTargets {
    pub optimal_s: f32,
    pub current_stint_s: f32,
    pub fuel_save_s: f32,
    pub attack_s: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelManagementPlan {
    pub strategy: FuelStrategy,
    /// Consumption per lap that reaches the finish, liters
    pub target_consumption_l: f32,
    pub save_required_l: f32,
    pub fuel_to_finish_l: f32,
    pub safety_margin_l: f32,
    pub techniques: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TireManagementPlan {
    pub current_wear: f32,
    pub degradation_rate: f32,
    pub optimal_stint_length: f32,
    pub compound_recommendation: TireCompound,
    pub pit_window_open: bool,
    pub techniques: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishPrediction {
    pub predicted_position: u32,
    pub laps_remaining: f32,
    pub time_remaining_s: f32,
    pub confidence: f32,
}

/// Caller-facing output, built fresh for every snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategicRecommendation {
    pub timestamp_ms: u128,
    pub primary_strategy: PrimaryStrategy,
    pub confidence_level: f32,
    pub risk_assessment: RiskLevel,
    pub immediate_actions: Vec<ImmediateAction>,
    pub lap_targets: LapTargets,
    pub fuel_management: FuelManagementPlan,
    pub tire_management: TireManagementPlan,
    pub finish_prediction: FinishPrediction,
    pub pit_stop: Option<PitStopAnalysis>,
    pub lap_analysis: LapAnalysis,
    pub fuel_analysis: FuelAnalysis,
    pub tire_analysis: TireAnalysis,
    pub race_analysis: RaceAnalysis,
}

pub struct RecommendationSynthesizer {
    policy: SynthesisPolicy,
    fuel_policy: FuelPolicy,
    tire_policy: TirePolicy,
}

impl Default for RecommendationSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationSynthesizer {
    pub fn new() -> Self {
        Self::with_policy(&StrategyPolicy::default())
    }

    pub fn with_policy(policy: &StrategyPolicy) -> Self {
        Self {
            policy: policy.synthesis.clone(),
            fuel_policy: policy.fuel.clone(),
            tire_policy: policy.tire.clone(),
        }
    }

    pub fn synthesize(
        &self,
        snapshot: &TelemetrySnapshot,
        history: &TelemetryHistory,
        state: &DerivedState,
        pit_stop: Option<PitStopAnalysis>,
    ) -> StrategicRecommendation {
        StrategicRecommendation {
            timestamp_ms: snapshot.timestamp_ms,
            primary_strategy: PrimaryStrategy::select(
                state.race.strategic_phase,
                state.tire.pit_window_open,
                self.high_opportunity(state),
            ),
            confidence_level: self.confidence_level(snapshot, history, state),
            risk_assessment: state.race.risk_level,
            immediate_actions: self.immediate_actions(snapshot, state),
            lap_targets: self.lap_targets(state),
            fuel_management: self.fuel_management(&state.fuel),
            tire_management: self.tire_management(&state.tire),
            finish_prediction: self.finish_prediction(snapshot, state),
            pit_stop,
            lap_analysis: state.lap.clone(),
            fuel_analysis: state.fuel.clone(),
            tire_analysis: state.tire.clone(),
            race_analysis: state.race.clone(),
        }
    }

    fn immediate_actions(
        &self,
        snapshot: &TelemetrySnapshot,
        state: &DerivedState,
    ) -> Vec<ImmediateAction> {
        let mut actions = Vec::new();

        if state.fuel.save_required_l > self.fuel_policy.aggressive_save_threshold_l {
            actions.push(ImmediateAction {
                priority: ActionPriority::Immediate,
                timing: ActionTiming::Now,
                action: format!("Save {:.2} l per lap", state.fuel.save_required_l),
                reason: "Not enough fuel to reach the finish".to_string(),
            });
        }

        if state.tire.pit_window_open && state.tire.current_wear > self.policy.box_now_wear {
            actions.push(ImmediateAction {
                priority: ActionPriority::High,
                timing: ActionTiming::NextLap,
                action: "Box next lap for fresh tires".to_string(),
                reason: format!("Tires {:.0}% worn", state.tire.current_wear),
            });
        }

        if snapshot.session.flag == FlagState::Yellow && !state.tire.pit_window_open {
            actions.push(ImmediateAction {
                priority: ActionPriority::High,
                timing: ActionTiming::PitWindow,
                action: "Consider an early stop under the yellow".to_string(),
                reason: "Caution reduces the time lost in the pit lane".to_string(),
            });
        }

        actions
    }

    fn fuel_management(&self, fuel: &FuelAnalysis) -> FuelManagementPlan {
        let techniques: &[&str] = match fuel.strategy {
            FuelStrategy::AggressiveSave => &[
                "Lift and coast before every braking zone",
                "Short shift on corner exits",
                "Switch to the leanest fuel map",
            ],
            FuelStrategy::Conservative => &[
                "Lift and coast into the heaviest braking zones",
                "Short shift out of slow corners",
            ],
            FuelStrategy::Balanced => &["Keep the current fuel map"],
            FuelStrategy::Aggressive => &["Run the rich fuel map", "Use full throttle to the limiter"],
        };

        FuelManagementPlan {
            strategy: fuel.strategy,
            target_consumption_l: (fuel.average_consumption_l - fuel.save_required_l.max(0.)).max(0.),
            save_required_l: fuel.save_required_l,
            fuel_to_finish_l: fuel.fuel_to_finish_l,
            safety_margin_l: fuel.safety_margin_l,
            techniques: techniques.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tire_management(&self, tire: &TireAnalysis) -> TireManagementPlan {
        let mut techniques: Vec<String> = if tire.current_wear > self.tire_policy.pit_window_wear {
            vec![
                "Avoid wheelspin on corner exits".to_string(),
                "Protect the fronts through long corners".to_string(),
                "Keep steering inputs smooth".to_string(),
            ]
        } else if tire.current_wear > self.tire_policy.performance_wear_floor {
            vec![
                "Limit slides to keep temperatures in the window".to_string(),
                "Brake in a straight line".to_string(),
            ]
        } else {
            vec!["Tires are fresh, push".to_string()]
        };
        if tire.undercut_threat {
            techniques.push("Be ready to respond to an undercut".to_string());
        }

        TireManagementPlan {
            current_wear: tire.current_wear,
            degradation_rate: tire.degradation_rate,
            optimal_stint_length: tire.optimal_stint_length,
            compound_recommendation: tire.compound_recommendation,
            pit_window_open: tire.pit_window_open,
            techniques,
        }
    }

    fn high_opportunity(&self, state: &DerivedState) -> bool {
        state.race.opportunity_score > self.policy.high_opportunity
    }

    fn confidence_level(
        &self,
        snapshot: &TelemetrySnapshot,
        history: &TelemetryHistory,
        state: &DerivedState,
    ) -> f32 {
        let policy = &self.policy;
        let mut confidence = policy.base_confidence;
        if history.len() >= policy.confidence_history_samples {
            confidence += policy.confidence_history_bonus;
        }
        if state.lap.consistency_score > policy.confidence_consistency {
            confidence += policy.confidence_consistency_bonus;
        }
        if snapshot.session.flag != FlagState::Green {
            confidence -= policy.confidence_caution_penalty;
        }
        match state.race.strategic_phase {
            StrategicPhase::Early | StrategicPhase::Middle => {
                confidence += policy.confidence_phase_bonus;
            }
            StrategicPhase::Critical => confidence -= policy.confidence_critical_penalty,
            StrategicPhase::Late => {}
        }
        confidence.clamp(0.1, 1.)
    }

    fn lap_targets(&self, state: &DerivedState) -> LapTargets {
        let average = state.lap.average_lap_time_s;
        let fuel_save_s = if state.fuel.save_required_l > self.policy.fuel_save_target_threshold_l {
            average + self.policy.fuel_save_lap_offset_s
        } else {
            average
        };
        let attack_s = if self.high_opportunity(state) {
            average + self.policy.attack_lap_offset_s
        } else {
            average
        };

        LapTargets {
            optimal_s: state.lap.optimal_lap_time_s,
            current_stint_s: state.lap.predicted_lap_time_s,
            fuel_save_s,
            attack_s,
        }
    }

    /// Projects the current position to the flag at the predicted lap pace.
    fn finish_prediction(&self, snapshot: &TelemetrySnapshot, state: &DerivedState) -> FinishPrediction {
        let lap_time = if state.lap.predicted_lap_time_s > 0. {
            state.lap.predicted_lap_time_s
        } else {
            state.lap.average_lap_time_s
        };

        let (laps_remaining, time_remaining_s) = match snapshot.laps_remaining() {
            Some(laps) => (laps as f32, laps as f32 * lap_time),
            None => {
                let time_remaining = snapshot.session.time_remaining_s.max(0.);
                let laps = if lap_time > 0. {
                    time_remaining / lap_time
                } else {
                    0.
                };
                (laps, time_remaining)
            }
        };

        FinishPrediction {
            predicted_position: snapshot.player.position,
            laps_remaining,
            time_remaining_s,
            confidence: self.policy.finish_prediction_confidence,
        }
    }
}
