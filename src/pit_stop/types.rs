use serde::{Deserialize, Serialize};

use crate::strategy::{RiskLevel, StrategicPhase, TireCompound};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitWindowKind {
    /// Tires are worn enough that stopping soon pays off
    Strategic,
    /// The car cannot reach the finish on the fuel on board
    Forced,
    Opportunity,
}

/// Range of laps in which a stop makes sense.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitWindow {
    pub kind: PitWindowKind,
    pub start_lap: u32,
    pub end_lap: u32,
    pub optimal_lap: u32,
    /// Seconds gained (positive) or lost (negative) by stopping in this window
    pub expected_gain_s: f32,
    pub risk: RiskLevel,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPosition {
    /// Percentage of the current lap completed (0-100)
    pub lap_distance_pct: f32,
    pub speed_kph: f32,
    pub next_sector: u8,
    pub laps_remaining: u32,
    pub distance_to_finish_m: f32,
    pub time_to_finish_s: f32,
    pub distance_to_pit_entry_m: f32,
    pub in_overtaking_zone: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuturePosition {
    pub lap: u32,
    pub predicted_position: u32,
    pub pit_stop_expected: bool,
    pub confidence: f32,
}

/// Opponent close enough to matter for undercut or overcut calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RivalGap {
    pub car_index: u32,
    pub driver_name: String,
    pub position: u32,
    pub gap_s: f32,
    pub stint_lap: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UndercutAnalysis {
    /// Cars behind that could jump the player by stopping first
    pub threats: Vec<RivalGap>,
    /// Cars ahead close enough to attack with an early stop
    pub targets: Vec<RivalGap>,
    pub defensive_action: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficAnalysis {
    pub traffic_density: f32,
    pub clear_air: bool,
    pub backmarker_count: usize,
    pub backmarker_risk: RiskLevel,
}

/// Time the stop costs, split by phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PitLossBreakdown {
    pub entry_time_s: f32,
    pub pit_lane_travel_s: f32,
    pub stationary_time_s: f32,
    pub exit_time_s: f32,
    pub total_time_s: f32,
    /// Time the same distance takes at race pace
    pub racing_line_time_s: f32,
    pub net_loss_s: f32,
    pub positions_lost: f32,
    pub recovery_laps: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    TireWear,
    FuelShortage,
    Undercut,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub kind: RiskFactorKind,
    pub severity: RiskLevel,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityScenario {
    SafetyCar,
    WeatherChange,
}

/// Race event that would make a stop cheaper if it happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpportunityWindow {
    pub scenario: OpportunityScenario,
    pub probability: f32,
    pub start_lap: u32,
    pub end_lap: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitPlan {
    Primary,
    Conservative,
    Aggressive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitRecommendation {
    pub plan: PitPlan,
    pub should_pit: bool,
    pub target_lap: Option<u32>,
    pub window: Option<(u32, u32)>,
    pub tire_compound: TireCompound,
    pub fuel_load_l: f32,
    pub reasoning: String,
}

/// Full pit-timing view produced for one snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitStopAnalysis {
    pub track_name: String,
    pub race_phase: StrategicPhase,
    pub current_position: TrackPosition,
    pub optimal_windows: Vec<PitWindow>,
    pub future_positions: Vec<FuturePosition>,
    pub undercut: UndercutAnalysis,
    pub traffic: TrafficAnalysis,
    pub pit_loss: PitLossBreakdown,
    pub risk_factors: Vec<RiskFactor>,
    pub opportunity_windows: Vec<OpportunityWindow>,
    pub primary: PitRecommendation,
    pub alternatives: Vec<PitRecommendation>,
    pub confidence: f32,
    pub data_quality: f32,
}
