use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::PitlaneError;

const CONFIG_DIR_NAME: &str = "pitlane";
const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_SAFETY_MARGIN: f32 = 1.1;

/// Race format forced by the user instead of being inferred from the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceFormatOverride {
    #[default]
    Auto,
    Sprint,
    Endurance,
    Standard,
}

/// Read-only parameters of the strategy engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub race_format: RaceFormatOverride,
    /// Multiplier applied to fuel-to-finish when sizing the safety margin
    pub safety_margin: f32,
    /// When false opponents are ignored by every analysis
    pub include_opponents: bool,
    pub policy: StrategyPolicy,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            race_format: RaceFormatOverride::Auto,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            include_opponents: true,
            policy: StrategyPolicy::default(),
        }
    }
}

impl StrategyConfig {
    pub fn default_path() -> Result<PathBuf, PitlaneError> {
        Ok(dirs::config_dir()
            .ok_or(PitlaneError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load the config from the user's config directory, if one was saved.
    pub fn from_local_file() -> Result<Option<Self>, PitlaneError> {
        let config_path = Self::default_path()?;
        if config_path.exists() {
            Self::from_file(&config_path).map(Some)
        } else {
            debug!("No config file at {:?}, using defaults", config_path);
            Ok(None)
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, PitlaneError> {
        let file =
            std::fs::File::open(path).map_err(|e| PitlaneError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| PitlaneError::ConfigSerializeError { source: e })
    }

    pub fn save(&self) -> Result<(), PitlaneError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PitlaneError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PitlaneError::ConfigIOError { source: e })?;
            }
        }

        let file =
            std::fs::File::create(path).map_err(|e| PitlaneError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PitlaneError::ConfigSerializeError { source: e })
    }
}

/// Every threshold used by the analyzers and the pit-stop calculator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyPolicy {
    pub lap: LapPolicy,
    pub fuel: FuelPolicy,
    pub tire: TirePolicy,
    pub race: RacePolicy,
    pub pit: PitPolicy,
    pub synthesis: SynthesisPolicy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LapPolicy {
    pub sample_count: usize,
    pub min_samples: usize,
    pub trend_min_samples: usize,
    /// Laps averaged at each end of the sample window when computing the trend
    pub trend_window: usize,
    pub trend_threshold_s: f32,
    pub consistency_scale: f32,
    pub improving_adjustment_s: f32,
    pub degrading_adjustment_s: f32,
}

impl Default for LapPolicy {
    fn default() -> Self {
        Self {
            sample_count: 10,
            min_samples: 3,
            trend_min_samples: 5,
            trend_window: 3,
            trend_threshold_s: 0.2,
            consistency_scale: 10.,
            improving_adjustment_s: -0.1,
            degrading_adjustment_s: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelPolicy {
    pub sample_count: usize,
    pub min_history: usize,
    /// Consumption samples at or above this many liters per lap are discarded
    pub max_plausible_consumption_l: f32,
    pub smoothing_min_samples: usize,
    pub smoothing_threshold_l: f32,
    pub aggressive_save_threshold_l: f32,
    pub conservative_threshold_l: f32,
    pub aggressive_threshold_l: f32,
    pub hot_air_temp_c: f32,
    pub cold_air_temp_c: f32,
    /// Consumption deltas reported as the weather impact
    pub yellow_flag_impact: f32,
    pub red_flag_impact: f32,
    pub hot_air_impact: f32,
    pub cold_air_impact: f32,
}

impl Default for FuelPolicy {
    fn default() -> Self {
        Self {
            sample_count: 10,
            min_history: 2,
            max_plausible_consumption_l: 10.,
            smoothing_min_samples: 4,
            smoothing_threshold_l: 0.1,
            aggressive_save_threshold_l: 0.3,
            conservative_threshold_l: 0.1,
            aggressive_threshold_l: -0.2,
            hot_air_temp_c: 30.,
            cold_air_temp_c: 10.,
            yellow_flag_impact: -0.1,
            red_flag_impact: -0.3,
            hot_air_impact: 0.05,
            cold_air_impact: 0.03,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TirePolicy {
    pub sample_count: usize,
    pub min_samples: usize,
    /// Wear percentage considered the end of a tire's useful life
    pub wear_ceiling: f32,
    pub performance_wear_floor: f32,
    /// Lap time lost per percent of wear above the floor, seconds
    pub performance_loss_s_per_pct: f32,
    pub pit_window_wear: f32,
    pub pit_window_fuel_laps: u32,
    pub pit_window_min_progress: f32,
    pub pit_window_max_progress: f32,
    pub undercut_gap_s: f32,
    pub overcut_stint_margin: u32,
    pub hot_track_temp_c: f32,
    pub cold_track_temp_c: f32,
    pub late_race_progress: f32,
}

impl Default for TirePolicy {
    fn default() -> Self {
        Self {
            sample_count: 10,
            min_samples: 3,
            wear_ceiling: 80.,
            performance_wear_floor: 20.,
            performance_loss_s_per_pct: 0.01,
            pit_window_wear: 60.,
            pit_window_fuel_laps: 10,
            pit_window_min_progress: 0.2,
            pit_window_max_progress: 0.9,
            undercut_gap_s: 25.,
            overcut_stint_margin: 5,
            hot_track_temp_c: 40.,
            cold_track_temp_c: 20.,
            late_race_progress: 0.7,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacePolicy {
    pub sprint_max_laps: u32,
    pub endurance_min_laps: u32,
    pub sprint_max_time_s: f32,
    pub endurance_min_time_s: f32,
    pub early_phase_end: f32,
    pub middle_phase_end: f32,
    pub late_phase_end: f32,
    pub position_trend_lookback: usize,
    pub position_trend_deadband: u32,
    pub gap_position_range: u32,
    pub fuel_risk_factor: f32,
    pub risk_wear: f32,
    pub opportunity_base: f32,
    pub opportunity_overcut_bonus: f32,
    pub opportunity_improving_bonus: f32,
    pub opportunity_yellow_bonus: f32,
    pub opportunity_aggressive_fuel_bonus: f32,
    pub opportunity_undercut_penalty: f32,
    pub opportunity_degrading_penalty: f32,
    /// Wear above which worn tires reduce the opportunity score
    pub opportunity_worn_tire_wear: f32,
    pub opportunity_worn_tire_penalty: f32,
}

impl Default for RacePolicy {
    fn default() -> Self {
        Self {
            sprint_max_laps: 15,
            endurance_min_laps: 50,
            sprint_max_time_s: 3600.,
            endurance_min_time_s: 7200.,
            early_phase_end: 0.25,
            middle_phase_end: 0.75,
            late_phase_end: 0.9,
            position_trend_lookback: 5,
            position_trend_deadband: 1,
            gap_position_range: 3,
            fuel_risk_factor: 1.1,
            risk_wear: 70.,
            opportunity_base: 0.5,
            opportunity_overcut_bonus: 0.2,
            opportunity_improving_bonus: 0.1,
            opportunity_yellow_bonus: 0.2,
            opportunity_aggressive_fuel_bonus: 0.1,
            opportunity_undercut_penalty: 0.2,
            opportunity_degrading_penalty: 0.1,
            opportunity_worn_tire_wear: 80.,
            opportunity_worn_tire_penalty: 0.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitPolicy {
    pub player_history: usize,
    pub opponent_history: usize,
    pub strategic_wear: f32,
    pub strategic_window_laps: u32,
    /// Laps after the current one the strategic window's optimal stop falls on
    pub strategic_optimal_offset: u32,
    pub forced_fuel_laps: f32,
    pub opportunity_progress: f32,
    pub opportunity_min_laps_remaining: u32,
    /// Laps before the final lap the late-race opportunity window opens
    pub opportunity_window_laps: u32,
    /// Lap time fresh tires are worth over the closing laps
    pub opportunity_gain_per_lap_s: f32,
    pub prediction_laps: u32,
    pub prediction_base_confidence: f32,
    pub prediction_confidence_decay: f32,
    pub stop_prediction_wear: f32,
    pub stop_prediction_stint: u32,
    pub stop_position_penalty: u32,
    pub threat_gap_behind_s: f32,
    pub target_gap_ahead_s: f32,
    pub clear_air_gap_s: f32,
    pub backmarker_position_margin: u32,
    pub backmarker_count: usize,
    /// Opponents that make up a fully congested stretch of track
    pub traffic_density_cars: f32,
    pub entry_time_s: f32,
    pub exit_time_s: f32,
    /// Cars assumed to be spread across one lap when converting time to positions
    pub field_size: f32,
    pub risk_wear: f32,
    pub critical_fuel_laps: f32,
    pub soft_compound_wear: f32,
    pub fuel_load_margin: f32,
    pub aggressive_stop_offset: u32,
    pub safety_car_probability: f32,
    pub weather_change_probability: f32,
    pub scenario_start_offset: u32,
    pub scenario_end_offset: u32,
    pub tire_wear_penalty_s_per_pct: f32,
    pub fuel_weight_penalty_s_per_l: f32,
    /// Following closer than this counts as running in traffic
    pub traffic_gap_s: f32,
    pub traffic_penalty_s: f32,
    pub base_confidence: f32,
    pub confidence_history_samples: usize,
    pub confidence_history_bonus: f32,
    pub confidence_caution_penalty: f32,
    pub confidence_clear_gap_s: f32,
    pub confidence_clear_gap_bonus: f32,
    pub base_data_quality: f32,
    pub quality_position_samples: usize,
    pub quality_pattern_count: usize,
    pub quality_opponent_count: usize,
    pub quality_step: f32,
}

impl Default for PitPolicy {
    fn default() -> Self {
        Self {
            player_history: 100,
            opponent_history: 50,
            strategic_wear: 40.,
            strategic_window_laps: 8,
            strategic_optimal_offset: 3,
            forced_fuel_laps: 8.,
            opportunity_progress: 0.7,
            opportunity_min_laps_remaining: 2,
            opportunity_window_laps: 3,
            opportunity_gain_per_lap_s: 0.3,
            prediction_laps: 5,
            prediction_base_confidence: 0.8,
            prediction_confidence_decay: 0.1,
            stop_prediction_wear: 80.,
            stop_prediction_stint: 25,
            stop_position_penalty: 2,
            threat_gap_behind_s: 25.,
            target_gap_ahead_s: 20.,
            clear_air_gap_s: 30.,
            backmarker_position_margin: 5,
            backmarker_count: 3,
            traffic_density_cars: 3.,
            entry_time_s: 3.,
            exit_time_s: 4.,
            field_size: 20.,
            risk_wear: 70.,
            critical_fuel_laps: 5.,
            soft_compound_wear: 60.,
            fuel_load_margin: 1.1,
            aggressive_stop_offset: 8,
            safety_car_probability: 0.3,
            weather_change_probability: 0.2,
            scenario_start_offset: 5,
            scenario_end_offset: 15,
            tire_wear_penalty_s_per_pct: 0.02,
            fuel_weight_penalty_s_per_l: 0.03,
            traffic_gap_s: 1.5,
            traffic_penalty_s: 0.3,
            base_confidence: 0.7,
            confidence_history_samples: 10,
            confidence_history_bonus: 0.1,
            confidence_caution_penalty: 0.2,
            confidence_clear_gap_s: 10.,
            confidence_clear_gap_bonus: 0.1,
            base_data_quality: 0.7,
            quality_position_samples: 5,
            quality_pattern_count: 3,
            quality_opponent_count: 3,
            quality_step: 0.1,
        }
    }
}

/// Thresholds the recommendation synthesizer scores and targets with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPolicy {
    pub base_confidence: f32,
    pub confidence_history_samples: usize,
    pub confidence_history_bonus: f32,
    pub confidence_consistency: f32,
    pub confidence_consistency_bonus: f32,
    pub confidence_caution_penalty: f32,
    /// Added in the early and middle phases
    pub confidence_phase_bonus: f32,
    pub confidence_critical_penalty: f32,
    pub high_opportunity: f32,
    /// Wear above which an open pit window becomes a box-next-lap call
    pub box_now_wear: f32,
    pub fuel_save_target_threshold_l: f32,
    pub fuel_save_lap_offset_s: f32,
    pub attack_lap_offset_s: f32,
    pub finish_prediction_confidence: f32,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        Self {
            base_confidence: 0.5,
            confidence_history_samples: 10,
            confidence_history_bonus: 0.2,
            confidence_consistency: 0.8,
            confidence_consistency_bonus: 0.1,
            confidence_caution_penalty: 0.2,
            confidence_phase_bonus: 0.1,
            confidence_critical_penalty: 0.1,
            high_opportunity: 0.6,
            box_now_wear: 70.,
            fuel_save_target_threshold_l: 0.1,
            fuel_save_lap_offset_s: 0.5,
            attack_lap_offset_s: -0.2,
            finish_prediction_confidence: 0.75,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StrategyConfig =
            serde_json::from_str(r#"{"race_format": "endurance", "policy": {"tire": {"pit_window_wear": 55.0}}}"#)
                .unwrap();

        assert_eq!(config.race_format, RaceFormatOverride::Endurance);
        assert_eq!(config.safety_margin, DEFAULT_SAFETY_MARGIN);
        assert!(config.include_opponents);
        assert_eq!(config.policy.tire.pit_window_wear, 55.);
        assert_eq!(config.policy.tire.wear_ceiling, 80.);
        assert_eq!(config.policy.lap, LapPolicy::default());
    }

    #[test]
    fn test_partial_synthesis_policy_uses_defaults() {
        let config: StrategyConfig = serde_json::from_str(
            r#"{"policy": {"synthesis": {"box_now_wear": 65.0}, "pit": {"strategic_window_laps": 5}}}"#,
        )
        .unwrap();

        assert_eq!(config.policy.synthesis.box_now_wear, 65.);
        assert_eq!(config.policy.synthesis.high_opportunity, 0.6);
        assert_eq!(config.policy.pit.strategic_window_laps, 5);
        assert_eq!(config.policy.pit.strategic_optimal_offset, 3);
        assert_eq!(config.policy.race, RacePolicy::default());
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = StrategyConfig {
            race_format: RaceFormatOverride::Sprint,
            safety_margin: 1.25,
            include_opponents: false,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = StrategyConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StrategyConfig::from_file(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(PitlaneError::ConfigIOError { .. })));
    }

    #[test]
    fn test_malformed_file_is_serialize_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let result = StrategyConfig::from_file(&path);
        assert!(matches!(
            result,
            Err(PitlaneError::ConfigSerializeError { .. })
        ));
    }
}
