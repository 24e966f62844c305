pub mod position_tracker;
pub mod timing_analyzer;
pub mod track_database;
pub mod types;

use log::debug;

use crate::config::{PitPolicy, StrategyConfig};
use crate::strategy::{RaceAnalysis, RiskLevel, TireCompound};
use crate::telemetry::{FlagState, OpponentState, TelemetrySnapshot};

pub use position_tracker::{PositionSnapshot, PositionTracker};
pub use timing_analyzer::{LapTimePattern, TimingAnalyzer};
pub use track_database::{TrackData, TrackDatabase, TrackZone};
pub use types::*;

/// Detailed pit-stop timing model. Keeps its own rolling position and lap
/// pattern history between calls.
pub struct PitStopCalculator {
    track_database: TrackDatabase,
    position_tracker: PositionTracker,
    timing_analyzer: TimingAnalyzer,
    policy: PitPolicy,
    include_opponents: bool,
    track: Option<(String, TrackData)>,
}

impl Default for PitStopCalculator {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}

impl PitStopCalculator {
    pub fn new(config: &StrategyConfig) -> Self {
        let policy = config.policy.pit.clone();
        Self {
            track_database: TrackDatabase::new(),
            position_tracker: PositionTracker::new(policy.player_history, policy.opponent_history),
            timing_analyzer: TimingAnalyzer::with_policy(&policy),
            policy,
            include_opponents: config.include_opponents,
            track: None,
        }
    }

    pub fn calculate_pit_stop_timing(
        &mut self,
        snapshot: &TelemetrySnapshot,
        race_context: &RaceAnalysis,
    ) -> PitStopAnalysis {
        let track = self.resolve_track(&snapshot.session.track_name);
        self.position_tracker.update(snapshot, self.include_opponents);
        self.timing_analyzer.update(snapshot);

        let lap_time = self.reference_lap_time(snapshot, &track);
        let current_position = self.current_position(snapshot, &track, lap_time);
        let optimal_windows =
            self.optimal_windows(snapshot, &track, current_position.laps_remaining);
        let future_positions = self.future_positions(snapshot);
        let opponents = self.opponents(snapshot);
        let undercut = self.undercut_analysis(snapshot, &opponents);
        let traffic = self.traffic_analysis(snapshot, &opponents);
        let pit_loss = self.pit_loss(&track, lap_time);
        let risk_factors = self.risk_factors(snapshot, &undercut);
        let opportunity_windows = self.opportunity_windows(snapshot.player.current_lap);

        let fuel_load_l = current_position.laps_remaining as f32
            * snapshot.player.fuel_per_lap_l
            * self.policy.fuel_load_margin;
        let primary = self.primary_recommendation(
            snapshot,
            race_context,
            &optimal_windows,
            fuel_load_l,
        );
        let alternatives = self.alternatives(snapshot, fuel_load_l);
        let confidence = self.confidence(snapshot);
        let data_quality = self.data_quality();

        debug!(
            "Pit analysis for {}: {} windows, should pit {}, confidence {:.2}",
            track.name,
            optimal_windows.len(),
            primary.should_pit,
            confidence
        );

        PitStopAnalysis {
            track_name: track.name,
            race_phase: race_context.strategic_phase,
            current_position,
            optimal_windows,
            future_positions,
            undercut,
            traffic,
            pit_loss,
            risk_factors,
            opportunity_windows,
            primary,
            alternatives,
            confidence,
            data_quality,
        }
    }

    pub fn position_tracker(&self) -> &PositionTracker {
        &self.position_tracker
    }

    pub fn timing_analyzer(&self) -> &TimingAnalyzer {
        &self.timing_analyzer
    }

    /// Track data for the session, looked up again only when the name changes.
    fn resolve_track(&mut self, track_name: &str) -> TrackData {
        match &self.track {
            Some((name, data)) if name == track_name => data.clone(),
            _ => {
                let data = self.track_database.lookup(track_name).clone();
                self.track = Some((track_name.to_string(), data.clone()));
                data
            }
        }
    }

    /// Last lap time, else the recorded race pace, else a lap at the
    /// player's average speed so far.
    fn reference_lap_time(&self, snapshot: &TelemetrySnapshot, track: &TrackData) -> f32 {
        if snapshot.player.last_lap_time_s > 0. {
            return snapshot.player.last_lap_time_s;
        }
        self.timing_analyzer
            .race_pace_s()
            .filter(|pace| *pace > 0.)
            .or_else(|| {
                self.position_tracker
                    .average_player_speed_kph()
                    .and_then(|speed| track.lap_time_at_s(speed))
            })
            .unwrap_or(0.)
    }

    fn opponents<'a>(&self, snapshot: &'a TelemetrySnapshot) -> Vec<&'a OpponentState> {
        if self.include_opponents {
            snapshot.opponents.iter().collect()
        } else {
            Vec::new()
        }
    }

    fn current_position(
        &self,
        snapshot: &TelemetrySnapshot,
        track: &TrackData,
        lap_time: f32,
    ) -> TrackPosition {
        let player = &snapshot.player;
        let lap_distance_pct = player.lap_distance_pct * 100.;
        let next_sector = if lap_distance_pct < 33.33 {
            1
        } else if lap_distance_pct < 66.66 {
            2
        } else {
            3
        };

        let laps_remaining = snapshot.laps_remaining().unwrap_or_else(|| {
            if lap_time > 0. && snapshot.session.time_remaining_s > 0. {
                (snapshot.session.time_remaining_s / lap_time).floor() as u32
            } else {
                0
            }
        });
        let partial_lap = (1. - player.lap_distance_pct).max(0.);

        TrackPosition {
            lap_distance_pct,
            speed_kph: player.speed_kph,
            next_sector,
            laps_remaining,
            distance_to_finish_m: (laps_remaining as f32 + partial_lap) * track.length_m,
            time_to_finish_s: (laps_remaining as f32 + partial_lap) * lap_time,
            distance_to_pit_entry_m: track.distance_to_pit_entry_m(player.lap_distance_pct),
            in_overtaking_zone: track.is_overtaking_zone(player.lap_distance_pct),
        }
    }

    fn optimal_windows(
        &self,
        snapshot: &TelemetrySnapshot,
        track: &TrackData,
        laps_remaining: u32,
    ) -> Vec<PitWindow> {
        let player = &snapshot.player;
        let current_lap = player.current_lap;
        let wear = player.tire_wear.average();
        let mut windows = Vec::new();

        if wear > self.policy.strategic_wear {
            windows.push(PitWindow {
                kind: PitWindowKind::Strategic,
                start_lap: current_lap.saturating_add(1),
                end_lap: current_lap.saturating_add(self.policy.strategic_window_laps),
                optimal_lap: current_lap.saturating_add(self.policy.strategic_optimal_offset),
                expected_gain_s: -track.pit_lane_time_delta_s,
                risk: RiskLevel::Medium,
                reason: format!("Tire wear at {:.0}%", wear),
            });
        }

        if let Some(fuel_laps) = player.fuel_laps_left() {
            if fuel_laps < self.policy.forced_fuel_laps {
                let laps = fuel_laps.max(0.).floor() as u32;
                let start_lap = current_lap.saturating_add(laps.saturating_sub(2));
                windows.push(PitWindow {
                    kind: PitWindowKind::Forced,
                    start_lap,
                    end_lap: current_lap
                        .saturating_add(laps.saturating_sub(1))
                        .max(start_lap),
                    optimal_lap: start_lap,
                    expected_gain_s: -track.pit_lane_time_delta_s,
                    risk: RiskLevel::High,
                    reason: format!("Fuel for {:.1} laps only", fuel_laps),
                });
            }
        }

        if snapshot.race_progress() >= self.policy.opportunity_progress
            && laps_remaining > self.policy.opportunity_min_laps_remaining
        {
            let finish_lap = current_lap.saturating_add(laps_remaining);
            let end_lap = finish_lap.saturating_sub(1);
            let start_lap = current_lap
                .saturating_add(1)
                .max(end_lap.saturating_sub(self.policy.opportunity_window_laps))
                .min(end_lap);
            let laps_on_fresh_tires = finish_lap.saturating_sub(start_lap);
            windows.push(PitWindow {
                kind: PitWindowKind::Opportunity,
                start_lap,
                end_lap,
                optimal_lap: start_lap,
                expected_gain_s: laps_on_fresh_tires as f32 * self.policy.opportunity_gain_per_lap_s,
                risk: RiskLevel::Low,
                reason: "Late stop for fresh tires in the closing laps".to_string(),
            });
        }

        windows
    }

    /// Projects the next laps. A stop is expected on every lap where the
    /// tires are past the wear limit or the stint has run too long.
    fn future_positions(&self, snapshot: &TelemetrySnapshot) -> Vec<FuturePosition> {
        let player = &snapshot.player;
        let wear = player.tire_wear.average();
        let stint = player.stint_lap();

        (1..=self.policy.prediction_laps)
            .map(|ahead| {
                let pit_stop_expected = wear > self.policy.stop_prediction_wear
                    || stint.saturating_add(ahead) > self.policy.stop_prediction_stint;
                let penalty = if pit_stop_expected {
                    self.policy.stop_position_penalty
                } else {
                    0
                };
                FuturePosition {
                    lap: player.current_lap.saturating_add(ahead),
                    predicted_position: player.position.saturating_add(penalty),
                    pit_stop_expected,
                    confidence: (self.policy.prediction_base_confidence
                        - self.policy.prediction_confidence_decay * ahead as f32)
                        .clamp(0.1, 1.),
                }
            })
            .collect()
    }

    fn undercut_analysis(
        &self,
        snapshot: &TelemetrySnapshot,
        opponents: &[&OpponentState],
    ) -> UndercutAnalysis {
        let position = snapshot.player.position;
        let rival = |opponent: &OpponentState| RivalGap {
            car_index: opponent.car_index,
            driver_name: opponent.driver_name.clone(),
            position: opponent.position,
            gap_s: opponent.gap_to_player_s.abs(),
            stint_lap: opponent.stint_lap(),
        };

        let threats: Vec<RivalGap> = opponents
            .iter()
            .filter(|o| {
                o.position > position && o.gap_to_player_s.abs() <= self.policy.threat_gap_behind_s
            })
            .map(|o| rival(*o))
            .collect();
        let targets: Vec<RivalGap> = opponents
            .iter()
            .filter(|o| {
                o.position < position && o.gap_to_player_s.abs() <= self.policy.target_gap_ahead_s
            })
            .map(|o| rival(*o))
            .collect();

        let defensive_action = threats.first().map(|threat| {
            format!(
                "Cover the undercut from {} in P{}, {:.1}s behind",
                threat.driver_name, threat.position, threat.gap_s
            )
        });

        UndercutAnalysis {
            threats,
            targets,
            defensive_action,
        }
    }

    fn traffic_analysis(
        &self,
        snapshot: &TelemetrySnapshot,
        opponents: &[&OpponentState],
    ) -> TrafficAnalysis {
        let player = &snapshot.player;
        let backmarker_count = opponents
            .iter()
            .filter(|o| {
                o.position > player.position.saturating_add(self.policy.backmarker_position_margin)
            })
            .count();

        TrafficAnalysis {
            traffic_density: if self.policy.traffic_density_cars > 0. {
                opponents.len() as f32 / self.policy.traffic_density_cars
            } else {
                0.
            },
            clear_air: player.gap_ahead_s > self.policy.clear_air_gap_s
                || player.gap_behind_s > self.policy.clear_air_gap_s,
            backmarker_count,
            backmarker_risk: if backmarker_count > self.policy.backmarker_count {
                RiskLevel::High
            } else {
                RiskLevel::Low
            },
        }
    }

    fn pit_loss(&self, track: &TrackData, lap_time: f32) -> PitLossBreakdown {
        let pit_lane_travel_s = track.pit_lane_travel_time_s();
        let stationary_time_s = track.typical_stationary_time_s;
        let total_time_s =
            self.policy.entry_time_s + pit_lane_travel_s + stationary_time_s + self.policy.exit_time_s;

        let racing_line_time_s = if lap_time > 0. && track.length_m > 0. {
            track.pit_lane_length_m / (track.length_m / lap_time)
        } else {
            0.
        };
        let net_loss_s = total_time_s - racing_line_time_s;
        let positions_lost = if lap_time > 0. {
            (net_loss_s / lap_time * self.policy.field_size).max(0.)
        } else {
            0.
        };

        PitLossBreakdown {
            entry_time_s: self.policy.entry_time_s,
            pit_lane_travel_s,
            stationary_time_s,
            exit_time_s: self.policy.exit_time_s,
            total_time_s,
            racing_line_time_s,
            net_loss_s,
            positions_lost,
            recovery_laps: positions_lost / 2.,
        }
    }

    fn risk_factors(
        &self,
        snapshot: &TelemetrySnapshot,
        undercut: &UndercutAnalysis,
    ) -> Vec<RiskFactor> {
        let player = &snapshot.player;
        let wear = player.tire_wear.average();
        let mut factors = Vec::new();

        if wear > self.policy.risk_wear {
            factors.push(RiskFactor {
                kind: RiskFactorKind::TireWear,
                severity: RiskLevel::High,
                description: format!("Tires {:.0}% worn", wear),
            });
        }
        if let Some(fuel_laps) = player.fuel_laps_left() {
            if fuel_laps < self.policy.critical_fuel_laps {
                factors.push(RiskFactor {
                    kind: RiskFactorKind::FuelShortage,
                    severity: RiskLevel::Critical,
                    description: format!("{:.1} laps of fuel left", fuel_laps),
                });
            }
        }
        if !undercut.threats.is_empty() {
            factors.push(RiskFactor {
                kind: RiskFactorKind::Undercut,
                severity: RiskLevel::Medium,
                description: format!("{} car(s) within undercut range", undercut.threats.len()),
            });
        }

        factors
    }

    fn primary_recommendation(
        &self,
        snapshot: &TelemetrySnapshot,
        race_context: &RaceAnalysis,
        windows: &[PitWindow],
        fuel_load_l: f32,
    ) -> PitRecommendation {
        let tire_compound = self.compound_for(snapshot);

        // A forced stop always wins, otherwise the window worth the most time
        let best = windows
            .iter()
            .find(|w| w.kind == PitWindowKind::Forced)
            .or_else(|| {
                windows.iter().reduce(|best, window| {
                    if window.expected_gain_s > best.expected_gain_s {
                        window
                    } else {
                        best
                    }
                })
            });

        match best {
            Some(window) => PitRecommendation {
                plan: PitPlan::Primary,
                should_pit: true,
                target_lap: Some(window.optimal_lap),
                window: Some((window.start_lap, window.end_lap)),
                tire_compound,
                fuel_load_l,
                reasoning: format!("{} ({} race phase)", window.reason, race_context.strategic_phase),
            },
            None => PitRecommendation {
                plan: PitPlan::Primary,
                should_pit: false,
                target_lap: None,
                window: None,
                tire_compound,
                fuel_load_l,
                reasoning: format!(
                    "No pit window open ({} race phase)",
                    race_context.strategic_phase
                ),
            },
        }
    }

    fn alternatives(&self, snapshot: &TelemetrySnapshot, fuel_load_l: f32) -> Vec<PitRecommendation> {
        let current_lap = snapshot.player.current_lap;
        let next_lap = current_lap.saturating_add(1);
        let aggressive_lap = current_lap.saturating_add(self.policy.aggressive_stop_offset);

        vec![
            PitRecommendation {
                plan: PitPlan::Conservative,
                should_pit: true,
                target_lap: Some(next_lap),
                window: Some((next_lap, next_lap)),
                tire_compound: TireCompound::Medium,
                fuel_load_l,
                reasoning: "Stop next lap and take the durable compound".to_string(),
            },
            PitRecommendation {
                plan: PitPlan::Aggressive,
                should_pit: true,
                target_lap: Some(aggressive_lap),
                window: Some((aggressive_lap, aggressive_lap)),
                tire_compound: TireCompound::Soft,
                fuel_load_l,
                reasoning: "Extend the stint and attack on softs".to_string(),
            },
        ]
    }

    fn compound_for(&self, snapshot: &TelemetrySnapshot) -> TireCompound {
        if snapshot.player.tire_wear.average() > self.policy.soft_compound_wear {
            TireCompound::Soft
        } else {
            TireCompound::Medium
        }
    }

    fn confidence(&self, snapshot: &TelemetrySnapshot) -> f32 {
        let policy = &self.policy;
        let player = &snapshot.player;
        let mut confidence = policy.base_confidence;
        if self.position_tracker.player_history().len() >= policy.confidence_history_samples {
            confidence += policy.confidence_history_bonus;
        }
        if snapshot.session.flag != FlagState::Green {
            confidence -= policy.confidence_caution_penalty;
        }
        if player.gap_ahead_s > policy.confidence_clear_gap_s
            && player.gap_behind_s > policy.confidence_clear_gap_s
        {
            confidence += policy.confidence_clear_gap_bonus;
        }
        confidence.clamp(0.1, 1.)
    }

    fn data_quality(&self) -> f32 {
        let policy = &self.policy;
        let checks = [
            self.position_tracker.player_history().len() >= policy.quality_position_samples,
            self.timing_analyzer.pattern_count() >= policy.quality_pattern_count,
            self.position_tracker.tracked_opponents() >= policy.quality_opponent_count,
        ];
        let passed = checks.iter().filter(|c| **c).count();
        (policy.base_data_quality + policy.quality_step * passed as f32).clamp(0.1, 1.)
    }

    fn opportunity_windows(&self, current_lap: u32) -> Vec<OpportunityWindow> {
        [
            (OpportunityScenario::SafetyCar, self.policy.safety_car_probability),
            (
                OpportunityScenario::WeatherChange,
                self.policy.weather_change_probability,
            ),
        ]
        .into_iter()
        .map(|(scenario, probability)| OpportunityWindow {
            scenario,
            probability,
            start_lap: current_lap.saturating_add(self.policy.scenario_start_offset),
            end_lap: current_lap.saturating_add(self.policy.scenario_end_offset),
        })
        .collect()
    }
}
