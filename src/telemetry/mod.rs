pub mod collector;
pub mod history;
pub mod producer;

use serde::{Deserialize, Serialize};

pub use collector::collect_recommendations;
pub use history::{HISTORY_CAPACITY, TelemetryHistory};
pub use producer::{ReplayTelemetryProducer, TelemetryProducer};

/// Race control flag shown to the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    #[default]
    Green,
    Yellow,
    Red,
    Blue,
    White,
    Chequered,
}

impl std::fmt::Display for FlagState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagState::Green => write!(f, "green"),
            FlagState::Yellow => write!(f, "yellow"),
            FlagState::Red => write!(f, "red"),
            FlagState::Blue => write!(f, "blue"),
            FlagState::White => write!(f, "white"),
            FlagState::Chequered => write!(f, "chequered"),
        }
    }
}

/// Session-wide state shared by every car on track.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionState {
    pub track_name: String,
    /// Total race laps, 0 for time-based sessions
    pub total_laps: u32,
    /// Total session length in seconds, used for time-based progress
    pub session_length_s: f32,
    pub time_remaining_s: f32,
    pub flag: FlagState,
    pub air_temp_c: f32,
    pub track_temp_c: f32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            track_name: "Unknown".to_string(),
            total_laps: 0,
            session_length_s: 0.,
            time_remaining_s: 0.,
            flag: FlagState::Green,
            air_temp_c: 20.,
            track_temp_c: 25.,
        }
    }
}

/// Tire wear in percent worn (0 = new) for each corner of the car.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TireWear {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

impl TireWear {
    pub fn uniform(wear: f32) -> Self {
        Self {
            front_left: wear,
            front_right: wear,
            rear_left: wear,
            rear_right: wear,
        }
    }

    pub fn average(&self) -> f32 {
        (self.front_left + self.front_right + self.rear_left + self.rear_right) / 4.
    }
}

impl From<[f32; 4]> for TireWear {
    fn from(wear: [f32; 4]) -> Self {
        Self {
            front_left: wear[0],
            front_right: wear[1],
            rear_left: wear[2],
            rear_right: wear[3],
        }
    }
}

/// State of the player's car.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerState {
    pub car_index: u32,
    pub position: u32,
    pub current_lap: u32,
    /// Last completed lap time in seconds, 0 when not yet set
    pub last_lap_time_s: f32,
    /// Personal best lap time in seconds, 0 when not yet set
    pub best_lap_time_s: f32,
    pub current_lap_time_s: f32,
    /// Fuel in the tank, liters
    pub fuel_level_l: f32,
    /// Simulator estimate of fuel used per lap, liters
    pub fuel_per_lap_l: f32,
    pub tire_wear: TireWear,
    pub last_pit_lap: Option<u32>,
    /// Fraction of the current lap completed (0.0-1.0)
    pub lap_distance_pct: f32,
    pub speed_kph: f32,
    pub gap_ahead_s: f32,
    pub gap_behind_s: f32,
    pub in_pit_lane: bool,
}

impl PlayerState {
    /// Laps driven on the current set of tires.
    pub fn stint_lap(&self) -> u32 {
        stint_lap(self.current_lap, self.last_pit_lap)
    }

    /// Laps the current fuel load lasts at the simulator's per-lap estimate.
    pub fn fuel_laps_left(&self) -> Option<f32> {
        if self.fuel_per_lap_l > 0. {
            Some(self.fuel_level_l / self.fuel_per_lap_l)
        } else {
            None
        }
    }
}

/// State of a competitor as seen from the player's car.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpponentState {
    pub car_index: u32,
    pub driver_name: String,
    pub position: u32,
    pub current_lap: u32,
    /// Time gap to the player in seconds
    pub gap_to_player_s: f32,
    pub last_lap_time_s: f32,
    pub best_lap_time_s: f32,
    pub lap_distance_pct: f32,
    pub speed_kph: f32,
    pub in_pit_lane: bool,
    pub last_pit_lap: Option<u32>,
}

impl OpponentState {
    pub fn stint_lap(&self) -> u32 {
        stint_lap(self.current_lap, self.last_pit_lap)
    }
}

/// Stint length counted from the last pit lap, falling back to the lap count
/// when no stop was made or the pit lap lies in the future.
fn stint_lap(current_lap: u32, last_pit_lap: Option<u32>) -> u32 {
    match last_pit_lap {
        Some(pit_lap) if pit_lap > 0 && pit_lap <= current_lap => current_lap - pit_lap,
        _ => current_lap,
    }
}

/// A single telemetry sample as delivered by the simulator adapter.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySnapshot {
    pub timestamp_ms: u128,
    pub session: SessionState,
    pub player: PlayerState,
    pub opponents: Vec<OpponentState>,
}

impl TelemetrySnapshot {
    pub fn is_lap_based(&self) -> bool {
        self.session.total_laps > 0
    }

    /// Laps left in a lap-based race.
    pub fn laps_remaining(&self) -> Option<u32> {
        if self.is_lap_based() {
            Some(
                self.session
                    .total_laps
                    .saturating_sub(self.player.current_lap),
            )
        } else {
            None
        }
    }

    /// Fraction of the race completed, by laps when the race has a lap count
    /// and by elapsed session time otherwise.
    pub fn race_progress(&self) -> f32 {
        if self.is_lap_based() {
            self.player.current_lap as f32 / self.session.total_laps as f32
        } else if self.session.session_length_s > 0. {
            (self.session.session_length_s - self.session.time_remaining_s)
                / self.session.session_length_s
        } else {
            0.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stint_lap_falls_back_to_current_lap() {
        let mut player = PlayerState {
            current_lap: 12,
            ..Default::default()
        };
        assert_eq!(player.stint_lap(), 12);

        player.last_pit_lap = Some(8);
        assert_eq!(player.stint_lap(), 4);

        // A pit lap ahead of the current lap would give a negative stint
        player.last_pit_lap = Some(15);
        assert_eq!(player.stint_lap(), 12);
    }

    #[test]
    fn test_race_progress_lap_and_time_based() {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.session.total_laps = 40;
        snapshot.player.current_lap = 10;
        assert_eq!(snapshot.race_progress(), 0.25);
        assert_eq!(snapshot.laps_remaining(), Some(30));

        snapshot.session.total_laps = 0;
        snapshot.session.session_length_s = 3600.;
        snapshot.session.time_remaining_s = 900.;
        assert_eq!(snapshot.race_progress(), 0.75);
        assert_eq!(snapshot.laps_remaining(), None);
    }

    #[test]
    fn test_empty_session_progress_is_zero() {
        assert_eq!(TelemetrySnapshot::default().race_progress(), 0.);
    }

    #[test]
    fn test_fuel_laps_left_guards_zero_usage() {
        let player = PlayerState {
            fuel_level_l: 40.,
            fuel_per_lap_l: 0.,
            ..Default::default()
        };
        assert_eq!(player.fuel_laps_left(), None);
    }

    #[test]
    fn test_snapshot_deserializes_with_missing_fields() {
        let snapshot: TelemetrySnapshot =
            serde_json::from_str(r#"{"player": {"position": 3, "tire_wear": {"front_left": 12.0}}}"#)
                .unwrap();
        assert_eq!(snapshot.player.position, 3);
        assert_eq!(snapshot.player.tire_wear.front_left, 12.);
        assert_eq!(snapshot.session.flag, FlagState::Green);
        assert!(snapshot.opponents.is_empty());
    }
}
