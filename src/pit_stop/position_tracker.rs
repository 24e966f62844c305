use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySnapshot;

pub const PLAYER_HISTORY_CAPACITY: usize = 100;
pub const OPPONENT_HISTORY_CAPACITY: usize = 50;

/// Where a car was on track when a snapshot was taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub lap_distance_pct: f32,
    pub speed_kph: f32,
    pub lap_time_s: f32,
    pub in_pit_lane: bool,
}

/// Rolling per-car track position history. Opponents are keyed by car index.
pub struct PositionTracker {
    player: VecDeque<PositionSnapshot>,
    opponents: BTreeMap<u32, VecDeque<PositionSnapshot>>,
    player_capacity: usize,
    opponent_capacity: usize,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(PLAYER_HISTORY_CAPACITY, OPPONENT_HISTORY_CAPACITY)
    }
}

impl PositionTracker {
    pub fn new(player_capacity: usize, opponent_capacity: usize) -> Self {
        let player_capacity = player_capacity.max(1);
        Self {
            player: VecDeque::with_capacity(player_capacity),
            opponents: BTreeMap::new(),
            player_capacity,
            opponent_capacity: opponent_capacity.max(1),
        }
    }

    pub fn update(&mut self, snapshot: &TelemetrySnapshot, include_opponents: bool) {
        let player = &snapshot.player;
        push_bounded(
            &mut self.player,
            self.player_capacity,
            PositionSnapshot {
                lap_distance_pct: player.lap_distance_pct,
                speed_kph: player.speed_kph,
                lap_time_s: player.current_lap_time_s,
                in_pit_lane: player.in_pit_lane,
            },
        );

        if !include_opponents {
            return;
        }

        for opponent in &snapshot.opponents {
            let history = self
                .opponents
                .entry(opponent.car_index)
                .or_insert_with(|| VecDeque::with_capacity(self.opponent_capacity));
            push_bounded(
                history,
                self.opponent_capacity,
                PositionSnapshot {
                    lap_distance_pct: opponent.lap_distance_pct,
                    speed_kph: opponent.speed_kph,
                    lap_time_s: opponent.last_lap_time_s,
                    in_pit_lane: opponent.in_pit_lane,
                },
            );
        }
    }

    pub fn player_history(&self) -> &VecDeque<PositionSnapshot> {
        &self.player
    }

    pub fn tracked_opponents(&self) -> usize {
        self.opponents.len()
    }

    /// Mean player speed over the tracked window, ignoring pit-lane samples.
    pub fn average_player_speed_kph(&self) -> Option<f32> {
        let (total, count) = self
            .player
            .iter()
            .filter(|p| !p.in_pit_lane && p.speed_kph > 0.)
            .fold((0., 0usize), |(total, count), p| (total + p.speed_kph, count + 1));

        if count == 0 {
            None
        } else {
            Some(total / count as f32)
        }
    }
}

fn push_bounded(history: &mut VecDeque<PositionSnapshot>, capacity: usize, value: PositionSnapshot) {
    if history.len() >= capacity {
        history.pop_front();
    }
    history.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::OpponentState;

    fn snapshot_with_opponents(count: u32) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.player.speed_kph = 200.;
        snapshot.opponents = (0..count)
            .map(|i| OpponentState {
                car_index: i + 1,
                speed_kph: 190.,
                ..Default::default()
            })
            .collect();
        snapshot
    }

    #[test]
    fn test_player_history_is_capped() {
        let mut tracker = PositionTracker::default();
        for _ in 0..150 {
            tracker.update(&snapshot_with_opponents(2), true);
        }
        assert_eq!(tracker.player_history().len(), PLAYER_HISTORY_CAPACITY);
        assert_eq!(
            tracker.opponents.get(&1).map(|h| h.len()),
            Some(OPPONENT_HISTORY_CAPACITY)
        );
        assert_eq!(tracker.tracked_opponents(), 2);
    }

    #[test]
    fn test_opponents_ignored_when_excluded() {
        let mut tracker = PositionTracker::default();
        tracker.update(&snapshot_with_opponents(3), false);
        assert_eq!(tracker.tracked_opponents(), 0);
        assert_eq!(tracker.player_history().len(), 1);
    }

    #[test]
    fn test_average_speed_skips_pit_lane() {
        let mut tracker = PositionTracker::default();
        assert_eq!(tracker.average_player_speed_kph(), None);

        tracker.update(&snapshot_with_opponents(0), true);
        let mut pitting = snapshot_with_opponents(0);
        pitting.player.speed_kph = 60.;
        pitting.player.in_pit_lane = true;
        tracker.update(&pitting, true);

        assert_eq!(tracker.average_player_speed_kph(), Some(200.));
    }
}
