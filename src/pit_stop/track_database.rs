// Static reference data for the circuits the pit-stop model knows about

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uom::si::f32::{Length, Time, Velocity};
use uom::si::length::meter;
use uom::si::time::second;
use uom::si::velocity::kilometer_per_hour;

pub const GENERIC_TRACK_NAME: &str = "Generic";

/// Section of a lap expressed as lap-distance fractions (0.0-1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackZone {
    pub start_pct: f32,
    pub end_pct: f32,
}

impl TrackZone {
    pub const fn new(start_pct: f32, end_pct: f32) -> Self {
        Self { start_pct, end_pct }
    }

    pub fn contains(&self, lap_distance_pct: f32) -> bool {
        lap_distance_pct >= self.start_pct && lap_distance_pct <= self.end_pct
    }
}

/// Pit lane geometry and layout details for a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    pub name: String,
    pub length_m: f32,
    pub pit_lane_length_m: f32,
    pub pit_speed_limit_kph: f32,
    /// Lap-distance fraction where the pit entry line sits
    pub pit_entry_pct: f32,
    /// Typical time stationary in the box, seconds
    pub typical_stationary_time_s: f32,
    /// Extra time a drive through the pit lane costs versus the racing line
    pub pit_lane_time_delta_s: f32,
    pub drs_zones: Vec<TrackZone>,
    pub overtaking_zones: Vec<TrackZone>,
}

impl TrackData {
    /// Time to cover the pit lane at the speed limit.
    pub fn pit_lane_travel_time_s(&self) -> f32 {
        if self.pit_speed_limit_kph <= 0. {
            return 0.;
        }
        let lane = Length::new::<meter>(self.pit_lane_length_m);
        let limit = Velocity::new::<kilometer_per_hour>(self.pit_speed_limit_kph);
        let travel: Time = lane / limit;
        travel.get::<second>()
    }

    /// Lap time at a constant average speed, None when the car is not moving.
    pub fn lap_time_at_s(&self, speed_kph: f32) -> Option<f32> {
        if speed_kph <= 0. || self.length_m <= 0. {
            return None;
        }
        let lap = Length::new::<meter>(self.length_m);
        let speed = Velocity::new::<kilometer_per_hour>(speed_kph);
        let lap_time: Time = lap / speed;
        Some(lap_time.get::<second>())
    }

    /// Distance still to drive before the pit entry line, wrapping past the
    /// start/finish line when the entry is already behind the car.
    pub fn distance_to_pit_entry_m(&self, lap_distance_pct: f32) -> f32 {
        (self.pit_entry_pct - lap_distance_pct).rem_euclid(1.) * self.length_m
    }

    pub fn is_overtaking_zone(&self, lap_distance_pct: f32) -> bool {
        self.overtaking_zones
            .iter()
            .chain(self.drs_zones.iter())
            .any(|zone| zone.contains(lap_distance_pct))
    }
}

/// Compile-time track entry, with the alternative names simulators use.
struct TrackRecord {
    name: &'static str,
    aliases: &'static [&'static str],
    length_m: f32,
    pit_lane_length_m: f32,
    pit_speed_limit_kph: f32,
    pit_entry_pct: f32,
    typical_stationary_time_s: f32,
    pit_lane_time_delta_s: f32,
    drs_zones: &'static [TrackZone],
    overtaking_zones: &'static [TrackZone],
}

impl TrackRecord {
    fn to_track_data(&self) -> TrackData {
        TrackData {
            name: self.name.to_string(),
            length_m: self.length_m,
            pit_lane_length_m: self.pit_lane_length_m,
            pit_speed_limit_kph: self.pit_speed_limit_kph,
            pit_entry_pct: self.pit_entry_pct,
            typical_stationary_time_s: self.typical_stationary_time_s,
            pit_lane_time_delta_s: self.pit_lane_time_delta_s,
            drs_zones: self.drs_zones.to_vec(),
            overtaking_zones: self.overtaking_zones.to_vec(),
        }
    }
}

const GENERIC_TRACK: TrackRecord = TrackRecord {
    name: GENERIC_TRACK_NAME,
    aliases: &[],
    length_m: 5000.,
    pit_lane_length_m: 400.,
    pit_speed_limit_kph: 80.,
    pit_entry_pct: 0.95,
    typical_stationary_time_s: 25.,
    pit_lane_time_delta_s: 22.,
    drs_zones: &[],
    overtaking_zones: &[TrackZone::new(0., 0.1)],
};

const KNOWN_TRACKS: &[TrackRecord] = &[
    TrackRecord {
        name: "Spa-Francorchamps",
        aliases: &["spa", "circuit de spa francorchamps", "spa francorchamps"],
        length_m: 7004.,
        pit_lane_length_m: 430.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.97,
        typical_stationary_time_s: 25.,
        pit_lane_time_delta_s: 21.,
        drs_zones: &[TrackZone::new(0.05, 0.2), TrackZone::new(0.62, 0.7)],
        overtaking_zones: &[TrackZone::new(0.17, 0.22), TrackZone::new(0.68, 0.73)],
    },
    TrackRecord {
        name: "Monza",
        aliases: &["autodromo nazionale monza", "monza circuit"],
        length_m: 5793.,
        pit_lane_length_m: 420.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.96,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 23.,
        drs_zones: &[TrackZone::new(0.0, 0.12), TrackZone::new(0.7, 0.8)],
        overtaking_zones: &[TrackZone::new(0.12, 0.16), TrackZone::new(0.36, 0.4)],
    },
    TrackRecord {
        name: "Silverstone GP",
        aliases: &["silverstone", "silverstone circuit"],
        length_m: 5891.,
        pit_lane_length_m: 450.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.96,
        typical_stationary_time_s: 25.,
        pit_lane_time_delta_s: 22.,
        drs_zones: &[TrackZone::new(0.25, 0.33), TrackZone::new(0.62, 0.7)],
        overtaking_zones: &[TrackZone::new(0.33, 0.37), TrackZone::new(0.7, 0.74)],
    },
    TrackRecord {
        name: "Nürburgring GP",
        aliases: &["nurburgring", "nurburgring gp", "nurburgring grand prix"],
        length_m: 5137.,
        pit_lane_length_m: 400.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.97,
        typical_stationary_time_s: 25.,
        pit_lane_time_delta_s: 21.,
        drs_zones: &[TrackZone::new(0.85, 0.95)],
        overtaking_zones: &[TrackZone::new(0.02, 0.06), TrackZone::new(0.9, 0.95)],
    },
    TrackRecord {
        name: "Brands Hatch GP",
        aliases: &["brands hatch", "brands hatch gp"],
        length_m: 3908.,
        pit_lane_length_m: 320.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.95,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 19.,
        drs_zones: &[],
        overtaking_zones: &[TrackZone::new(0.0, 0.08)],
    },
    TrackRecord {
        name: "Barcelona",
        aliases: &["circuit de barcelona catalunya", "catalunya"],
        length_m: 4657.,
        pit_lane_length_m: 390.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.97,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 22.,
        drs_zones: &[TrackZone::new(0.0, 0.12)],
        overtaking_zones: &[TrackZone::new(0.0, 0.05)],
    },
    TrackRecord {
        name: "Suzuka",
        aliases: &["suzuka circuit"],
        length_m: 5807.,
        pit_lane_length_m: 400.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.97,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 22.,
        drs_zones: &[TrackZone::new(0.0, 0.08)],
        overtaking_zones: &[TrackZone::new(0.0, 0.05), TrackZone::new(0.93, 0.97)],
    },
    TrackRecord {
        name: "Laguna Seca",
        aliases: &["weathertech raceway laguna seca"],
        length_m: 3602.,
        pit_lane_length_m: 330.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.96,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 20.,
        drs_zones: &[],
        overtaking_zones: &[TrackZone::new(0.05, 0.12)],
    },
    TrackRecord {
        name: "Mount Panorama",
        aliases: &["bathurst", "mount panorama circuit"],
        length_m: 6213.,
        pit_lane_length_m: 450.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.98,
        typical_stationary_time_s: 25.,
        pit_lane_time_delta_s: 24.,
        drs_zones: &[],
        overtaking_zones: &[TrackZone::new(0.0, 0.06), TrackZone::new(0.8, 0.9)],
    },
    TrackRecord {
        name: "Zandvoort",
        aliases: &["circuit zandvoort"],
        length_m: 4259.,
        pit_lane_length_m: 380.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.96,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 21.,
        drs_zones: &[TrackZone::new(0.0, 0.1)],
        overtaking_zones: &[TrackZone::new(0.0, 0.06)],
    },
    TrackRecord {
        name: "Imola",
        aliases: &["autodromo enzo e dino ferrari"],
        length_m: 4909.,
        pit_lane_length_m: 500.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.97,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 26.,
        drs_zones: &[TrackZone::new(0.0, 0.1)],
        overtaking_zones: &[TrackZone::new(0.06, 0.1)],
    },
    TrackRecord {
        name: "Hungaroring",
        aliases: &["hungaroring circuit"],
        length_m: 4381.,
        pit_lane_length_m: 370.,
        pit_speed_limit_kph: 60.,
        pit_entry_pct: 0.96,
        typical_stationary_time_s: 24.,
        pit_lane_time_delta_s: 20.,
        drs_zones: &[TrackZone::new(0.0, 0.1)],
        overtaking_zones: &[TrackZone::new(0.0, 0.06)],
    },
];

/// Lookup of track records by name, tolerant to the naming differences
/// between simulators.
pub struct TrackDatabase {
    tracks: HashMap<String, TrackData>,
    aliases: HashMap<String, String>,
    generic: TrackData,
}

impl Default for TrackDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackDatabase {
    pub fn new() -> Self {
        let mut database = Self {
            tracks: HashMap::new(),
            aliases: HashMap::new(),
            generic: GENERIC_TRACK.to_track_data(),
        };
        for record in KNOWN_TRACKS {
            database.insert(record);
        }
        database
    }

    fn insert(&mut self, record: &TrackRecord) {
        let key = normalize_track_name(record.name);
        for alias in record.aliases {
            self.aliases.insert(normalize_track_name(alias), key.clone());
        }
        self.tracks.insert(key, record.to_track_data());
    }

    /// Track record for `track_name`, or the generic fallback when unknown.
    pub fn lookup(&self, track_name: &str) -> &TrackData {
        let normalized = normalize_track_name(track_name);
        let key = self.aliases.get(&normalized).unwrap_or(&normalized);

        match self.tracks.get(key) {
            Some(data) => {
                debug!("Resolved track '{}' to '{}'", track_name, data.name);
                data
            }
            None => {
                warn!("Unknown track '{}', using generic track data", track_name);
                &self.generic
            }
        }
    }
}

/// Lowercases, turns separators into spaces and drops everything but
/// letters, digits and single spaces.
fn normalize_track_name(track_name: &str) -> String {
    track_name
        .trim()
        .to_lowercase()
        .replace('ü', "u")
        .replace(['_', '-'], " ")
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_track_name() {
        assert_eq!(normalize_track_name("Spa-Francorchamps"), "spa francorchamps");
        assert_eq!(normalize_track_name("  brands_hatch  "), "brands hatch");
        assert_eq!(normalize_track_name("Nürburgring GP"), "nurburgring gp");
        assert_eq!(normalize_track_name("Monza (2024)"), "monza 2024");
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let database = TrackDatabase::new();
        assert_eq!(database.lookup("Monza").name, "Monza");
        assert_eq!(database.lookup("spa").name, "Spa-Francorchamps");
        assert_eq!(database.lookup("BATHURST").name, "Mount Panorama");
        assert_eq!(database.lookup("nurburgring").name, "Nürburgring GP");
        assert_eq!(database.lookup("silverstone").name, "Silverstone GP");
        assert_eq!(database.tracks.len(), KNOWN_TRACKS.len());
    }

    #[test]
    fn test_unknown_track_falls_back_to_generic() {
        let database = TrackDatabase::new();
        let data = database.lookup("Some Club Circuit");
        assert_eq!(data.name, GENERIC_TRACK_NAME);
        assert!(data.length_m > 0.);
    }

    #[test]
    fn test_pit_lane_travel_time() {
        let database = TrackDatabase::new();
        // 420 m at 60 km/h
        let travel = database.lookup("Monza").pit_lane_travel_time_s();
        assert!((travel - 25.2).abs() < 1e-3);

        let mut data = database.lookup("Monza").clone();
        data.pit_speed_limit_kph = 0.;
        assert_eq!(data.pit_lane_travel_time_s(), 0.);
    }

    #[test]
    fn test_overtaking_zones() {
        let database = TrackDatabase::new();
        let spa = database.lookup("Spa-Francorchamps");
        assert!(spa.is_overtaking_zone(0.1));
        assert!(!spa.is_overtaking_zone(0.5));
    }

    #[test]
    fn test_lap_time_at_speed() {
        let database = TrackDatabase::new();
        let monza = database.lookup("Monza");
        // 5793 m at 231.72 km/h is 90 s
        let lap_time = monza.lap_time_at_s(231.72).unwrap_or_default();
        assert!((lap_time - 90.).abs() < 1e-2);
        assert_eq!(monza.lap_time_at_s(0.), None);
    }

    #[test]
    fn test_distance_to_pit_entry_wraps() {
        let database = TrackDatabase::new();
        let monza = database.lookup("Monza");
        assert!((monza.distance_to_pit_entry_m(0.5) - 0.46 * 5793.).abs() < 0.5);
        // just past the entry line means a full lap to go
        assert!((monza.distance_to_pit_entry_m(0.97) - 0.99 * 5793.).abs() < 0.5);
    }
}
