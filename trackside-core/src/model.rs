//! Unified telemetry data model
//!
//! Defines the structures every simulator adapter writes into: the local
//! car, the session (including the entry list of all cars) and the game
//! state. Raw simulator values arrive through `from_raw` constructors so
//! unknown values decode to a safe default instead of failing.

use crate::units::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Supported simulators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Game {
    AssettoCorsa1,
    AssettoCorsaCompetizione,
    IRacing,
    RaceRoom,
    Automobilista2,
    EuroTruckSimulator2,
    AmericanTruckSimulator,
    /// Built-in synthetic telemetry, no external process
    Demo,
}

impl Game {
    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            Game::AssettoCorsa1 => "Assetto Corsa",
            Game::AssettoCorsaCompetizione => "Assetto Corsa Competizione",
            Game::IRacing => "iRacing",
            Game::RaceRoom => "RaceRoom Racing Experience",
            Game::Automobilista2 => "Automobilista 2",
            Game::EuroTruckSimulator2 => "Euro Truck Simulator 2",
            Game::AmericanTruckSimulator => "American Truck Simulator",
            Game::Demo => "Demo",
        }
    }

    /// Process executable names used for detection (without path)
    pub fn executables(&self) -> &'static [&'static str] {
        match self {
            Game::AssettoCorsa1 => &["acs.exe", "acs_x86.exe"],
            Game::AssettoCorsaCompetizione => &["AC2-Win64-Shipping.exe"],
            Game::IRacing => &["iRacingSim64DX11.exe", "iRacingSim64.exe"],
            Game::RaceRoom => &["RRRE.exe", "RRRE64.exe"],
            Game::Automobilista2 => &["AMS2.exe", "AMS2AVX.exe"],
            Game::EuroTruckSimulator2 => &["eurotrucks2.exe"],
            Game::AmericanTruckSimulator => &["amtrucks.exe"],
            Game::Demo => &[],
        }
    }

    /// Every detectable simulator (the demo source is selected
    /// explicitly, never detected)
    pub fn all() -> &'static [Game] {
        &[
            Game::AssettoCorsa1,
            Game::AssettoCorsaCompetizione,
            Game::IRacing,
            Game::RaceRoom,
            Game::Automobilista2,
            Game::EuroTruckSimulator2,
            Game::AmericanTruckSimulator,
        ]
    }
}

/// RGBA color, used for car-class colors and overlay themes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 160, 0);
    pub const ORANGE: Color = Color::rgb(255, 135, 0);
    pub const RED: Color = Color::rgb(200, 0, 0);
    pub const LIME_GREEN: Color = Color::rgb(50, 205, 50);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

// === Local car ===

/// State of the player's car, written by the active adapter each frame
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LocalCarData {
    pub engine: EngineData,
    pub tyres: TyreData,
    pub timing: LapTimingData,
    pub inputs: InputsData,
    pub race: RaceData,
    /// Planar world coordinates of the car, used for track mapping;
    /// zero when the simulator does not expose them
    pub world_position: [f32; 2],
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EngineData {
    pub fuel_liters: Liters,
    pub max_fuel_liters: Liters,
    /// Average fuel burned per lap as reported or derived by the simulator
    pub fuel_liters_per_lap: Liters,
    /// Estimated laps the remaining fuel lasts
    pub fuel_estimated_laps: f32,
    pub rpm: Rpm,
    pub max_rpm: Rpm,
}

/// Per-wheel arrays are ordered FL, FR, RL, RR
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TyreData {
    pub slip_ratio: [f32; 4],
    pub pressures: [Kilopascals; 4],
    pub core_temperatures: [Celsius; 4],
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LapTimingData {
    /// Running time of the lap in progress; absent between laps
    pub current_laptime_ms: Option<i32>,
    pub best_laptime_ms: Option<i32>,
    pub last_laptime_ms: Option<i32>,
    /// Completed sector splits of the current lap, up to 3 entries
    pub sector_splits_ms: Vec<i32>,
    /// Live delta to the personal best lap, negative is faster
    pub lap_delta_to_best_ms: f32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InputsData {
    pub throttle: Percentage,
    pub brake: Percentage,
    /// Normalized steering, -1 full left .. +1 full right
    pub steering: f32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RaceData {
    pub laps_driven: i32,
    pub class_position: i32,
    pub global_position: i32,
    /// Remaining driver stint time. `None` when the session has no stint
    /// limit; simulators that report sentinel values decode to `None`.
    pub stint_time_left_ms: Option<i32>,
}

// === Session ===

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub weather: WeatherConditions,
    pub track: TrackInfo,
    pub session_type: RaceSessionType,
    pub phase: SessionPhase,
    pub session_time_left_secs: f64,
    pub flag: RaceFlag,
    /// Game assigned index of the player car; not stable across sessions
    pub player_car_index: i32,
    /// Car currently focused, e.g. in replays or spectating
    pub focused_car_index: i32,
    pub is_setup_menu_visible: bool,
    pub cars: EntryList,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub air_temperature: Celsius,
    pub wind_speed: KilometersPerHour,
    /// Wind direction in radians
    pub wind_direction: f32,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track name the way the game provides it
    pub game_name: String,
    pub temperature: Celsius,
    pub length_meters: i32,
}

// === Entry list ===

/// Car-index to [`CarInfo`] mapping shared between the telemetry writer
/// and overlay readers.
///
/// `add_or_update` is the only mutator. Readers take a [`snapshot`]
/// (owned copy) before sorting or iterating, so mutation during iteration
/// cannot fail; the internal lock is held only for the copy itself.
///
/// [`snapshot`]: EntryList::snapshot
#[derive(Debug, Default, Clone)]
pub struct EntryList {
    cars: Arc<Mutex<HashMap<i32, CarInfo>>>,
}

impl EntryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the car at `car_index`. Last write wins.
    pub fn add_or_update(&self, car_index: i32, car: CarInfo) {
        self.cars
            .lock()
            .expect("entry list lock poisoned")
            .insert(car_index, car);
    }

    pub fn get(&self, car_index: i32) -> Option<CarInfo> {
        self.cars
            .lock()
            .expect("entry list lock poisoned")
            .get(&car_index)
            .cloned()
    }

    /// Owned copy of the current entries for lock-free iteration
    pub fn snapshot(&self) -> Vec<(i32, CarInfo)> {
        self.cars
            .lock()
            .expect("entry list lock poisoned")
            .iter()
            .map(|(idx, car)| (*idx, car.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cars.lock().expect("entry list lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cars.lock().expect("entry list lock poisoned").clear();
    }
}

impl Serialize for EntryList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries = self.snapshot();
        entries.sort_by_key(|(idx, _)| *idx);
        entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EntryList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries: Vec<(i32, CarInfo)> = Vec::deserialize(deserializer)?;
        let list = EntryList::new();
        for (idx, car) in entries {
            list.add_or_update(idx, car);
        }
        Ok(list)
    }
}

/// One entry-list car as reported by the simulator
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CarInfo {
    pub race_number: i32,
    pub car_class: String,
    pub current_lap: LapInfo,
    pub last_lap: LapInfo,
    pub fastest_lap: LapInfo,
    /// Overall position as reported by the simulator
    pub position: i32,
    /// Classification position, may lag true on-track order
    pub cup_position: i32,
    /// Laps started by this car
    pub lap_index: i32,
    /// Normalized 0..1 distance around the centerline
    pub track_percent_completed: f32,
    pub kmh: f32,
    pub gap_to_class_leader_ms: i32,
    pub gap_to_player_ms: i32,
    pub drivers: Vec<DriverInfo>,
    pub current_driver_index: usize,
    pub car_location: CarLocation,
}

impl CarInfo {
    /// The driver currently in the car, if the entry has any drivers
    pub fn current_driver(&self) -> Option<&DriverInfo> {
        self.drivers
            .get(self.current_driver_index)
            .or_else(|| self.drivers.first())
    }

    /// Race progress used for live standings: whole laps plus a tenth of
    /// the spline position, so a car one lap down can never out-rank a
    /// car ahead of it.
    pub fn race_progress(&self) -> f32 {
        self.lap_index as f32 + self.track_percent_completed / 10.0
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapInfo {
    /// Total lap time; absent until the lap completes
    pub laptime_ms: Option<i32>,
    /// Per-sector splits, 3 entries once the lap is fully timed
    pub splits_ms: Vec<i32>,
    pub is_invalid: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DriverInfo {
    pub name: String,
    /// License/category string, e.g. an iRacing license class
    pub category: String,
    pub rating: i32,
}

// === Game ===

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub game: Option<Game>,
    pub status: SimStatus,
}

// === Raw-decoded enums ===
//
// Values arrive as integers from shared memory or packets; decoding maps
// anything unknown to a safe default and behavior is always gated with
// explicit matches, never by indexing on the raw value.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceSessionType {
    Practice,
    Qualifying,
    Superpole,
    Race,
    Hotlap,
    Hotstint,
    HotlapSuperpole,
    Replay,
    #[default]
    Unknown,
}

impl RaceSessionType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => RaceSessionType::Practice,
            4 => RaceSessionType::Qualifying,
            9 => RaceSessionType::Superpole,
            10 => RaceSessionType::Race,
            11 => RaceSessionType::Hotlap,
            12 => RaceSessionType::Hotstint,
            13 => RaceSessionType::HotlapSuperpole,
            14 => RaceSessionType::Replay,
            _ => RaceSessionType::Unknown,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    None,
    Starting,
    PreFormation,
    FormationLap,
    PreSession,
    Session,
    SessionOver,
    PostSession,
    ResultUi,
}

impl SessionPhase {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => SessionPhase::Starting,
            2 => SessionPhase::PreFormation,
            3 => SessionPhase::FormationLap,
            4 => SessionPhase::PreSession,
            5 => SessionPhase::Session,
            6 => SessionPhase::SessionOver,
            7 => SessionPhase::PostSession,
            8 => SessionPhase::ResultUi,
            _ => SessionPhase::None,
        }
    }
}

/// Coarse simulator status, drives the default should-render gate
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimStatus {
    #[default]
    Off,
    Replay,
    Live,
    Pause,
}

impl SimStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => SimStatus::Replay,
            2 => SimStatus::Live,
            3 => SimStatus::Pause,
            _ => SimStatus::Off,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceFlag {
    #[default]
    None,
    Green,
    Blue,
    Yellow,
    Red,
    Black,
    White,
    Checkered,
}

impl RaceFlag {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => RaceFlag::Green,
            2 => RaceFlag::Blue,
            3 => RaceFlag::Yellow,
            4 => RaceFlag::Red,
            5 => RaceFlag::Black,
            6 => RaceFlag::White,
            7 => RaceFlag::Checkered,
            _ => RaceFlag::None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarLocation {
    #[default]
    None,
    Track,
    Pitlane,
    PitEntry,
    PitExit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn car(number: i32) -> CarInfo {
        CarInfo {
            race_number: number,
            car_class: "GT3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_or_update_last_write_wins() {
        let list = EntryList::new();
        list.add_or_update(3, car(17));
        list.add_or_update(3, car(42));

        assert_eq!(list.len(), 1);
        assert_eq!(list.get(3).unwrap().race_number, 42);
    }

    #[test]
    fn test_snapshot_is_detached_from_mutation() {
        let list = EntryList::new();
        list.add_or_update(1, car(7));

        let snap = list.snapshot();
        list.add_or_update(2, car(8));
        list.clear();

        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].1.race_number, 7);
    }

    #[test]
    fn test_concurrent_iteration_and_mutation() {
        let list = EntryList::new();
        for i in 0..16 {
            list.add_or_update(i, car(i));
        }

        let writer = {
            let list = list.clone();
            thread::spawn(move || {
                for round in 0..200 {
                    for i in 0..16 {
                        list.add_or_update(i, car(i + round));
                    }
                }
            })
        };

        for _ in 0..200 {
            let snap = list.snapshot();
            assert_eq!(snap.len(), 16);
            // Sorting the copy must be safe while the writer keeps going
            let mut sorted = snap;
            sorted.sort_by_key(|(idx, _)| *idx);
        }

        writer.join().unwrap();
    }

    #[test]
    fn test_race_progress_ranks_laps_over_spline() {
        let mut leader = car(1);
        leader.lap_index = 4;
        leader.track_percent_completed = 0.95;

        let mut chaser = car(2);
        chaser.lap_index = 3;
        chaser.track_percent_completed = 0.2;

        assert!(leader.race_progress() > chaser.race_progress());
    }

    #[test]
    fn test_session_type_from_raw_unknown_is_safe() {
        assert_eq!(RaceSessionType::from_raw(10), RaceSessionType::Race);
        assert_eq!(RaceSessionType::from_raw(99), RaceSessionType::Unknown);
        assert_eq!(RaceSessionType::from_raw(-3), RaceSessionType::Unknown);
    }

    #[test]
    fn test_session_phase_from_raw() {
        assert_eq!(SessionPhase::from_raw(5), SessionPhase::Session);
        assert_eq!(SessionPhase::from_raw(0), SessionPhase::None);
        assert_eq!(SessionPhase::from_raw(42), SessionPhase::None);
    }

    #[test]
    fn test_current_driver_tolerates_bad_index() {
        let mut info = car(9);
        assert!(info.current_driver().is_none());

        info.drivers.push(DriverInfo {
            name: "A. Driver".to_string(),
            ..Default::default()
        });
        info.current_driver_index = 5;
        assert_eq!(info.current_driver().unwrap().name, "A. Driver");
    }

    #[test]
    fn test_entry_list_serde_roundtrip() {
        let list = EntryList::new();
        let mut c = car(11);
        c.lap_index = 3;
        list.add_or_update(4, c);

        let json = serde_json::to_string(&list).unwrap();
        let back: EntryList = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(4).unwrap().race_number, 11);
        assert_eq!(back.get(4).unwrap().lap_index, 3);
    }

    #[test]
    fn test_lap_info_defaults_absent() {
        let lap = LapInfo::default();
        assert!(lap.laptime_ms.is_none());
        assert!(lap.splits_ms.is_empty());
        assert!(!lap.is_invalid);
    }
}
