//! RaceRoom Racing Experience adapter
//!
//! Reads the `$R3E` shared-memory block. The struct below mirrors the
//! control flags and the player/session sections consumed here; RaceRoom
//! reports rotational engine speed in rad/s and pressures in kPa.

use crate::source::{Pod, SharedMemoryView};
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::*;
use trackside_core::units::*;

const SHARED_MEMORY_NAME: &str = "$R3E";

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct R3eShared {
    version_major: i32,
    version_minor: i32,
    all_drivers_offset: i32,
    driver_data_size: i32,

    game_paused: i32,
    game_in_menus: i32,
    game_in_replay: i32,
    game_using_vr: i32,

    // Session block
    session_type: i32,
    session_phase: i32,
    session_time_remaining: f32,
    number_of_laps: i32,
    track_name: [u8; 64],
    layout_length: f32,
    ambient_temperature: f32,
    track_temperature: f32,
    wind_speed: f32,
    wind_direction: f32,
    flag_sector: i32,

    // Player block
    completed_laps: i32,
    position: i32,
    position_class: i32,
    lap_distance_fraction: f32,
    car_speed: f32,
    engine_rps: f32,
    max_engine_rps: f32,
    fuel_left: f32,
    fuel_capacity: f32,
    fuel_per_lap: f32,
    throttle: f32,
    brake: f32,
    steer_input_raw: f32,
    lap_time_current_self: f32,
    lap_time_previous_self: f32,
    lap_time_best_self: f32,
    time_delta_best_self: f32,
    tire_pressure: [f32; 4],
    tire_temp: [f32; 4],
    in_pitlane: i32,
}

unsafe impl Pod for R3eShared {}

fn utf8_name(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

/// R3E session types: 0 practice, 1 qualify, 2 race, 3 warmup
fn session_type_from_r3e(raw: i32) -> RaceSessionType {
    match raw {
        0 | 3 => RaceSessionType::Practice,
        1 => RaceSessionType::Qualifying,
        2 => RaceSessionType::Race,
        _ => RaceSessionType::Unknown,
    }
}

/// R3E phases: 1 garage, 2 gridwalk, 3 formation, 4 countdown, 5 green, 6 checkered
fn phase_from_r3e(raw: i32) -> SessionPhase {
    match raw {
        1 => SessionPhase::PreSession,
        2 => SessionPhase::Starting,
        3 => SessionPhase::FormationLap,
        4 => SessionPhase::PreFormation,
        5 => SessionPhase::Session,
        6 => SessionPhase::SessionOver,
        _ => SessionPhase::None,
    }
}

/// R3E reports -1 for unavailable times, in seconds otherwise
fn laptime_from_secs(raw: f32) -> Option<i32> {
    (raw > 0.0).then(|| (raw * 1000.0) as i32)
}

pub struct RaceRoomAdapter {
    view: Option<SharedMemoryView>,
    last_session_tick: f32,
    fresh: bool,
}

impl RaceRoomAdapter {
    pub fn new() -> Self {
        Self {
            view: None,
            last_session_tick: -1.0,
            fresh: false,
        }
    }

    fn apply(
        &self,
        shared: &R3eShared,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        car.inputs.throttle = Percentage::new(shared.throttle);
        car.inputs.brake = Percentage::new(shared.brake);
        car.inputs.steering = shared.steer_input_raw.clamp(-1.0, 1.0);

        car.engine.rpm = Rpm::from_rps(shared.engine_rps);
        car.engine.max_rpm = Rpm::from_rps(shared.max_engine_rps);
        car.engine.fuel_liters = Liters(shared.fuel_left);
        car.engine.max_fuel_liters = Liters(shared.fuel_capacity);
        car.engine.fuel_liters_per_lap = Liters(shared.fuel_per_lap);
        car.engine.fuel_estimated_laps = if shared.fuel_per_lap > 0.0 {
            shared.fuel_left / shared.fuel_per_lap
        } else {
            0.0
        };

        car.tyres.pressures = shared.tire_pressure.map(Kilopascals);
        car.tyres.core_temperatures = shared.tire_temp.map(Celsius);

        car.timing.current_laptime_ms = laptime_from_secs(shared.lap_time_current_self);
        car.timing.last_laptime_ms = laptime_from_secs(shared.lap_time_previous_self);
        car.timing.best_laptime_ms = laptime_from_secs(shared.lap_time_best_self);
        car.timing.lap_delta_to_best_ms = shared.time_delta_best_self * 1000.0;

        car.race.laps_driven = shared.completed_laps.max(0);
        car.race.global_position = shared.position;
        car.race.class_position = shared.position_class;
        car.race.stint_time_left_ms = None;

        session.session_type = session_type_from_r3e(shared.session_type);
        session.phase = phase_from_r3e(shared.session_phase);
        session.session_time_left_secs = f64::from(shared.session_time_remaining.max(0.0));
        session.track.game_name = utf8_name(&shared.track_name);
        session.track.length_meters = shared.layout_length as i32;
        session.track.temperature = Celsius(shared.track_temperature);
        session.weather.air_temperature = Celsius(shared.ambient_temperature);
        session.weather.wind_speed = KilometersPerHour(shared.wind_speed);
        session.weather.wind_direction = shared.wind_direction;
        session.flag = if shared.flag_sector > 0 {
            RaceFlag::Yellow
        } else {
            RaceFlag::Green
        };
        session.player_car_index = 0;
        session.focused_car_index = 0;

        let mut player = session.cars.get(0).unwrap_or_default();
        player.position = shared.position;
        player.cup_position = shared.position_class;
        player.lap_index = shared.completed_laps.max(0);
        player.track_percent_completed = shared.lap_distance_fraction.clamp(0.0, 1.0);
        player.kmh = shared.car_speed * 3.6;
        player.last_lap.laptime_ms = laptime_from_secs(shared.lap_time_previous_self);
        player.fastest_lap.laptime_ms = laptime_from_secs(shared.lap_time_best_self);
        player.car_location = if shared.in_pitlane != 0 {
            CarLocation::Pitlane
        } else {
            CarLocation::Track
        };
        session.cars.add_or_update(0, player);

        game.game = Some(Game::RaceRoom);
        game.status = if shared.game_in_replay != 0 {
            SimStatus::Replay
        } else if shared.game_paused != 0 {
            SimStatus::Pause
        } else {
            SimStatus::Live
        };
    }
}

impl Default for RaceRoomAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorAdapter for RaceRoomAdapter {
    fn game(&self) -> Game {
        Game::RaceRoom
    }

    fn update(
        &mut self,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        if self.view.is_none() {
            self.view =
                SharedMemoryView::connect(SHARED_MEMORY_NAME, std::mem::size_of::<R3eShared>());
        }
        let Some(view) = self.view.as_ref() else {
            self.fresh = false;
            return;
        };

        let shared: R3eShared = view.read();
        if shared.version_major == 0 && shared.version_minor == 0 {
            // Block exists but the sim has not written a frame yet
            self.fresh = false;
            return;
        }

        // The session clock only moves while the sim produces frames
        self.fresh = shared.session_time_remaining != self.last_session_tick
            || shared.game_paused != 0;
        self.last_session_tick = shared.session_time_remaining;

        self.apply(&shared, car, session, game);
    }

    fn has_telemetry(&self) -> bool {
        self.view.is_some() && self.fresh
    }

    fn stop(&mut self) {
        self.view = None;
        self.fresh = false;
        self.last_session_tick = -1.0;
    }
}
