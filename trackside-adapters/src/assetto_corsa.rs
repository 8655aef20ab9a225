//! Assetto Corsa adapter
//!
//! Reads the three `acpmf_*` shared-memory pages. The page structs below
//! are layout-compatible prefixes of the vendor blocks; anything past the
//! fields used here is left unmapped and zero-fills on short reads.

use crate::source::{Pod, SharedMemoryView};
use std::time::{Duration, Instant};
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::*;
use trackside_core::units::*;

const PHYSICS_PAGE: &str = "Local\\acpmf_physics";
const GRAPHICS_PAGE: &str = "Local\\acpmf_graphics";
const STATIC_PAGE: &str = "Local\\acpmf_static";

/// Telemetry counts as live while the packet id keeps advancing
const FRESHNESS_WINDOW: Duration = Duration::from_secs(2);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct PhysicsPage {
    packet_id: i32,
    gas: f32,
    brake: f32,
    fuel: f32,
    gear: i32,
    rpms: i32,
    steer_angle: f32,
    speed_kmh: f32,
    velocity: [f32; 3],
    acc_g: [f32; 3],
    wheel_slip: [f32; 4],
    wheel_load: [f32; 4],
    wheels_pressure: [f32; 4],
    wheel_angular_speed: [f32; 4],
    tyre_wear: [f32; 4],
    tyre_dirty_level: [f32; 4],
    tyre_core_temperature: [f32; 4],
    camber_rad: [f32; 4],
    suspension_travel: [f32; 4],
    drs: f32,
    tc: f32,
    heading: f32,
    pitch: f32,
    roll: f32,
    cg_height: f32,
    car_damage: [f32; 5],
    number_of_tyres_out: i32,
    pit_limiter_on: i32,
    abs: f32,
    kers_charge: f32,
    kers_input: f32,
    auto_shifter_on: i32,
    ride_height: [f32; 2],
    turbo_boost: f32,
    ballast: f32,
    air_density: f32,
    air_temp: f32,
    road_temp: f32,
}

unsafe impl Pod for PhysicsPage {}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct GraphicsPage {
    packet_id: i32,
    status: i32,
    session: i32,
    current_time: [u16; 15],
    last_time: [u16; 15],
    best_time: [u16; 15],
    split: [u16; 15],
    completed_laps: i32,
    position: i32,
    i_current_time: i32,
    i_last_time: i32,
    i_best_time: i32,
    session_time_left: f32,
    distance_traveled: f32,
    is_in_pit: i32,
    current_sector_index: i32,
    last_sector_time: i32,
    number_of_laps: i32,
    tyre_compound: [u16; 33],
    replay_time_multiplier: f32,
    normalized_car_position: f32,
    active_cars: i32,
    car_coordinates: [[f32; 3]; 60],
    car_id: [i32; 60],
    player_car_id: i32,
    penalty_time: f32,
    flag: i32,
    penalty: i32,
    ideal_line_on: i32,
    is_in_pit_line: i32,
    surface_grip: f32,
    mandatory_pit_done: i32,
    wind_speed: f32,
    wind_direction: f32,
    is_setup_menu_visible: i32,
    main_display_index: i32,
    secondary_display_index: i32,
    tc: i32,
    tc_cut: i32,
    engine_map: i32,
    abs: i32,
    fuel_x_lap: f32,
    rain_lights: i32,
    flashing_lights: i32,
    lights_stage: i32,
    exhaust_temperature: f32,
    wiper_lv: i32,
    driver_stint_total_time_left: i32,
    driver_stint_time_left: i32,
    rain_tyres: i32,
}

unsafe impl Pod for GraphicsPage {}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct StaticPage {
    sm_version: [u16; 15],
    ac_version: [u16; 15],
    number_of_sessions: i32,
    num_cars: i32,
    car_model: [u16; 33],
    track: [u16; 33],
    player_name: [u16; 33],
    player_surname: [u16; 33],
    player_nick: [u16; 33],
    sector_count: i32,
    max_torque: f32,
    max_power: f32,
    max_rpm: i32,
    max_fuel: f32,
    suspension_max_travel: [f32; 4],
    tyre_radius: [f32; 4],
    max_turbo_boost: f32,
    deprecated_1: f32,
    deprecated_2: f32,
    penalties_enabled: i32,
    aid_fuel_rate: f32,
    aid_tire_rate: f32,
    aid_mechanical_damage: f32,
    aid_allow_tyre_blankets: i32,
    aid_stability: f32,
    aid_auto_clutch: i32,
    aid_auto_blip: i32,
    has_drs: i32,
    has_ers: i32,
    has_kers: i32,
    kers_max_j: f32,
    engine_brake_settings_count: i32,
    ers_power_controller_count: i32,
    track_spline_length: f32,
}

unsafe impl Pod for StaticPage {}

/// Decode a null-terminated UTF-16 page string
fn page_string(chars: &[u16]) -> String {
    let len = chars.iter().position(|&c| c == 0).unwrap_or(chars.len());
    String::from_utf16_lossy(&chars[..len])
}

fn session_type_from_ac(raw: i32) -> RaceSessionType {
    // AC_PRACTICE..AC_DRAG in the vendor's session enum
    match raw {
        0 => RaceSessionType::Practice,
        1 => RaceSessionType::Qualifying,
        2 => RaceSessionType::Race,
        3 => RaceSessionType::Hotlap,
        _ => RaceSessionType::Unknown,
    }
}

fn flag_from_ac(raw: i32) -> RaceFlag {
    match raw {
        1 => RaceFlag::Blue,
        2 => RaceFlag::Yellow,
        3 => RaceFlag::Black,
        4 => RaceFlag::White,
        5 => RaceFlag::Checkered,
        _ => RaceFlag::None,
    }
}

/// Absent lap time is reported as 0 or i32::MAX depending on page version
fn laptime(raw: i32) -> Option<i32> {
    (raw > 0 && raw != i32::MAX).then_some(raw)
}

pub struct AssettoCorsaAdapter {
    physics: Option<SharedMemoryView>,
    graphics: Option<SharedMemoryView>,
    statics: Option<SharedMemoryView>,
    last_packet_id: i32,
    last_fresh: Option<Instant>,
}

impl AssettoCorsaAdapter {
    pub fn new() -> Self {
        Self {
            physics: None,
            graphics: None,
            statics: None,
            last_packet_id: 0,
            last_fresh: None,
        }
    }

    fn connect(&mut self) -> bool {
        if self.physics.is_none() {
            self.physics =
                SharedMemoryView::connect(PHYSICS_PAGE, std::mem::size_of::<PhysicsPage>());
        }
        if self.graphics.is_none() {
            self.graphics =
                SharedMemoryView::connect(GRAPHICS_PAGE, std::mem::size_of::<GraphicsPage>());
        }
        if self.statics.is_none() {
            self.statics =
                SharedMemoryView::connect(STATIC_PAGE, std::mem::size_of::<StaticPage>());
        }
        self.physics.is_some() && self.graphics.is_some()
    }

    fn apply(
        &self,
        phys: &PhysicsPage,
        gfx: &GraphicsPage,
        stat: Option<&StaticPage>,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        car.inputs.throttle = Percentage::new(phys.gas);
        car.inputs.brake = Percentage::new(phys.brake);
        car.inputs.steering = phys.steer_angle.clamp(-1.0, 1.0);

        car.engine.fuel_liters = Liters(phys.fuel);
        car.engine.fuel_liters_per_lap = Liters(gfx.fuel_x_lap);
        car.engine.fuel_estimated_laps = if gfx.fuel_x_lap > 0.0 {
            phys.fuel / gfx.fuel_x_lap
        } else {
            0.0
        };
        car.engine.rpm = Rpm(phys.rpms as f32);

        car.tyres.slip_ratio = phys.wheel_slip;
        for i in 0..4 {
            car.tyres.pressures[i] = Kilopascals(phys.wheels_pressure[i] * 6.894_76);
            car.tyres.core_temperatures[i] = Celsius(phys.tyre_core_temperature[i]);
        }

        car.timing.current_laptime_ms = laptime(gfx.i_current_time);
        car.timing.last_laptime_ms = laptime(gfx.i_last_time);
        car.timing.best_laptime_ms = laptime(gfx.i_best_time);
        if gfx.last_sector_time > 0 && gfx.current_sector_index > 0 {
            let sector = gfx.current_sector_index as usize - 1;
            if car.timing.sector_splits_ms.len() == sector {
                car.timing.sector_splits_ms.push(gfx.last_sector_time);
            }
        }
        if gfx.completed_laps != car.race.laps_driven {
            car.timing.sector_splits_ms.clear();
        }

        car.race.laps_driven = gfx.completed_laps;
        car.race.global_position = gfx.position;
        car.race.class_position = gfx.position;
        // The page reports sentinel values when no stint limit is active
        car.race.stint_time_left_ms =
            (gfx.driver_stint_time_left > 0).then_some(gfx.driver_stint_time_left);

        session.session_type = session_type_from_ac(gfx.session);
        session.phase = if gfx.status == 2 {
            SessionPhase::Session
        } else {
            SessionPhase::None
        };
        session.session_time_left_secs = f64::from(gfx.session_time_left.max(0.0)) / 1000.0;
        session.flag = flag_from_ac(gfx.flag);
        session.player_car_index = gfx.player_car_id;
        session.focused_car_index = gfx.player_car_id;
        session.is_setup_menu_visible = gfx.is_setup_menu_visible != 0;
        session.weather.wind_speed = KilometersPerHour(gfx.wind_speed);
        session.weather.wind_direction = gfx.wind_direction;

        if let Some(stat) = stat {
            session.track.game_name = page_string(&stat.track);
            session.track.length_meters = stat.track_spline_length as i32;
            car.engine.max_fuel_liters = Liters(stat.max_fuel);
            car.engine.max_rpm = Rpm(stat.max_rpm as f32);
        }
        session.weather.air_temperature = Celsius(phys.air_temp);
        session.track.temperature = Celsius(phys.road_temp);

        for i in 0..gfx.active_cars.clamp(0, 60) as usize {
            if gfx.car_id[i] == gfx.player_car_id {
                car.world_position = [gfx.car_coordinates[i][0], gfx.car_coordinates[i][2]];
                break;
            }
        }

        // AC1 exposes per-car data for the player only; other cars are
        // coordinates without timing, so the entry list carries just the
        // player entry here.
        let mut player = session.cars.get(gfx.player_car_id).unwrap_or_default();
        player.race_number = gfx.player_car_id;
        player.position = gfx.position;
        player.cup_position = gfx.position;
        player.lap_index = gfx.completed_laps;
        player.track_percent_completed = gfx.normalized_car_position.clamp(0.0, 1.0);
        player.kmh = phys.speed_kmh;
        player.current_lap.laptime_ms = laptime(gfx.i_current_time);
        player.last_lap.laptime_ms = laptime(gfx.i_last_time);
        player.fastest_lap.laptime_ms = laptime(gfx.i_best_time);
        player.car_location = if gfx.is_in_pit != 0 {
            CarLocation::Pitlane
        } else if gfx.is_in_pit_line != 0 {
            CarLocation::PitEntry
        } else {
            CarLocation::Track
        };
        session.cars.add_or_update(gfx.player_car_id, player);

        game.game = Some(Game::AssettoCorsa1);
        game.status = SimStatus::from_raw(gfx.status);
    }
}

impl Default for AssettoCorsaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorAdapter for AssettoCorsaAdapter {
    fn game(&self) -> Game {
        Game::AssettoCorsa1
    }

    fn update(
        &mut self,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        if !self.connect() {
            return;
        }
        let (Some(physics), Some(graphics)) = (self.physics.as_ref(), self.graphics.as_ref())
        else {
            return;
        };

        let phys: PhysicsPage = physics.read();
        let gfx: GraphicsPage = graphics.read();
        let stat: Option<StaticPage> = self.statics.as_ref().map(SharedMemoryView::read);

        if phys.packet_id != self.last_packet_id {
            self.last_packet_id = phys.packet_id;
            self.last_fresh = Some(Instant::now());
        } else if phys.packet_id == 0 {
            // Zeroed page: the sim created the block but runs no session
            return;
        }

        self.apply(&phys, &gfx, stat.as_ref(), car, session, game);
    }

    fn has_telemetry(&self) -> bool {
        self.last_fresh
            .map(|at| at.elapsed() < FRESHNESS_WINDOW)
            .unwrap_or(false)
    }

    fn stop(&mut self) {
        self.physics = None;
        self.graphics = None;
        self.statics = None;
        self.last_fresh = None;
    }

    fn car_classes(&self) -> Vec<String> {
        vec!["AC".to_string()]
    }
}
