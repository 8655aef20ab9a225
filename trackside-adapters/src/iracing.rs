//! iRacing adapter
//!
//! Decodes the irsdk shared-memory layout directly: a header describing
//! variable descriptors and triple-buffered value blocks, plus a YAML
//! session-info string that changes at its own (slower) cadence. Variable
//! extraction works on a copied byte buffer so a mid-copy tick change can
//! be detected and the frame skipped.

use crate::source::{read_struct_prefix, Pod, SharedMemoryView};
use serde::Deserialize;
use std::collections::HashMap;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::*;
use trackside_core::units::*;
use tracing::{debug, warn};

const MEM_MAP_NAME: &str = "Local\\IRSDKMemMapFileName";
const MAX_CARS: usize = 64;

// irsdk variable types
const VAR_CHAR: i32 = 0;
const VAR_BOOL: i32 = 1;
const VAR_INT: i32 = 2;
const VAR_BITFIELD: i32 = 3;
const VAR_FLOAT: i32 = 4;
const VAR_DOUBLE: i32 = 5;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct VarBuf {
    tick_count: i32,
    buf_offset: i32,
    pad: [i32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct IrsdkHeader {
    ver: i32,
    status: i32,
    tick_rate: i32,
    session_info_update: i32,
    session_info_len: i32,
    session_info_offset: i32,
    num_vars: i32,
    var_header_offset: i32,
    num_buf: i32,
    buf_len: i32,
    pad1: [i32; 2],
    var_buf: [VarBuf; 4],
}

unsafe impl Pod for IrsdkHeader {}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct VarHeaderRaw {
    var_type: i32,
    offset: i32,
    count: i32,
    count_as_time: u8,
    pad: [u8; 3],
    name: [u8; 32],
    desc: [u8; 64],
    unit: [u8; 32],
}

unsafe impl Pod for VarHeaderRaw {}

const VAR_HEADER_SIZE: usize = std::mem::size_of::<VarHeaderRaw>();

#[derive(Debug, Clone, Copy)]
struct VarDescriptor {
    var_type: i32,
    offset: usize,
    count: usize,
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

/// Typed access into one copied variable buffer
struct VarReader<'a> {
    descriptors: &'a HashMap<String, VarDescriptor>,
    buf: &'a [u8],
}

impl VarReader<'_> {
    fn slot(&self, name: &str, index: usize) -> Option<&VarDescriptor> {
        let desc = self.descriptors.get(name)?;
        (index < desc.count).then_some(desc)
    }

    fn f32_at(&self, name: &str, index: usize) -> Option<f32> {
        let desc = self.slot(name, index)?;
        if desc.var_type != VAR_FLOAT {
            return None;
        }
        let start = desc.offset + index * 4;
        let bytes = self.buf.get(start..start + 4)?;
        Some(f32::from_le_bytes(bytes.try_into().ok()?))
    }

    fn f64_at(&self, name: &str, index: usize) -> Option<f64> {
        let desc = self.slot(name, index)?;
        if desc.var_type != VAR_DOUBLE {
            return None;
        }
        let start = desc.offset + index * 8;
        let bytes = self.buf.get(start..start + 8)?;
        Some(f64::from_le_bytes(bytes.try_into().ok()?))
    }

    fn i32_at(&self, name: &str, index: usize) -> Option<i32> {
        let desc = self.slot(name, index)?;
        if desc.var_type != VAR_INT && desc.var_type != VAR_BITFIELD {
            return None;
        }
        let start = desc.offset + index * 4;
        let bytes = self.buf.get(start..start + 4)?;
        Some(i32::from_le_bytes(bytes.try_into().ok()?))
    }

    fn bool_at(&self, name: &str, index: usize) -> Option<bool> {
        let desc = self.slot(name, index)?;
        if desc.var_type != VAR_BOOL && desc.var_type != VAR_CHAR {
            return None;
        }
        self.buf.get(desc.offset + index).map(|&b| b != 0)
    }

    fn f32(&self, name: &str) -> Option<f32> {
        self.f32_at(name, 0)
    }

    fn f64(&self, name: &str) -> Option<f64> {
        self.f64_at(name, 0)
    }

    fn i32(&self, name: &str) -> Option<i32> {
        self.i32_at(name, 0)
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.bool_at(name, 0)
    }
}

// === Session-info YAML (subset) ===

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SessionInfoYaml {
    weekend_info: WeekendInfoYaml,
    session_info: SessionListYaml,
    driver_info: DriverInfoYaml,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WeekendInfoYaml {
    track_display_name: String,
    track_length: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SessionListYaml {
    sessions: Vec<SessionYaml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SessionYaml {
    session_num: i32,
    session_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DriverInfoYaml {
    driver_car_idx: i32,
    driver_car_fuel_max_ltr: f32,
    driver_car_red_line: f32,
    drivers: Vec<DriverYaml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DriverYaml {
    car_idx: i32,
    user_name: String,
    car_number_raw: i32,
    car_class_short_name: String,
    lic_string: String,
    #[serde(rename = "IRating")]
    i_rating: i32,
}

/// "3.70 km" -> meters
fn parse_track_length_meters(raw: &str) -> i32 {
    raw.split_whitespace()
        .next()
        .and_then(|n| n.parse::<f32>().ok())
        .map(|km| (km * 1000.0) as i32)
        .unwrap_or(0)
}

fn session_type_from_yaml(raw: &str) -> RaceSessionType {
    match raw {
        "Practice" | "Open Practice" | "Warmup" => RaceSessionType::Practice,
        "Qualify" | "Lone Qualify" | "Open Qualify" => RaceSessionType::Qualifying,
        "Race" => RaceSessionType::Race,
        _ => RaceSessionType::Unknown,
    }
}

/// irsdk SessionState values
fn phase_from_session_state(raw: i32) -> SessionPhase {
    match raw {
        1 | 2 => SessionPhase::Starting,
        3 => SessionPhase::FormationLap,
        4 => SessionPhase::Session,
        5 => SessionPhase::SessionOver,
        6 => SessionPhase::PostSession,
        _ => SessionPhase::None,
    }
}

fn seconds_to_ms(value: f32) -> Option<i32> {
    (value > 0.0).then(|| (value * 1000.0) as i32)
}

struct SessionCache {
    update_count: i32,
    info: SessionInfoYaml,
    classes: Vec<String>,
}

pub struct IRacingAdapter {
    view: Option<SharedMemoryView>,
    descriptors: HashMap<String, VarDescriptor>,
    frame: Vec<u8>,
    seen_tick: i32,
    session: Option<SessionCache>,
    connected: bool,
}

impl IRacingAdapter {
    pub fn new() -> Self {
        Self {
            view: None,
            descriptors: HashMap::new(),
            frame: Vec::new(),
            seen_tick: -1,
            session: None,
            connected: false,
        }
    }

    fn connect(&mut self) -> bool {
        if self.view.is_some() {
            return true;
        }

        // Map the header first to learn the region's real extent, then
        // remap the whole block.
        let header_len = std::mem::size_of::<IrsdkHeader>();
        let Some(probe) = SharedMemoryView::connect(MEM_MAP_NAME, header_len) else {
            return false;
        };
        let header: IrsdkHeader = probe.read();
        if header.num_vars <= 0 || header.buf_len <= 0 {
            return false;
        }

        let vars_end =
            header.var_header_offset as usize + header.num_vars as usize * VAR_HEADER_SIZE;
        let session_end =
            header.session_info_offset as usize + header.session_info_len as usize;
        let bufs_end = header
            .var_buf
            .iter()
            .map(|b| b.buf_offset as usize + header.buf_len as usize)
            .max()
            .unwrap_or(0);
        let total = vars_end.max(session_end).max(bufs_end);

        let Some(view) = SharedMemoryView::connect(MEM_MAP_NAME, total) else {
            return false;
        };

        self.descriptors = Self::read_descriptors(view.bytes(), &header);
        self.view = Some(view);
        self.seen_tick = -1;
        self.session = None;
        true
    }

    fn read_descriptors(bytes: &[u8], header: &IrsdkHeader) -> HashMap<String, VarDescriptor> {
        let mut descriptors = HashMap::new();
        for i in 0..header.num_vars as usize {
            let start = header.var_header_offset as usize + i * VAR_HEADER_SIZE;
            let Some(slice) = bytes.get(start..start + VAR_HEADER_SIZE) else {
                break;
            };
            let raw: VarHeaderRaw = read_struct_prefix(slice);
            descriptors.insert(
                c_string(&raw.name),
                VarDescriptor {
                    var_type: raw.var_type,
                    offset: raw.offset as usize,
                    count: raw.count.max(1) as usize,
                },
            );
        }
        descriptors
    }

    /// Copy the newest variable buffer; `false` when no new tick arrived
    /// or the buffer changed mid-copy (the frame is skipped and the last
    /// published snapshot stays in place).
    fn copy_latest_frame(&mut self) -> bool {
        let Some(view) = self.view.as_ref() else {
            return false;
        };
        let bytes = view.bytes();
        let header: IrsdkHeader = read_struct_prefix(bytes);

        let Some((idx, tick)) = header
            .var_buf
            .iter()
            .take(header.num_buf.clamp(0, 4) as usize)
            .enumerate()
            .map(|(i, b)| (i, b.tick_count))
            .max_by_key(|(_, tick)| *tick)
        else {
            return false;
        };
        if tick <= self.seen_tick {
            return false;
        }

        let start = header.var_buf[idx].buf_offset as usize;
        let len = header.buf_len as usize;
        let Some(slice) = bytes.get(start..start + len) else {
            debug!("irsdk buffer out of mapped range, skipping frame");
            return false;
        };
        self.frame.clear();
        self.frame.extend_from_slice(slice);

        // Re-read the tick; a change means the sim wrote over us mid-copy
        let reread: IrsdkHeader = read_struct_prefix(bytes);
        if reread.var_buf[idx].tick_count != tick {
            debug!("irsdk buffer changed during copy, skipping frame");
            return false;
        }

        self.seen_tick = tick;
        true
    }

    /// Parse the session-info YAML when its update counter advances
    fn refresh_session_info(&mut self) {
        let Some(view) = self.view.as_ref() else {
            return;
        };
        let bytes = view.bytes();
        let header: IrsdkHeader = read_struct_prefix(bytes);

        if let Some(cache) = &self.session {
            if cache.update_count == header.session_info_update {
                return;
            }
        }

        let start = header.session_info_offset as usize;
        let len = header.session_info_len as usize;
        let Some(slice) = bytes.get(start..start + len) else {
            return;
        };
        let yaml = c_string(slice);

        match serde_yaml_ng::from_str::<SessionInfoYaml>(&yaml) {
            Ok(info) => {
                let mut classes: Vec<String> = info
                    .driver_info
                    .drivers
                    .iter()
                    .map(|d| d.car_class_short_name.clone())
                    .filter(|c| !c.is_empty())
                    .collect();
                classes.sort();
                classes.dedup();
                self.session = Some(SessionCache {
                    update_count: header.session_info_update,
                    info,
                    classes,
                });
            }
            Err(e) => warn!(error = %e, "failed to parse iRacing session info"),
        }
    }

    fn apply_frame(
        &self,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        let reader = VarReader {
            descriptors: &self.descriptors,
            buf: &self.frame,
        };
        let info = self.session.as_ref().map(|c| &c.info);

        car.inputs.throttle = Percentage::new(reader.f32("Throttle").unwrap_or(0.0));
        car.inputs.brake = Percentage::new(reader.f32("Brake").unwrap_or(0.0));
        car.inputs.steering = reader
            .f32("SteeringWheelAngle")
            .map(|a| (a / std::f32::consts::PI).clamp(-1.0, 1.0))
            .unwrap_or(0.0);

        car.engine.rpm = Rpm(reader.f32("RPM").unwrap_or(0.0));
        car.engine.fuel_liters = Liters(reader.f32("FuelLevel").unwrap_or(0.0));
        if let Some(info) = info {
            car.engine.max_fuel_liters = Liters(info.driver_info.driver_car_fuel_max_ltr);
            car.engine.max_rpm = Rpm(info.driver_info.driver_car_red_line);
        }
        // Liters per hour over the best lap pace gives liters per lap
        if let (Some(per_hour), Some(best)) = (
            reader.f32("FuelUsePerHour"),
            reader.f32("LapBestLapTime").filter(|t| *t > 0.0),
        ) {
            car.engine.fuel_liters_per_lap = Liters(per_hour * best / 3600.0);
            if car.engine.fuel_liters_per_lap.0 > 0.0 {
                car.engine.fuel_estimated_laps =
                    car.engine.fuel_liters.0 / car.engine.fuel_liters_per_lap.0;
            }
        }

        for (i, prefix) in ["LF", "RF", "LR", "RR"].iter().enumerate() {
            // irsdk names wheels LF/RF/LR/RR; model order is FL FR RL RR
            if let Some(p) = reader.f32(&format!("{prefix}airPressure")) {
                car.tyres.pressures[i] = Kilopascals(p);
            }
            if let Some(t) = reader.f32(&format!("{prefix}tempCM")) {
                car.tyres.core_temperatures[i] = Celsius(t);
            }
        }

        car.timing.current_laptime_ms =
            reader.f32("LapCurrentLapTime").and_then(seconds_to_ms);
        car.timing.last_laptime_ms = reader.f32("LapLastLapTime").and_then(seconds_to_ms);
        car.timing.best_laptime_ms = reader.f32("LapBestLapTime").and_then(seconds_to_ms);
        car.timing.lap_delta_to_best_ms =
            reader.f32("LapDeltaToBestLap").unwrap_or(0.0) * 1000.0;

        car.race.laps_driven = reader.i32("LapCompleted").unwrap_or(0).max(0);
        car.race.global_position = reader.i32("PlayerCarPosition").unwrap_or(0);
        car.race.class_position = reader.i32("PlayerCarClassPosition").unwrap_or(0);
        // iRacing has no driver stint clock
        car.race.stint_time_left_ms = None;

        session.session_time_left_secs = reader.f64("SessionTimeRemain").unwrap_or(0.0);
        session.phase = phase_from_session_state(reader.i32("SessionState").unwrap_or(0));
        session.weather.air_temperature = Celsius(reader.f32("AirTemp").unwrap_or(0.0));
        session.track.temperature = Celsius(reader.f32("TrackTempCrew").unwrap_or(0.0));
        session.weather.wind_speed =
            MetersPerSecond(reader.f32("WindVel").unwrap_or(0.0)).to_kmh();
        session.weather.wind_direction = reader.f32("WindDir").unwrap_or(0.0);
        session.is_setup_menu_visible = reader.bool("IsInGarage").unwrap_or(false);

        let session_num = reader.i32("SessionNum").unwrap_or(0);
        if let Some(info) = info {
            session.track.game_name = info.weekend_info.track_display_name.clone();
            session.track.length_meters =
                parse_track_length_meters(&info.weekend_info.track_length);
            session.session_type = info
                .session_info
                .sessions
                .iter()
                .find(|s| s.session_num == session_num)
                .map(|s| session_type_from_yaml(&s.session_type))
                .unwrap_or(RaceSessionType::Unknown);
            session.player_car_index = info.driver_info.driver_car_idx;
        }
        session.focused_car_index =
            reader.i32("CamCarIdx").unwrap_or(session.player_car_index);

        if let Some(info) = info {
            for driver in &info.driver_info.drivers {
                let idx = driver.car_idx;
                if idx < 0 || idx as usize >= MAX_CARS {
                    continue;
                }
                let mut entry = session.cars.get(idx).unwrap_or_default();
                entry.race_number = driver.car_number_raw;
                entry.car_class = driver.car_class_short_name.clone();
                entry.drivers = vec![DriverInfo {
                    name: driver.user_name.clone(),
                    category: driver.lic_string.clone(),
                    rating: driver.i_rating,
                }];
                entry.current_driver_index = 0;

                let i = idx as usize;
                entry.lap_index = reader.i32_at("CarIdxLap", i).unwrap_or(0).max(0);
                entry.track_percent_completed = reader
                    .f32_at("CarIdxLapDistPct", i)
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0);
                entry.position = reader.i32_at("CarIdxPosition", i).unwrap_or(0);
                entry.cup_position = reader.i32_at("CarIdxClassPosition", i).unwrap_or(0);
                entry.last_lap.laptime_ms = reader
                    .f32_at("CarIdxLastLapTime", i)
                    .and_then(seconds_to_ms);
                entry.fastest_lap.laptime_ms = reader
                    .f32_at("CarIdxBestLapTime", i)
                    .and_then(seconds_to_ms);
                entry.car_location = match reader.bool_at("CarIdxOnPitRoad", i) {
                    Some(true) => CarLocation::Pitlane,
                    Some(false) => CarLocation::Track,
                    None => CarLocation::None,
                };
                session.cars.add_or_update(idx, entry);
            }
        }

        game.game = Some(Game::IRacing);
        game.status = if reader.bool("IsReplayPlaying").unwrap_or(false) {
            SimStatus::Replay
        } else {
            SimStatus::Live
        };
    }
}

impl Default for IRacingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorAdapter for IRacingAdapter {
    fn game(&self) -> Game {
        Game::IRacing
    }

    fn update(
        &mut self,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        if !self.connect() {
            self.connected = false;
            return;
        }

        self.refresh_session_info();

        if self.copy_latest_frame() {
            self.connected = true;
            self.apply_frame(car, session, game);
        }
    }

    fn has_telemetry(&self) -> bool {
        self.connected && self.view.is_some()
    }

    fn stop(&mut self) {
        self.view = None;
        self.descriptors.clear();
        self.frame.clear();
        self.session = None;
        self.seen_tick = -1;
        self.connected = false;
    }

    fn car_classes(&self) -> Vec<String> {
        self.session
            .as_ref()
            .map(|c| c.classes.clone())
            .unwrap_or_default()
    }
}
