//! Automobilista 2 adapter
//!
//! AMS2 broadcasts the Project CARS 2 UDP protocol on port 5606. Packets
//! carry a small header identifying the payload kind; this adapter
//! consumes the car-physics and game-state packets. Fields are decoded
//! with bounds-checked little-endian reads, so short or malformed packets
//! degrade to "no new frame" instead of failing.

use crate::source::UdpSource;
use std::time::{Duration, Instant};
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::*;
use trackside_core::units::*;
use tracing::{debug, warn};

const BROADCAST_PORT: u16 = 5606;
const FRESHNESS_WINDOW: Duration = Duration::from_secs(2);

// Packet kinds of the shared protocol header
const PACKET_CAR_PHYSICS: u8 = 0;
const PACKET_GAME_STATE: u8 = 4;

const HEADER_LEN: usize = 12;
const OFFSET_PACKET_TYPE: usize = 10;

// Car-physics payload offsets (relative to the end of the header)
const PHYS_THROTTLE: usize = 21;
const PHYS_BRAKE: usize = 22;
const PHYS_STEERING: usize = 24;
const PHYS_FUEL_CAPACITY: usize = 26;
const PHYS_FUEL_LEVEL: usize = 32;
const PHYS_SPEED: usize = 36;
const PHYS_RPM: usize = 40;
const PHYS_MAX_RPM: usize = 42;
const PHYS_TYRE_TEMP: usize = 80;
const PHYS_TYRE_PRESSURE: usize = 96;

// Game-state payload offsets
const STATE_GAME_SESSION: usize = 0;
const STATE_AMBIENT_TEMP: usize = 2;
const STATE_TRACK_TEMP: usize = 3;
const STATE_RAIN_DENSITY: usize = 4;
const STATE_WIND_SPEED: usize = 6;

fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

fn read_i8(buf: &[u8], offset: usize) -> Option<i8> {
    buf.get(offset).map(|&b| b as i8)
}

fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_f32(buf: &[u8], offset: usize) -> Option<f32> {
    buf.get(offset..offset + 4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Game/session state packed as `game + session * 16`
fn decode_game_session(raw: u8) -> (u8, u8) {
    (raw & 0x0F, raw >> 4)
}

fn session_type_from_ams2(session_state: u8) -> RaceSessionType {
    match session_state {
        1 | 2 => RaceSessionType::Practice,
        3 => RaceSessionType::Qualifying,
        4 => RaceSessionType::Superpole,
        5 => RaceSessionType::Race,
        6 => RaceSessionType::Hotlap,
        _ => RaceSessionType::Unknown,
    }
}

fn status_from_game_state(game_state: u8) -> SimStatus {
    match game_state {
        2 => SimStatus::Live,
        3 => SimStatus::Pause,
        5 => SimStatus::Replay,
        _ => SimStatus::Off,
    }
}

pub struct Automobilista2Adapter {
    source: Option<UdpSource>,
    last_packet: Option<Instant>,
}

impl Automobilista2Adapter {
    pub fn new() -> Self {
        Self {
            source: None,
            last_packet: None,
        }
    }

    fn connect(&mut self) -> bool {
        if self.source.is_none() {
            match UdpSource::bind(BROADCAST_PORT) {
                Ok(source) => self.source = Some(source),
                Err(e) => {
                    warn!(error = %e, "failed to bind AMS2 broadcast port");
                    return false;
                }
            }
        }
        true
    }

    fn apply_car_physics(payload: &[u8], car: &mut LocalCarData) -> Option<()> {
        car.inputs.throttle = Percentage::new(f32::from(read_u8(payload, PHYS_THROTTLE)?) / 255.0);
        car.inputs.brake = Percentage::new(f32::from(read_u8(payload, PHYS_BRAKE)?) / 255.0);
        car.inputs.steering = f32::from(read_i8(payload, PHYS_STEERING)?) / 127.0;

        car.engine.fuel_liters = Liters(
            read_f32(payload, PHYS_FUEL_LEVEL)? * f32::from(read_u8(payload, PHYS_FUEL_CAPACITY)?),
        );
        car.engine.max_fuel_liters = Liters(f32::from(read_u8(payload, PHYS_FUEL_CAPACITY)?));
        car.engine.rpm = Rpm(f32::from(read_u16(payload, PHYS_RPM)?));
        car.engine.max_rpm = Rpm(f32::from(read_u16(payload, PHYS_MAX_RPM)?));

        for i in 0..4 {
            if let Some(temp) = read_u16(payload, PHYS_TYRE_TEMP + i * 2) {
                car.tyres.core_temperatures[i] = Celsius(f32::from(temp));
            }
            if let Some(pressure) = read_u16(payload, PHYS_TYRE_PRESSURE + i * 2) {
                car.tyres.pressures[i] = Kilopascals(f32::from(pressure) / 10.0);
            }
        }

        let _speed = read_f32(payload, PHYS_SPEED)?;
        Some(())
    }

    fn apply_game_state(payload: &[u8], session: &mut SessionData, game: &mut GameData) {
        if let Some(raw) = read_u8(payload, STATE_GAME_SESSION) {
            let (game_state, session_state) = decode_game_session(raw);
            game.status = status_from_game_state(game_state);
            session.session_type = session_type_from_ams2(session_state);
            session.phase = if game_state == 2 {
                SessionPhase::Session
            } else {
                SessionPhase::None
            };
        }
        if let Some(t) = read_i8(payload, STATE_AMBIENT_TEMP) {
            session.weather.air_temperature = Celsius(f32::from(t));
        }
        if let Some(t) = read_i8(payload, STATE_TRACK_TEMP) {
            session.track.temperature = Celsius(f32::from(t));
        }
        if let Some(wind) = read_u8(payload, STATE_WIND_SPEED) {
            session.weather.wind_speed = KilometersPerHour(f32::from(wind));
        }
        let _rain = read_u8(payload, STATE_RAIN_DENSITY);
        game.game = Some(Game::Automobilista2);
    }
}

impl Default for Automobilista2Adapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorAdapter for Automobilista2Adapter {
    fn game(&self) -> Game {
        Game::Automobilista2
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

        let Some(datagram) = self.source.as_mut().and_then(UdpSource::recv_latest) else {
            return;
        };
        if datagram.len() < HEADER_LEN {
            debug!(len = datagram.len(), "short AMS2 packet dropped");
            return;
        }

        let packet_type = datagram[OFFSET_PACKET_TYPE];
        let payload = &datagram[HEADER_LEN..];

        match packet_type {
            PACKET_CAR_PHYSICS => {
                if Self::apply_car_physics(payload, car).is_none() {
                    debug!("truncated AMS2 car-physics packet dropped");
                    return;
                }
                game.game = Some(Game::Automobilista2);
            }
            PACKET_GAME_STATE => Self::apply_game_state(payload, session, game),
            _ => return,
        }

        self.last_packet = Some(Instant::now());
    }

    fn has_telemetry(&self) -> bool {
        self.last_packet
            .map(|at| at.elapsed() < FRESHNESS_WINDOW)
            .unwrap_or(false)
    }

    fn stop(&mut self) {
        self.source = None;
        self.last_packet = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physics_packet() -> Vec<u8> {
        let mut packet = vec![0u8; HEADER_LEN + 128];
        packet[OFFSET_PACKET_TYPE] = PACKET_CAR_PHYSICS;
        let payload = HEADER_LEN;
        packet[payload + PHYS_THROTTLE] = 255;
        packet[payload + PHYS_BRAKE] = 0;
        packet[payload + PHYS_STEERING] = (-64i8) as u8;
        packet[payload + PHYS_FUEL_CAPACITY] = 100;
        packet[payload + PHYS_FUEL_LEVEL..payload + PHYS_FUEL_LEVEL + 4]
            .copy_from_slice(&0.5f32.to_le_bytes());
        packet[payload + PHYS_RPM..payload + PHYS_RPM + 2]
            .copy_from_slice(&6400u16.to_le_bytes());
        packet
    }

    #[test]
    fn test_car_physics_packet_decodes_inputs_and_fuel() {
        let packet = physics_packet();
        let mut car = LocalCarData::default();
        assert!(
            Automobilista2Adapter::apply_car_physics(&packet[HEADER_LEN..], &mut car).is_some()
        );

        assert_eq!(car.inputs.throttle.0, 1.0);
        assert!((car.inputs.steering + 0.504).abs() < 1e-2);
        assert!((car.engine.fuel_liters.0 - 50.0).abs() < 1e-3);
        assert_eq!(car.engine.rpm.0, 6400.0);
    }

    #[test]
    fn test_truncated_physics_packet_is_rejected_without_panic() {
        let packet = physics_packet();
        let mut car = LocalCarData::default();
        let short = &packet[HEADER_LEN..HEADER_LEN + 10];
        assert!(Automobilista2Adapter::apply_car_physics(short, &mut car).is_none());
    }

    #[test]
    fn test_game_state_packet_sets_session() {
        let mut payload = vec![0u8; 16];
        // game LIVE (2) + session RACE (5)
        payload[STATE_GAME_SESSION] = 2 | (5 << 4);
        payload[STATE_AMBIENT_TEMP] = 19;
        payload[STATE_TRACK_TEMP] = 31;

        let mut session = SessionData::default();
        let mut game = GameData::default();
        Automobilista2Adapter::apply_game_state(&payload, &mut session, &mut game);

        assert_eq!(game.status, SimStatus::Live);
        assert_eq!(session.session_type, RaceSessionType::Race);
        assert_eq!(session.weather.air_temperature.0, 19.0);
        assert_eq!(session.track.temperature.0, 31.0);
        assert_eq!(game.game, Some(Game::Automobilista2));
    }

    #[test]
    fn test_update_without_packets_is_inert() {
        let mut adapter = Automobilista2Adapter::new();
        let mut car = LocalCarData::default();
        let mut session = SessionData::default();
        let mut game = GameData::default();

        adapter.update(&mut car, &mut session, &mut game);

        assert!(!adapter.has_telemetry());
        assert!(game.game.is_none());
        assert!(session.cars.is_empty());
        adapter.stop();
    }
}
