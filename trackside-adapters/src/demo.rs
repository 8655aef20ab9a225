//! Demo adapter that generates synthetic telemetry
//!
//! Simulates laps around a small circuit with straights, braking zones,
//! corners and acceleration phases, plus a three-car field, without
//! requiring a running simulator. Doubles as the deterministic data
//! source for overlay previews.

use std::time::Instant;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::*;
use trackside_core::units::*;

#[derive(Clone, Copy)]
enum SegmentKind {
    Straight,
    Braking,
    Corner,
    Accel,
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f32,
    target_speed: f32,
    steering: f32,
}

/// A short circuit: ~62s lap
fn demo_track() -> Vec<TrackSegment> {
    use SegmentKind::*;
    vec![
        TrackSegment { kind: Straight, duration: 9.0, target_speed: 72.0, steering: 0.0 },
        TrackSegment { kind: Braking, duration: 2.5, target_speed: 26.0, steering: 0.05 },
        TrackSegment { kind: Corner, duration: 4.0, target_speed: 24.0, steering: 0.4 },
        TrackSegment { kind: Accel, duration: 4.0, target_speed: 58.0, steering: 0.1 },
        TrackSegment { kind: Straight, duration: 7.0, target_speed: 70.0, steering: 0.0 },
        TrackSegment { kind: Braking, duration: 2.0, target_speed: 40.0, steering: -0.05 },
        TrackSegment { kind: Corner, duration: 4.5, target_speed: 38.0, steering: -0.3 },
        TrackSegment { kind: Accel, duration: 3.5, target_speed: 60.0, steering: -0.05 },
        TrackSegment { kind: Straight, duration: 10.0, target_speed: 78.0, steering: 0.0 },
        TrackSegment { kind: Braking, duration: 3.0, target_speed: 22.0, steering: -0.03 },
        TrackSegment { kind: Corner, duration: 5.0, target_speed: 20.0, steering: -0.45 },
        TrackSegment { kind: Accel, duration: 4.5, target_speed: 55.0, steering: -0.1 },
        TrackSegment { kind: Straight, duration: 3.0, target_speed: 65.0, steering: 0.0 },
    ]
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

struct LapState {
    throttle: f32,
    brake: f32,
    steering: f32,
    rpm: f32,
}

fn compute_lap_state(track: &[TrackSegment], lap_time: f32) -> LapState {
    let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
    let t = lap_time % lap_duration;

    let mut elapsed = 0.0_f32;
    let mut seg_idx = track.len() - 1;
    for (i, seg) in track.iter().enumerate() {
        if elapsed + seg.duration > t {
            seg_idx = i;
            break;
        }
        elapsed += seg.duration;
    }

    let seg = track[seg_idx];
    let seg_t = ((t - elapsed) / seg.duration).clamp(0.0, 1.0);
    let prev_speed = if seg_idx > 0 {
        track[seg_idx - 1].target_speed
    } else {
        track.last().map(|s| s.target_speed).unwrap_or(0.0)
    };
    let speed = lerp(prev_speed, seg.target_speed, smoothstep(seg_t));

    let (throttle, brake) = match seg.kind {
        SegmentKind::Straight => (1.0, 0.0),
        SegmentKind::Braking => (0.0, 1.0 - smoothstep(seg_t) * 0.4),
        SegmentKind::Corner => (0.2 + 0.3 * seg_t, 0.0),
        SegmentKind::Accel => (0.5 + 0.5 * smoothstep(seg_t), 0.0),
    };

    // Steering ramps in over the first half of a segment and out again
    let envelope = if seg_t < 0.5 {
        smoothstep(seg_t * 2.0)
    } else {
        smoothstep((1.0 - seg_t) * 2.0)
    };

    LapState {
        throttle,
        brake,
        steering: seg.steering * envelope,
        rpm: (speed * 75.0 + 1400.0).clamp(1400.0, 7800.0),
    }
}

pub struct DemoAdapter {
    start: Option<Instant>,
    track: Vec<TrackSegment>,
    lap_duration: f32,
    best_lap_ms: i32,
}

impl DemoAdapter {
    pub fn new() -> Self {
        let track = demo_track();
        let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
        Self {
            start: None,
            track,
            lap_duration,
            best_lap_ms: (lap_duration * 1000.0) as i32 - 1200,
        }
    }

    /// Generate the frame for `elapsed` seconds into the session
    fn write_frame(
        &self,
        elapsed: f32,
        car: &mut LocalCarData,
        session: &mut SessionData,
    ) {
        let lap_time = elapsed % self.lap_duration;
        let laps_done = (elapsed / self.lap_duration) as i32;
        let state = compute_lap_state(&self.track, lap_time);
        let lap_ms = (self.lap_duration * 1000.0) as i32;

        car.inputs.throttle = Percentage::new(state.throttle);
        car.inputs.brake = Percentage::new(state.brake);
        car.inputs.steering = state.steering;

        car.engine.rpm = Rpm(state.rpm);
        car.engine.max_rpm = Rpm(8000.0);
        car.engine.max_fuel_liters = Liters(60.0);
        car.engine.fuel_liters = Liters((60.0 - elapsed * 0.03).max(0.0));
        car.engine.fuel_liters_per_lap = Liters(2.1);
        car.engine.fuel_estimated_laps = car.engine.fuel_liters.0 / 2.1;

        for i in 0..4 {
            car.tyres.slip_ratio[i] = state.brake * 0.04;
            car.tyres.pressures[i] = Kilopascals(175.0 + state.rpm * 0.001);
            car.tyres.core_temperatures[i] = Celsius(82.0 + state.throttle * 6.0);
        }

        let spline_angle = (lap_time / self.lap_duration) * std::f32::consts::TAU;
        car.world_position = [
            spline_angle.cos() * 480.0,
            spline_angle.sin() * 310.0 * (1.0 + 0.2 * (2.0 * spline_angle).sin()),
        ];

        car.timing.current_laptime_ms = Some((lap_time * 1000.0) as i32);
        car.timing.last_laptime_ms = (laps_done > 0).then_some(lap_ms + 300);
        car.timing.best_laptime_ms = (laps_done > 0).then_some(self.best_lap_ms);
        car.timing.lap_delta_to_best_ms = (lap_time - self.lap_duration / 2.0) * 8.0;
        car.race.laps_driven = laps_done;
        car.race.global_position = 2;
        car.race.class_position = 2;
        car.race.stint_time_left_ms = None;

        session.session_type = RaceSessionType::Race;
        session.phase = SessionPhase::Session;
        session.session_time_left_secs = f64::from((1800.0 - elapsed).max(0.0));
        session.flag = RaceFlag::Green;
        session.player_car_index = 0;
        session.focused_car_index = 0;
        session.track.game_name = "Demo Circuit".to_string();
        session.track.length_meters = 3200;
        session.track.temperature = Celsius(29.0);
        session.weather.air_temperature = Celsius(22.0);
        session.weather.wind_speed = KilometersPerHour(8.0);

        let spline = lap_time / self.lap_duration;
        self.write_car(session, 0, 2, "You", 42, laps_done, spline, None);
        self.write_car(
            session,
            1,
            1,
            "Alex Rivera",
            7,
            laps_done,
            (spline + 0.12) % 1.0,
            Some(self.best_lap_ms - 800),
        );
        self.write_car(
            session,
            2,
            3,
            "Sam Chen",
            22,
            laps_done,
            (spline + 0.87) % 1.0,
            Some(self.best_lap_ms + 350),
        );
        self.write_car(
            session,
            3,
            4,
            "Kim Sato",
            51,
            laps_done - 1,
            (spline + 0.5) % 1.0,
            Some(self.best_lap_ms + 900),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn write_car(
        &self,
        session: &mut SessionData,
        index: i32,
        position: i32,
        driver: &str,
        number: i32,
        laps: i32,
        spline: f32,
        fastest_ms: Option<i32>,
    ) {
        let lap_ms = (self.lap_duration * 1000.0) as i32;
        let mut info = session.cars.get(index).unwrap_or_default();
        info.race_number = number;
        info.car_class = "GT3".to_string();
        info.position = position;
        info.cup_position = position;
        info.lap_index = laps.max(0);
        info.track_percent_completed = spline.clamp(0.0, 1.0);
        info.kmh = 120.0 + spline * 90.0;
        info.car_location = CarLocation::Track;
        info.fastest_lap.laptime_ms = fastest_ms.or(Some(self.best_lap_ms));
        info.last_lap.laptime_ms = fastest_ms.map(|ms| ms + 450).or(Some(lap_ms + 300));
        info.last_lap.splits_ms = vec![lap_ms / 3, lap_ms / 3, lap_ms / 3];
        info.gap_to_player_ms = index * 1500;
        info.drivers = vec![DriverInfo {
            name: driver.to_string(),
            category: "A".to_string(),
            rating: 2000 + index * 250,
        }];
        info.current_driver_index = 0;
        session.cars.add_or_update(index, info);
    }
}

impl Default for DemoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorAdapter for DemoAdapter {
    fn game(&self) -> Game {
        Game::Demo
    }

    fn update(
        &mut self,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    ) {
        let start = *self.start.get_or_insert_with(Instant::now);
        self.write_frame(start.elapsed().as_secs_f32(), car, session);
        game.game = Some(self.game());
        game.status = SimStatus::Live;
    }

    fn has_telemetry(&self) -> bool {
        true
    }

    fn stop(&mut self) {
        self.start = None;
    }

    fn car_classes(&self) -> Vec<String> {
        vec!["GT3".to_string()]
    }

    fn class_color(&self, car_class: &str) -> Color {
        match car_class {
            "GT3" => Color::rgb(255, 190, 30),
            _ => Color::WHITE,
        }
    }

    fn setup_preview_data(&self, car: &mut LocalCarData, session: &mut SessionData) {
        // Fixed point in the lap so previews are deterministic
        self.write_frame(self.lap_duration * 1.4, car, session);
    }
}
