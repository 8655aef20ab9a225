//! SCS truck simulator adapter (ETS2 / ATS)
//!
//! Both truck simulators expose the same `Local\SCSTelemetry` block
//! through the community telemetry plugin; one adapter covers both,
//! parameterized by game id. Trucks have no race sessions, so only the
//! engine/input subset of the model is populated and session fields keep
//! their defaults.

use crate::source::{Pod, SharedMemoryView};
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::*;
use trackside_core::units::*;

const SHARED_MEMORY_NAME: &str = "Local\\SCSTelemetry";

#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
struct ScsShared {
    sdk_active: u32,
    paused: u32,
    timestamp: u64,
    simulated_timestamp: u64,

    speed_ms: f32,
    engine_rpm: f32,
    engine_rpm_max: f32,
    fuel: f32,
    fuel_capacity: f32,
    fuel_avg_consumption: f32,
    fuel_range: f32,

    input_throttle: f32,
    input_brake: f32,
    input_steering: f32,
}

unsafe impl Pod for ScsShared {}

pub struct ScsAdapter {
    game: Game,
    view: Option<SharedMemoryView>,
    last_timestamp: u64,
    fresh: bool,
}

impl ScsAdapter {
    /// `game` must be one of the two truck simulators
    pub fn new(game: Game) -> Self {
        debug_assert!(matches!(
            game,
            Game::EuroTruckSimulator2 | Game::AmericanTruckSimulator
        ));
        Self {
            game,
            view: None,
            last_timestamp: 0,
            fresh: false,
        }
    }

    fn apply(&self, shared: &ScsShared, car: &mut LocalCarData, game: &mut GameData) {
        car.inputs.throttle = Percentage::new(shared.input_throttle);
        car.inputs.brake = Percentage::new(shared.input_brake);
        car.inputs.steering = shared.input_steering.clamp(-1.0, 1.0);

        car.engine.rpm = Rpm(shared.engine_rpm);
        car.engine.max_rpm = Rpm(shared.engine_rpm_max);
        car.engine.fuel_liters = Liters(shared.fuel);
        car.engine.max_fuel_liters = Liters(shared.fuel_capacity);
        // Consumption arrives per 100 km; the lap abstraction does not
        // apply, so per-lap stays zero and the range estimate is all we
        // surface.
        car.engine.fuel_estimated_laps = 0.0;

        game.game = Some(self.game);
        game.status = if shared.paused != 0 {
            SimStatus::Pause
        } else {
            SimStatus::Live
        };
    }
}

impl SimulatorAdapter for ScsAdapter {
    fn game(&self) -> Game {
        self.game
    }

    fn update(
        &mut self,
        car: &mut LocalCarData,
        _session: &mut SessionData,
        game: &mut GameData,
    ) {
        if self.view.is_none() {
            self.view =
                SharedMemoryView::connect(SHARED_MEMORY_NAME, std::mem::size_of::<ScsShared>());
        }
        let Some(view) = self.view.as_ref() else {
            self.fresh = false;
            return;
        };

        let shared: ScsShared = view.read();
        if shared.sdk_active == 0 {
            self.fresh = false;
            return;
        }

        self.fresh = shared.timestamp != self.last_timestamp || shared.paused != 0;
        self.last_timestamp = shared.timestamp;

        self.apply(&shared, car, game);
    }

    fn has_telemetry(&self) -> bool {
        self.view.is_some() && self.fresh
    }

    fn stop(&mut self) {
        self.view = None;
        self.fresh = false;
        self.last_timestamp = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::read_struct_prefix;

    #[test]
    fn test_apply_maps_engine_and_inputs() {
        let adapter = ScsAdapter::new(Game::EuroTruckSimulator2);
        let mut shared: ScsShared = read_struct_prefix(&[]);
        shared.sdk_active = 1;
        shared.fuel = 380.0;
        shared.fuel_capacity = 600.0;
        shared.engine_rpm = 1350.0;
        shared.input_throttle = 0.65;
        shared.paused = 1;

        let mut car = LocalCarData::default();
        let mut game = GameData::default();
        adapter.apply(&shared, &mut car, &mut game);

        assert_eq!(car.engine.fuel_liters.0, 380.0);
        assert_eq!(car.inputs.throttle.0, 0.65);
        assert_eq!(game.game, Some(Game::EuroTruckSimulator2));
        assert_eq!(game.status, SimStatus::Pause);
    }

    #[test]
    fn test_game_id_parameterization() {
        assert_eq!(
            ScsAdapter::new(Game::AmericanTruckSimulator).game(),
            Game::AmericanTruckSimulator
        );
        assert_eq!(
            ScsAdapter::new(Game::EuroTruckSimulator2).game(),
            Game::EuroTruckSimulator2
        );
    }

    #[test]
    fn test_update_without_source_reports_no_telemetry() {
        let mut adapter = ScsAdapter::new(Game::AmericanTruckSimulator);
        let mut car = LocalCarData::default();
        let mut session = SessionData::default();
        let mut game = GameData::default();

        adapter.update(&mut car, &mut session, &mut game);

        assert!(!adapter.has_telemetry());
        assert!(game.game.is_none());
    }
}
