//! Integration tests for the DemoAdapter

use trackside_adapters::DemoAdapter;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::{Game, GameData, LocalCarData, RaceSessionType, SessionData};

#[test]
fn test_demo_adapter_game() {
    let adapter = DemoAdapter::new();
    assert_eq!(adapter.game(), Game::Demo);
}

#[test]
fn test_demo_adapter_always_reports_telemetry() {
    let adapter = DemoAdapter::new();
    assert!(
        adapter.has_telemetry(),
        "DemoAdapter should always have telemetry"
    );
}

#[test]
fn test_demo_adapter_update_fills_every_section() {
    let mut adapter = DemoAdapter::new();
    let mut car = LocalCarData::default();
    let mut session = SessionData::default();
    let mut game = GameData::default();

    adapter.update(&mut car, &mut session, &mut game);

    assert_eq!(game.game, Some(Game::Demo));
    assert_eq!(session.session_type, RaceSessionType::Race);
    assert!(session.cars.len() >= 4, "demo field should have cars");
    assert!(car.engine.max_fuel_liters.0 > 0.0);
    assert!(car.timing.current_laptime_ms.is_some());
}

#[test]
fn test_demo_adapter_stop_and_restart() {
    let mut adapter = DemoAdapter::new();
    let mut car = LocalCarData::default();
    let mut session = SessionData::default();
    let mut game = GameData::default();

    adapter.update(&mut car, &mut session, &mut game);
    adapter.stop();
    adapter.stop();

    // Restart produces a fresh session clock without erroring
    adapter.update(&mut car, &mut session, &mut game);
    assert!(adapter.has_telemetry());
}

#[test]
fn test_demo_adapter_car_classes_and_colors() {
    let adapter = DemoAdapter::new();
    let classes = adapter.car_classes();
    assert_eq!(classes, vec!["GT3".to_string()]);

    let color = adapter.class_color("GT3");
    assert_ne!(color, adapter.class_color("LMP2"));
}

#[test]
fn test_demo_preview_does_not_touch_passed_in_game_state() {
    let adapter = DemoAdapter::new();
    let mut car = LocalCarData::default();
    let mut session = SessionData::default();

    adapter.setup_preview_data(&mut car, &mut session);

    assert!(!session.cars.is_empty());
    assert!(car.engine.fuel_liters.0 > 0.0);
}
