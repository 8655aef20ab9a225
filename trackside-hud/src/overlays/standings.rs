//! Standings overlay
//!
//! Per-class standings tables. Ordering follows the session: live races
//! rank by race progress (laps plus a tenth of the spline position),
//! finished or not-yet-started races and timed sessions use the
//! simulator's classification position.

use crate::config::load_overlay_config;
use crate::format::{format_laptime, format_time_diff};
use crate::overlay::{Overlay, OverlayContext};
use crate::render::DrawContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trackside_adapters::DemoAdapter;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::events::TelemetryEvent;
use trackside_core::model::{
    CarInfo, CarLocation, Color, RaceSessionType, SessionPhase,
};
use trackside_core::telemetry::TelemetrySnapshot;

const ROW_HEIGHT: u32 = 16;
const PANEL_WIDTH: u32 = 340;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StandingsConfig {
    /// Rows shown per car class
    pub max_rows_per_class: u32,
    pub show_interval: bool,
    pub show_license: bool,
    pub refresh_hz: f32,
}

impl Default for StandingsConfig {
    fn default() -> Self {
        Self {
            max_rows_per_class: 8,
            show_interval: true,
            show_license: false,
            refresh_hz: 1.0,
        }
    }
}

/// One rendered standings line
#[derive(Debug, Clone)]
pub struct StandingsRow {
    pub position: i32,
    pub race_number: i32,
    pub driver_name: String,
    pub last_lap: Option<i32>,
    pub fastest_lap: Option<i32>,
    pub interval_ms: Option<i32>,
    pub annotation: String,
    pub is_player: bool,
}

/// Order an entry list for display.
///
/// The tie-break table:
/// - Race in SessionOver/PreSession/PreFormation: classification (cup)
///   position as reported by the simulator.
/// - Race otherwise: live race progress, `laps + spline / 10`, best first.
/// - Practice/Qualifying: cup position (the simulator orders these by
///   fastest lap).
/// - Anything else keeps the simulator's ordering untouched.
pub fn sort_entry_list(
    cars: &mut [(i32, CarInfo)],
    session_type: RaceSessionType,
    phase: SessionPhase,
) {
    match session_type {
        RaceSessionType::Race => match phase {
            SessionPhase::SessionOver | SessionPhase::PreSession | SessionPhase::PreFormation => {
                cars.sort_by_key(|(_, car)| car.cup_position);
            }
            _ => {
                cars.sort_by(|(_, a), (_, b)| {
                    b.race_progress()
                        .partial_cmp(&a.race_progress())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        },
        RaceSessionType::Practice | RaceSessionType::Qualifying => {
            cars.sort_by_key(|(_, car)| car.cup_position);
        }
        _ => {}
    }
}

fn location_annotation(car: &CarInfo, session_type: RaceSessionType) -> String {
    if session_type != RaceSessionType::Race && session_type != RaceSessionType::Qualifying {
        return String::new();
    }
    match car.car_location {
        CarLocation::PitEntry => "PIT Entry".to_string(),
        CarLocation::PitExit => "PIT Exit".to_string(),
        CarLocation::Pitlane => "Box".to_string(),
        _ if car.current_lap.is_invalid => "X".to_string(),
        _ => String::new(),
    }
}

/// Build display rows for one class, already sorted
pub fn build_rows(
    sorted: &[(i32, CarInfo)],
    session_type: RaceSessionType,
    player_car_index: i32,
) -> Vec<StandingsRow> {
    let mut rows: Vec<StandingsRow> = Vec::with_capacity(sorted.len());

    for (position, (car_index, car)) in sorted.iter().enumerate() {
        // Practice/qualifying intervals compare fastest laps with the row
        // above; races use the gap to the player.
        let interval_ms = if session_type == RaceSessionType::Race {
            Some(car.gap_to_player_ms).filter(|&gap| gap != 0)
        } else {
            rows.last().and_then(|prev: &StandingsRow| {
                match (car.fastest_lap.laptime_ms, prev.fastest_lap) {
                    (Some(own), Some(ahead)) => Some(own - ahead),
                    _ => None,
                }
            })
        };

        rows.push(StandingsRow {
            position: position as i32 + 1,
            race_number: car.race_number,
            driver_name: car
                .current_driver()
                .map(|d| d.name.clone())
                .unwrap_or_default(),
            last_lap: car.last_lap.laptime_ms,
            fastest_lap: car.fastest_lap.laptime_ms,
            interval_ms,
            annotation: location_annotation(car, session_type),
            is_player: *car_index == player_car_index,
        });
    }

    rows
}

pub struct StandingsOverlay {
    config: StandingsConfig,
    /// class name -> rows, rebuilt every render
    tables: BTreeMap<String, Vec<StandingsRow>>,
    height: u32,
}

impl StandingsOverlay {
    pub fn new() -> Self {
        Self::with_config(load_overlay_config("Standings"))
    }

    pub fn with_config(config: StandingsConfig) -> Self {
        Self {
            config,
            tables: BTreeMap::new(),
            height: ROW_HEIGHT * 4,
        }
    }

    fn rebuild_tables(&mut self, ctx: &OverlayContext) {
        let (cars, session_type, phase, player_index) = ctx.telemetry.read(|snap| {
            (
                snap.session.cars.snapshot(),
                snap.session.session_type,
                snap.session.phase,
                snap.session.player_car_index,
            )
        });

        self.tables.clear();
        let mut by_class: BTreeMap<String, Vec<(i32, CarInfo)>> = BTreeMap::new();
        for (idx, car) in cars {
            by_class
                .entry(car.car_class.clone())
                .or_default()
                .push((idx, car));
        }

        for (class, mut entries) in by_class {
            sort_entry_list(&mut entries, session_type, phase);
            entries.truncate(self.config.max_rows_per_class as usize);
            self.tables
                .insert(class, build_rows(&entries, session_type, player_index));
        }

        let total_rows: u32 = self
            .tables
            .values()
            .map(|rows| rows.len() as u32 + 1)
            .sum::<u32>()
            .max(2);
        self.height = total_rows * ROW_HEIGHT + 4;
    }
}

impl Default for StandingsOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for StandingsOverlay {
    fn name(&self) -> &'static str {
        "Standings"
    }

    fn size(&self) -> (u32, u32) {
        (PANEL_WIDTH, self.height)
    }

    fn refresh_rate_hz(&self) -> f32 {
        self.config.refresh_hz
    }

    fn before_start(&mut self, _ctx: &OverlayContext) -> Result<()> {
        Ok(())
    }

    fn on_event(&mut self, event: &TelemetryEvent) {
        if matches!(
            event,
            TelemetryEvent::SessionRestarted | TelemetryEvent::SessionTypeChanged(_)
        ) {
            self.tables.clear();
        }
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
        self.rebuild_tables(ctx);

        g.fill_rounded_rect(
            0.0,
            0.0,
            PANEL_WIDTH as f32,
            self.height as f32,
            4.0,
            Color::rgba(10, 10, 10, 168),
        );

        let mut y = ROW_HEIGHT as f32;
        for (class, rows) in &self.tables {
            g.text(class, 4.0, y - 3.0, 11.0, Color::rgb(255, 190, 30), true);
            y += ROW_HEIGHT as f32;

            for row in rows {
                let color = if row.is_player {
                    Color::rgb(120, 200, 255)
                } else {
                    Color::WHITE
                };
                g.text(&format!("{:>2}", row.position), 4.0, y - 3.0, 11.0, color, true);
                g.text(&format!("#{:<3}", row.race_number), 26.0, y - 3.0, 11.0, color, true);
                g.text(&row.driver_name, 60.0, y - 3.0, 11.0, color, true);
                g.text(
                    &format_laptime(row.fastest_lap),
                    190.0,
                    y - 3.0,
                    11.0,
                    color,
                    true,
                );
                if self.config.show_interval {
                    g.text(
                        &format_time_diff(row.interval_ms),
                        258.0,
                        y - 3.0,
                        11.0,
                        color,
                        true,
                    );
                }
                if !row.annotation.is_empty() {
                    g.text(&row.annotation, 310.0, y - 3.0, 11.0, Color::ORANGE, true);
                }
                y += ROW_HEIGHT as f32;
            }
        }
    }

    fn before_stop(&mut self) {
        self.tables.clear();
    }

    fn setup_preview_data(&self, snapshot: &mut TelemetrySnapshot) {
        DemoAdapter::new().setup_preview_data(&mut snapshot.local_car, &mut snapshot.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackside_core::model::LapInfo;

    fn car(laps: i32, spline: f32, cup: i32) -> CarInfo {
        CarInfo {
            lap_index: laps,
            track_percent_completed: spline,
            cup_position: cup,
            car_class: "GT3".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_live_race_sorts_by_progress() {
        // laps 4 + spline 0.95 must rank ahead of laps 3 + spline 0.2
        let mut cars = vec![(1, car(3, 0.2, 1)), (2, car(4, 0.95, 2))];
        sort_entry_list(&mut cars, RaceSessionType::Race, SessionPhase::Session);
        assert_eq!(cars[0].0, 2);
        assert_eq!(cars[1].0, 1);
    }

    #[test]
    fn test_race_over_uses_cup_position() {
        let mut cars = vec![(1, car(3, 0.2, 2)), (2, car(4, 0.95, 1))];
        sort_entry_list(&mut cars, RaceSessionType::Race, SessionPhase::SessionOver);
        assert_eq!(cars[0].0, 2, "cup position 1 leads after the flag");

        // but the same field mid-session ranks by progress
        let mut cars = vec![(1, car(5, 0.5, 2)), (2, car(4, 0.95, 1))];
        sort_entry_list(&mut cars, RaceSessionType::Race, SessionPhase::Session);
        assert_eq!(cars[0].0, 1);
    }

    #[test]
    fn test_qualifying_uses_cup_position() {
        let mut cars = vec![(1, car(0, 0.9, 3)), (2, car(0, 0.1, 1)), (3, car(0, 0.5, 2))];
        sort_entry_list(&mut cars, RaceSessionType::Qualifying, SessionPhase::Session);
        assert_eq!(
            cars.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );
    }

    #[test]
    fn test_unlisted_session_types_keep_simulator_order() {
        let mut cars = vec![(9, car(2, 0.4, 2)), (4, car(7, 0.9, 1))];
        sort_entry_list(&mut cars, RaceSessionType::Hotlap, SessionPhase::Session);
        assert_eq!(cars[0].0, 9);
    }

    #[test]
    fn test_rows_carry_placeholder_for_absent_laps() {
        let entries = vec![(1, car(0, 0.0, 1))];
        let rows = build_rows(&entries, RaceSessionType::Race, 1);
        assert_eq!(rows[0].fastest_lap, None);
        assert_eq!(format_laptime(rows[0].fastest_lap), "--:--.---");
        assert!(rows[0].is_player);
    }

    #[test]
    fn test_qualifying_interval_is_fastest_lap_delta() {
        let mut leader = car(0, 0.0, 1);
        leader.fastest_lap = LapInfo {
            laptime_ms: Some(90_000),
            ..Default::default()
        };
        let mut second = car(0, 0.0, 2);
        second.fastest_lap = LapInfo {
            laptime_ms: Some(91_250),
            ..Default::default()
        };

        let entries = vec![(1, leader), (2, second)];
        let rows = build_rows(&entries, RaceSessionType::Qualifying, 1);
        assert_eq!(rows[0].interval_ms, None);
        assert_eq!(rows[1].interval_ms, Some(1_250));
    }

    #[test]
    fn test_pit_annotations() {
        let mut pitted = car(3, 0.0, 1);
        pitted.car_location = CarLocation::Pitlane;
        assert_eq!(location_annotation(&pitted, RaceSessionType::Race), "Box");
        assert_eq!(
            location_annotation(&pitted, RaceSessionType::Practice),
            ""
        );

        let mut invalid = car(3, 0.5, 1);
        invalid.current_lap.is_invalid = true;
        assert_eq!(location_annotation(&invalid, RaceSessionType::Race), "X");
    }
}
