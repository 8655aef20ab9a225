//! Fuel info overlay
//!
//! Laps of fuel left, fuel needed to the end of the session and the
//! amount to add at the next stop, with an optional fuel-time/stint
//! section. Best used in a race; early-session data from the simulators
//! is unreliable.

use crate::config::load_overlay_config;
use crate::format::format_clock;
use crate::overlay::{Overlay, OverlayContext, RenderDecision};
use crate::overlays::panel::InfoPanel;
use crate::render::DrawContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use trackside_adapters::DemoAdapter;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::{CarInfo, Color};
use trackside_core::telemetry::TelemetrySnapshot;

const PANEL_WIDTH: u32 = 222;

/// Lap time feeding the fuel computation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LapTimeSource {
    /// Last lap until a best lap exists
    #[default]
    LastThenBest,
    BestOnly,
    LastOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelInfoConfig {
    pub laptime_source: LapTimeSource,
    /// Additional laps of fuel margin, 0..=3
    pub buffer_laps: u32,
    pub show_fuel_time: bool,
    pub show_stint_info: bool,
    /// Keep the panel visible in the setup screen
    pub show_in_setup: bool,
    pub refresh_hz: f32,
    pub medium_fuel_percent: f32,
    pub low_fuel_percent: f32,
}

impl Default for FuelInfoConfig {
    fn default() -> Self {
        Self {
            laptime_source: LapTimeSource::default(),
            buffer_laps: 0,
            show_fuel_time: true,
            show_stint_info: true,
            show_in_setup: false,
            refresh_hz: 2.0,
            medium_fuel_percent: 0.5,
            low_fuel_percent: 0.15,
        }
    }
}

impl FuelInfoConfig {
    fn sanitize(mut self) -> Self {
        self.buffer_laps = self.buffer_laps.min(3);
        self.medium_fuel_percent = self.medium_fuel_percent.clamp(0.30, 0.75);
        self.low_fuel_percent = self.low_fuel_percent.clamp(0.01, 0.25);
        self.refresh_hz = self.refresh_hz.clamp(0.5, 10.0);
        self
    }
}

/// Liters to take on: requirement to the end plus the buffer, minus what
/// is in the tank, never negative and never more than a full tank.
pub fn fuel_to_add(
    fuel_to_end_liters: f64,
    buffer_liters: f64,
    fuel_in_tank_liters: f64,
    max_fuel_liters: f64,
) -> f64 {
    (fuel_to_end_liters + buffer_liters - fuel_in_tank_liters)
        .ceil()
        .clamp(0.0, max_fuel_liters.max(0.0))
}

/// Reference lap time in ms, bounded to filter out out-laps and garbage
fn reference_laptime_ms(source: LapTimeSource, player: &CarInfo) -> Option<i32> {
    const MAX_SANE_MS: i32 = 12 * 60 * 1000;
    let sane = |ms: Option<i32>| ms.filter(|&v| v > 0 && v < MAX_SANE_MS);

    match source {
        LapTimeSource::BestOnly => sane(player.fastest_lap.laptime_ms),
        LapTimeSource::LastOnly => sane(player.last_lap.laptime_ms),
        LapTimeSource::LastThenBest => {
            sane(player.fastest_lap.laptime_ms).or_else(|| sane(player.last_lap.laptime_ms))
        }
    }
}

pub struct FuelInfoOverlay {
    config: FuelInfoConfig,
    panel: InfoPanel,
    height: u32,
}

impl FuelInfoOverlay {
    pub fn new() -> Self {
        Self::with_config(load_overlay_config::<FuelInfoConfig>("Fuel Info").sanitize())
    }

    pub fn with_config(config: FuelInfoConfig) -> Self {
        let config = config.sanitize();
        Self {
            config,
            panel: InfoPanel::new(PANEL_WIDTH),
            height: InfoPanel::height_for_rows(6),
        }
    }

    fn fuel_bar_color(&self, fraction: f32) -> Color {
        if fraction <= self.config.low_fuel_percent {
            Color::RED
        } else if fraction <= self.config.medium_fuel_percent {
            Color::ORANGE
        } else {
            Color::GREEN
        }
    }
}

impl Default for FuelInfoOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for FuelInfoOverlay {
    fn name(&self) -> &'static str {
        "Fuel Info"
    }

    fn size(&self) -> (u32, u32) {
        (PANEL_WIDTH, self.height)
    }

    fn refresh_rate_hz(&self) -> f32 {
        self.config.refresh_hz
    }

    fn before_start(&mut self, _ctx: &OverlayContext) -> Result<()> {
        let mut rows = 3u32; // bar + laps left + fuel to end
        if self.config.show_fuel_time {
            rows += 1;
        }
        if self.config.show_stint_info {
            rows += 2;
        }
        self.height = InfoPanel::height_for_rows(rows);
        Ok(())
    }

    fn should_render(&self, ctx: &OverlayContext) -> RenderDecision {
        if self.config.show_in_setup && ctx.telemetry.session().is_setup_menu_visible {
            return RenderDecision::Always;
        }
        RenderDecision::Default
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
        let (engine, stint_ms, session_time_left, player) = ctx.telemetry.read(|snap| {
            (
                snap.local_car.engine.clone(),
                snap.local_car.race.stint_time_left_ms,
                snap.session.session_time_left_secs,
                snap.session.cars.get(snap.session.player_car_index),
            )
        });

        let fraction = if engine.max_fuel_liters.0 > 0.0 {
            engine.fuel_liters.0 / engine.max_fuel_liters.0
        } else {
            0.0
        };
        self.panel.add_progress_bar(
            0.0,
            engine.max_fuel_liters.0.max(1.0),
            engine.fuel_liters.0,
            format!("{:.2} L", engine.fuel_liters.0),
            self.fuel_bar_color(fraction),
        );

        let laptime_ms = player
            .as_ref()
            .and_then(|p| reference_laptime_ms(self.config.laptime_source, p));
        let Some(laptime_ms) = laptime_ms else {
            if !ctx.preview {
                self.panel.add_line("No Laptime", "Waiting...".to_string());
            }
            self.panel.draw(g);
            return;
        };

        let laptime_secs = f64::from(laptime_ms) / 1000.0;
        let per_lap = f64::from(engine.fuel_liters_per_lap.0);
        let buffer_liters = per_lap * f64::from(self.config.buffer_laps);
        let fuel_to_end = session_time_left / laptime_secs * per_lap;
        let to_add = fuel_to_add(
            fuel_to_end,
            buffer_liters,
            f64::from(engine.fuel_liters.0),
            f64::from(engine.max_fuel_liters.0),
        );

        self.panel.add_line(
            "Laps Left",
            format!("{:.1} @ {:.2}L", engine.fuel_estimated_laps, per_lap),
        );
        self.panel.add_line(
            "Fuel-End",
            format!("{:.1} : Add {:.0}", fuel_to_end + buffer_liters, to_add),
        );

        if self.config.show_fuel_time {
            let fuel_time_secs = f64::from(engine.fuel_estimated_laps) * laptime_secs;
            let limit = match stint_ms {
                Some(ms) => f64::from(ms) / 1000.0,
                None => session_time_left,
            };
            let color = if fuel_time_secs <= limit {
                Color::RED
            } else {
                Color::LIME_GREEN
            };
            self.panel
                .add_colored_line("Fuel Time", format_clock(fuel_time_secs), color);
        }

        if self.config.show_stint_info {
            match stint_ms {
                Some(ms) => {
                    let stint_secs = f64::from(ms) / 1000.0;
                    let stint_fuel = stint_secs / laptime_secs * per_lap;
                    self.panel
                        .add_line("Stint Time", format_clock(stint_secs));
                    self.panel.add_line(
                        "Stint Fuel",
                        format!("{:.1}", stint_fuel + buffer_liters),
                    );
                }
                None => {
                    self.panel.add_line("Stint Time", "-".to_string());
                    self.panel.add_line("Stint Fuel", "No Stints".to_string());
                }
            }
        }

        self.panel.draw(g);
    }

    fn setup_preview_data(&self, snapshot: &mut TelemetrySnapshot) {
        DemoAdapter::new().setup_preview_data(&mut snapshot.local_car, &mut snapshot.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackside_core::model::LapInfo;

    #[test]
    fn test_fuel_to_add_clips_to_non_negative() {
        // 10 L on board, 2 L per lap, one buffer lap, only 2 laps to go:
        // requirement (4 + 2) is below what is in the tank
        let to_add = fuel_to_add(4.0, 2.0, 10.0, 60.0);
        assert_eq!(to_add, 0.0);
    }

    #[test]
    fn test_fuel_to_add_rounds_up_and_caps_at_tank() {
        assert_eq!(fuel_to_add(30.2, 0.0, 10.0, 60.0), 21.0);
        assert_eq!(fuel_to_add(500.0, 4.0, 10.0, 60.0), 60.0);
    }

    fn player_with(best: Option<i32>, last: Option<i32>) -> CarInfo {
        CarInfo {
            fastest_lap: LapInfo {
                laptime_ms: best,
                ..Default::default()
            },
            last_lap: LapInfo {
                laptime_ms: last,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_laptime_prefers_best_then_last() {
        let player = player_with(Some(90_000), Some(92_000));
        assert_eq!(
            reference_laptime_ms(LapTimeSource::LastThenBest, &player),
            Some(90_000)
        );

        let player = player_with(None, Some(92_000));
        assert_eq!(
            reference_laptime_ms(LapTimeSource::LastThenBest, &player),
            Some(92_000)
        );
    }

    #[test]
    fn test_reference_laptime_rejects_insane_values() {
        // An out-lap of 20 minutes is not a usable reference
        let player = player_with(Some(20 * 60 * 1000), None);
        assert_eq!(
            reference_laptime_ms(LapTimeSource::LastThenBest, &player),
            None
        );
        assert_eq!(reference_laptime_ms(LapTimeSource::BestOnly, &player), None);
    }

    #[test]
    fn test_config_sanitize_clamps_ranges() {
        let config = FuelInfoConfig {
            buffer_laps: 9,
            medium_fuel_percent: 0.9,
            low_fuel_percent: 0.0,
            refresh_hz: 500.0,
            ..Default::default()
        }
        .sanitize();

        assert_eq!(config.buffer_laps, 3);
        assert_eq!(config.medium_fuel_percent, 0.75);
        assert_eq!(config.low_fuel_percent, 0.01);
        assert_eq!(config.refresh_hz, 10.0);
    }

    #[test]
    fn test_row_count_follows_config() {
        let mut overlay = FuelInfoOverlay::with_config(FuelInfoConfig {
            show_fuel_time: false,
            show_stint_info: false,
            ..Default::default()
        });
        let (writer, reader) = trackside_core::telemetry::SharedTelemetry::new();
        drop(writer);
        let ctx = OverlayContext::new(reader, crate::config::HudOptions::default());

        overlay.before_start(&ctx).unwrap();
        assert_eq!(overlay.size().1, InfoPanel::height_for_rows(3));
    }
}
