//! Lap delta bar overlay
//!
//! Horizontal bar showing the live delta to the personal best lap: bar
//! grows left (faster, green) or right (slower, red) from the center,
//! with the numeric delta on top.

use crate::config::load_overlay_config;
use crate::overlay::{Overlay, OverlayContext};
use crate::render::DrawContext;
use serde::{Deserialize, Serialize};
use trackside_adapters::DemoAdapter;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::model::Color;
use trackside_core::telemetry::TelemetrySnapshot;

const BAR_HEIGHT: u32 = 34;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LapDeltaConfig {
    pub width: u32,
    /// Full-bar deflection in seconds
    pub max_delta_secs: f32,
    pub refresh_hz: f32,
}

impl Default for LapDeltaConfig {
    fn default() -> Self {
        Self {
            width: 300,
            max_delta_secs: 2.0,
            refresh_hz: 20.0,
        }
    }
}

pub struct LapDeltaOverlay {
    config: LapDeltaConfig,
}

impl LapDeltaOverlay {
    pub fn new() -> Self {
        Self::with_config(load_overlay_config("Lap Delta"))
    }

    pub fn with_config(config: LapDeltaConfig) -> Self {
        Self { config }
    }

    /// Signed fill fraction: negative fills left of center (faster)
    pub fn deflection(&self, delta_ms: f32) -> f32 {
        let max_ms = self.config.max_delta_secs * 1000.0;
        (delta_ms / max_ms).clamp(-1.0, 1.0)
    }
}

impl Default for LapDeltaOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for LapDeltaOverlay {
    fn name(&self) -> &'static str {
        "Lap Delta"
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, BAR_HEIGHT)
    }

    fn refresh_rate_hz(&self) -> f32 {
        self.config.refresh_hz
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
        let (delta_ms, has_best) = ctx.telemetry.read(|snap| {
            (
                snap.local_car.timing.lap_delta_to_best_ms,
                snap.local_car.timing.best_laptime_ms.is_some(),
            )
        });

        let width = self.config.width as f32;
        g.fill_rounded_rect(0.0, 0.0, width, BAR_HEIGHT as f32, 4.0, Color::rgba(10, 10, 10, 168));

        // No reference lap, no delta to show
        if !has_best && !ctx.preview {
            g.text("--.---", width / 2.0 - 18.0, 21.0, 12.0, Color::WHITE, true);
            return;
        }

        let center = width / 2.0;
        let deflection = self.deflection(delta_ms);
        let fill = deflection.abs() * (width / 2.0 - 4.0);
        let (x, color) = if deflection <= 0.0 {
            (center - fill, Color::LIME_GREEN)
        } else {
            (center, Color::RED)
        };
        g.fill_rounded_rect(x, 6.0, fill, BAR_HEIGHT as f32 - 12.0, 2.0, color);
        g.line(
            (center, 2.0),
            (center, BAR_HEIGHT as f32 - 2.0),
            Color::WHITE,
            1.0,
        );

        let label = format!("{:+.3}", delta_ms / 1000.0);
        let x = center - g.measure_text(&label, 12.0) / 2.0;
        g.text(&label, x, 21.0, 12.0, Color::WHITE, true);
    }

    fn setup_preview_data(&self, snapshot: &mut TelemetrySnapshot) {
        DemoAdapter::new().setup_preview_data(&mut snapshot.local_car, &mut snapshot.session);
        snapshot.local_car.timing.lap_delta_to_best_ms = -420.0;
    }
}
