//! Overlay trait and render gating
//!
//! One trait covers every overlay; there is no legacy/common split. An
//! overlay that needs derived telemetry events gets them through
//! `on_event` via the lifecycle manager's subscription, and everything an
//! overlay reads flows through the [`OverlayContext`] it was started with.

use crate::config::HudOptions;
use crate::render::DrawContext;
use anyhow::Result;
use trackside_core::events::TelemetryEvent;
use trackside_core::model::{SessionPhase, SimStatus};
use trackside_core::telemetry::{SharedTelemetry, TelemetrySnapshot};

/// Everything an overlay may read while active
#[derive(Clone)]
pub struct OverlayContext {
    pub telemetry: SharedTelemetry,
    pub options: HudOptions,
    /// True while rendering a configuration-screen preview
    pub preview: bool,
}

impl OverlayContext {
    pub fn new(telemetry: SharedTelemetry, options: HudOptions) -> Self {
        Self {
            telemetry,
            options,
            preview: false,
        }
    }
}

/// Per-overlay override of the default render gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderDecision {
    /// Use [`default_should_render`]
    #[default]
    Default,
    /// Render regardless of session state (e.g. "show in setup screen")
    Always,
    /// Hide regardless of session state
    Never,
}

/// One independently configured, positioned and timed HUD widget
pub trait Overlay: Send {
    fn name(&self) -> &'static str;

    /// Current extent; auto-sizing overlays may change this per frame
    fn size(&self) -> (u32, u32);

    fn refresh_rate_hz(&self) -> f32 {
        1.0
    }

    /// Invoked once before the render timer starts. Sizing adjustments
    /// and auxiliary collector jobs belong here. An error aborts the
    /// activation.
    fn before_start(&mut self, _ctx: &OverlayContext) -> Result<()> {
        Ok(())
    }

    /// Derived telemetry change notifications, delivered while active
    fn on_event(&mut self, _event: &TelemetryEvent) {}

    fn should_render(&self, _ctx: &OverlayContext) -> RenderDecision {
        RenderDecision::Default
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext);

    /// Invoked once after the render timer stopped and events were
    /// unsubscribed; release cached drawing resources here.
    fn before_stop(&mut self) {}

    /// Fill a scratch snapshot with synthetic data for preview rendering.
    /// The live snapshot is never passed in here.
    fn setup_preview_data(&self, _snapshot: &mut TelemetrySnapshot) {}
}

/// The conservative default gate: render nothing when uncertain.
pub fn default_should_render(ctx: &OverlayContext) -> bool {
    if ctx.preview || ctx.options.demo_mode {
        return true;
    }
    if !ctx.telemetry.has_telemetry() {
        return false;
    }

    ctx.telemetry.read(|snap| {
        if snap.game.game.is_none() {
            return false;
        }

        let mut should_render = true;

        match snap.game.status {
            SimStatus::Off | SimStatus::Pause | SimStatus::Replay => should_render = false,
            SimStatus::Live => {}
        }

        if snap.session.flag == trackside_core::model::RaceFlag::Red {
            should_render = false;
        }

        // A formation lap is driven with HUDs visible even under red
        if snap.session.phase == SessionPhase::FormationLap
            && snap.game.status == SimStatus::Live
        {
            should_render = true;
        }

        if snap.session.focused_car_index != snap.session.player_car_index {
            should_render = false;
        }

        should_render
    })
}

/// Combine an overlay's override with the default gate
pub fn resolve_should_render(overlay: &dyn Overlay, ctx: &OverlayContext) -> bool {
    match overlay.should_render(ctx) {
        RenderDecision::Always => true,
        RenderDecision::Never => false,
        RenderDecision::Default => default_should_render(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackside_core::model::{Game, RaceFlag};

    fn live_context() -> (trackside_core::telemetry::TelemetryWriter, OverlayContext) {
        let (writer, reader) = SharedTelemetry::new();
        writer.update(|snap| {
            snap.game.game = Some(Game::IRacing);
            snap.game.status = SimStatus::Live;
            snap.session.player_car_index = 3;
            snap.session.focused_car_index = 3;
        });
        writer.set_has_telemetry(true);
        (writer, OverlayContext::new(reader, HudOptions::default()))
    }

    #[test]
    fn test_default_gate_renders_live_session() {
        let (_writer, ctx) = live_context();
        assert!(default_should_render(&ctx));
    }

    #[test]
    fn test_default_gate_hides_without_telemetry() {
        let (writer, ctx) = live_context();
        writer.set_has_telemetry(false);
        assert!(!default_should_render(&ctx));
    }

    #[test]
    fn test_default_gate_hides_paused_and_replay() {
        let (writer, ctx) = live_context();
        for status in [SimStatus::Pause, SimStatus::Replay, SimStatus::Off] {
            writer.update(|snap| snap.game.status = status);
            assert!(!default_should_render(&ctx), "{status:?} should hide");
        }
    }

    #[test]
    fn test_default_gate_hides_when_focus_is_elsewhere() {
        let (writer, ctx) = live_context();
        writer.update(|snap| snap.session.focused_car_index = 9);
        assert!(!default_should_render(&ctx));
    }

    #[test]
    fn test_red_flag_hides_but_formation_lap_shows() {
        let (writer, ctx) = live_context();
        writer.update(|snap| snap.session.flag = RaceFlag::Red);
        assert!(!default_should_render(&ctx));

        writer.update(|snap| snap.session.phase = SessionPhase::FormationLap);
        assert!(default_should_render(&ctx));
    }

    #[test]
    fn test_demo_mode_is_an_escape_hatch() {
        let (writer, mut ctx) = live_context();
        writer.set_has_telemetry(false);
        ctx.options.demo_mode = true;
        assert!(default_should_render(&ctx));
    }

    #[test]
    fn test_overrides_beat_the_default() {
        struct Fixed(RenderDecision);
        impl Overlay for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn size(&self) -> (u32, u32) {
                (10, 10)
            }
            fn should_render(&self, _ctx: &OverlayContext) -> RenderDecision {
                self.0
            }
            fn render(&mut self, _g: &mut dyn DrawContext, _ctx: &OverlayContext) {}
        }

        let (writer, ctx) = live_context();
        writer.set_has_telemetry(false);

        assert!(resolve_should_render(&Fixed(RenderDecision::Always), &ctx));
        assert!(!resolve_should_render(&Fixed(RenderDecision::Never), &ctx));
        assert!(!resolve_should_render(&Fixed(RenderDecision::Default), &ctx));
    }
}
