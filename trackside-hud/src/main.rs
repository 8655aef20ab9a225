//! Trackside HUD host
//!
//! Wires the telemetry poller, game detection and the overlay manager
//! together and runs until stdin closes. `--demo` selects the built-in
//! synthetic telemetry source instead of waiting for a simulator.

use anyhow::Result;
use std::io::BufRead;
use std::sync::Arc;
use tracing::info;
use trackside_core::events::TelemetryEvents;
use trackside_core::jobs::Job;
use trackside_core::model::Game;
use trackside_core::telemetry::SharedTelemetry;
use trackside_hud::config::{load_overlay_config, HudOptions};
use trackside_hud::detect::{GameDetectionJob, DETECTION_INTERVAL};
use trackside_hud::manager::OverlayManager;
use trackside_hud::overlay::OverlayContext;
use trackside_hud::overlays::{
    FuelInfoOverlay, InputTraceOverlay, LapDeltaOverlay, StandingsOverlay, TrackMapOverlay,
};
use trackside_hud::poller::{GameSelector, TelemetryPoller, DEFAULT_POLL_INTERVAL};
use trackside_hud::render::HeadlessBackend;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let demo = std::env::args().any(|arg| arg == "--demo");
    let mut options: HudOptions = load_overlay_config("hud");
    if demo {
        options.demo_mode = true;
    }

    info!("Starting Trackside HUD host");

    let (writer, telemetry) = SharedTelemetry::new();
    let events = TelemetryEvents::new();
    let selector = GameSelector::new();
    if demo {
        selector.select(Some(Game::Demo));
    }

    let poller = Job::new(
        "telemetry-poller",
        DEFAULT_POLL_INTERVAL,
        TelemetryPoller::new(writer, events.clone(), selector.clone()),
    );
    poller.run();

    let detection = Job::new(
        "game-detection",
        DETECTION_INTERVAL,
        GameDetectionJob::new(selector),
    );
    detection.run();

    let ctx = OverlayContext::new(telemetry, options);
    let manager = OverlayManager::new(ctx, events, Arc::new(HeadlessBackend::new()));

    manager.start(Box::new(FuelInfoOverlay::new()))?;
    manager.start(Box::new(StandingsOverlay::new()))?;
    manager.start(Box::new(LapDeltaOverlay::new()))?;
    manager.start(Box::new(InputTraceOverlay::new()))?;
    manager.start(Box::new(TrackMapOverlay::new()))?;
    info!(overlays = ?manager.active_names(), "overlays running, close stdin to exit");

    // Block until the controlling shell closes stdin or sends a line
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    info!("shutting down");
    manager.stop_all();
    detection.cancel_join();
    poller.cancel_join();
    Ok(())
}
