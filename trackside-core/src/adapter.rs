//! Simulator adapter trait definition

use crate::model::{Color, Game, GameData, LocalCarData, SessionData};

/// Trait for game-specific telemetry adapters
///
/// Each adapter owns one raw telemetry source (a shared-memory block or a
/// UDP stream) and translates it into the common model. Exactly one
/// adapter is active at a time; the poll loop owns construction, the
/// update cadence and teardown.
pub trait SimulatorAdapter: Send {
    /// The simulator this adapter reads
    fn game(&self) -> Game;

    /// Read one fresh frame from the source and overwrite the relevant
    /// fields of the given structures.
    ///
    /// Must be idempotent and non-blocking when no new frame is
    /// available: stale or zeroed source data leaves the structures as
    /// they are. A malformed or short raw buffer decodes to best-effort
    /// defaults; this method never panics on bad input.
    fn update(
        &mut self,
        car: &mut LocalCarData,
        session: &mut SessionData,
        game: &mut GameData,
    );

    /// Whether the source currently delivers live data
    ///
    /// False while the simulator is not running or its shared region has
    /// not been created yet. Callers treat false as "render nothing",
    /// never as an error.
    fn has_telemetry(&self) -> bool;

    /// Release source handles (mapped views, sockets)
    ///
    /// Safe to call multiple times.
    fn stop(&mut self);

    /// Car classes present in the current session
    fn car_classes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Display color for a car class
    fn class_color(&self, _car_class: &str) -> Color {
        Color::WHITE
    }

    /// Populate synthetic telemetry into a scratch snapshot so overlays
    /// can render deterministic previews without a running simulator.
    ///
    /// Implementations write only into the given structures; the live
    /// snapshot is never touched from here.
    fn setup_preview_data(&self, _car: &mut LocalCarData, _session: &mut SessionData) {}
}
