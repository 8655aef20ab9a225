//! Trackside Core Library
//!
//! The common telemetry model shared by every simulator adapter, the
//! adapter trait itself, the process-wide snapshot context, the telemetry
//! event bus and the generic repeating-job scheduler the whole overlay
//! host is built on.

pub mod adapter;
pub mod events;
pub mod jobs;
pub mod model;
pub mod telemetry;
pub mod units;

pub use adapter::SimulatorAdapter;
pub use events::{Subscription, TelemetryEvent, TelemetryEvents};
pub use jobs::{Job, LoopJob};
pub use model::Game;
pub use telemetry::{SharedTelemetry, TelemetrySnapshot, TelemetryWriter};
