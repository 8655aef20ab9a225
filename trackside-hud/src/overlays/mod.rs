//! Overlay implementations

pub mod corners;
pub mod fuel;
pub mod input_trace;
pub mod lap_delta;
pub mod panel;
pub mod standings;
pub mod track_map;

pub use fuel::FuelInfoOverlay;
pub use input_trace::InputTraceOverlay;
pub use lap_delta::LapDeltaOverlay;
pub use standings::StandingsOverlay;
pub use track_map::TrackMapOverlay;
