//! Track map overlay
//!
//! Draws the traced centerline with the player's live position and the
//! current corner name. Until a map exists the creation job's progress
//! text is shown instead; the job runs alongside the overlay and hands
//! results over through shared slots.

pub mod creation;
pub mod format;

use crate::config::{config_root, load_overlay_config};
use crate::overlay::{Overlay, OverlayContext};
use crate::overlays::corners;
use crate::render::DrawContext;
use anyhow::Result;
use creation::TrackMapJob;
use format::TrackPoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trackside_core::jobs::Job;
use trackside_core::model::Color;
use trackside_core::telemetry::TelemetrySnapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackMapConfig {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: f32,
    pub show_corner_names: bool,
}

impl Default for TrackMapConfig {
    fn default() -> Self {
        Self {
            width: 280,
            height: 280,
            refresh_hz: 10.0,
            show_corner_names: true,
        }
    }
}

type PointsSlot = Arc<Mutex<Option<Vec<TrackPoint>>>>;
type ProgressSlot = Arc<Mutex<Option<String>>>;

pub struct TrackMapOverlay {
    config: TrackMapConfig,
    maps_dir: PathBuf,
    points: PointsSlot,
    progress: ProgressSlot,
    creation_job: Option<Job>,
}

impl TrackMapOverlay {
    pub fn new() -> Self {
        Self::with_config(load_overlay_config("Track Map"), config_root().join("tracks"))
    }

    pub fn with_config(config: TrackMapConfig, maps_dir: PathBuf) -> Self {
        Self {
            config,
            maps_dir,
            points: Arc::new(Mutex::new(None)),
            progress: Arc::new(Mutex::new(None)),
            creation_job: None,
        }
    }

    /// Scale traced points into the drawable box, preserving aspect ratio
    fn project(&self, points: &[TrackPoint]) -> Vec<(f32, f32)> {
        let (min_x, max_x) = points
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
        let (min_y, max_y) = points
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));

        let margin = 14.0;
        let box_w = self.config.width as f32 - 2.0 * margin;
        let box_h = self.config.height as f32 - 2.0 * margin;
        let span_x = (max_x - min_x).max(1.0);
        let span_y = (max_y - min_y).max(1.0);
        let scale = (box_w / span_x).min(box_h / span_y);

        points
            .iter()
            .map(|p| {
                (
                    margin + (p.x - min_x) * scale,
                    margin + (p.y - min_y) * scale,
                )
            })
            .collect()
    }

    /// Closest traced point to a spline position
    fn point_at_spline(points: &[TrackPoint], spline: f32) -> Option<usize> {
        points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.spline - spline).abs();
                let db = (b.spline - spline).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }
}

impl Default for TrackMapOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for TrackMapOverlay {
    fn name(&self) -> &'static str {
        "Track Map"
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn refresh_rate_hz(&self) -> f32 {
        self.config.refresh_hz
    }

    fn before_start(&mut self, ctx: &OverlayContext) -> Result<()> {
        let points = Arc::clone(&self.points);
        let progress = Arc::clone(&self.progress);

        let job = Job::new(
            "track-map-creation",
            Duration::from_millis(50),
            TrackMapJob::new(
                ctx.telemetry.clone(),
                self.maps_dir.clone(),
                Box::new(move |msg| {
                    *progress.lock().expect("progress slot poisoned") =
                        msg.map(str::to_string)
                }),
                Box::new(move |traced| {
                    *points.lock().expect("points slot poisoned") = Some(traced)
                }),
            ),
        );
        job.run();
        self.creation_job = Some(job);
        Ok(())
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
        let (width, height) = self.size();
        g.fill_rounded_rect(
            0.0,
            0.0,
            width as f32,
            height as f32,
            6.0,
            Color::rgba(10, 10, 10, 150),
        );

        let points = self.points.lock().expect("points slot poisoned").clone();
        let Some(points) = points.filter(|p| p.len() > 1) else {
            // No map yet: surface the creation job's status text
            let message = self
                .progress
                .lock()
                .expect("progress slot poisoned")
                .clone()
                .unwrap_or_else(|| "Waiting for telemetry...".to_string());
            for (i, line) in message.lines().enumerate() {
                g.text(line, 8.0, 18.0 + i as f32 * 14.0, 10.0, Color::WHITE, true);
            }
            return;
        };

        let projected = self.project(&points);
        for pair in projected.windows(2) {
            g.line(pair[0], pair[1], Color::WHITE, 2.0);
        }
        // Close the loop back to the start/finish line
        if let (Some(first), Some(last)) = (projected.first(), projected.last()) {
            g.line(*last, *first, Color::WHITE, 2.0);
        }

        let (track_name, player_spline) = ctx.telemetry.read(|snap| {
            (
                snap.session.track.game_name.clone(),
                snap.session
                    .cars
                    .get(snap.session.player_car_index)
                    .map(|p| p.track_percent_completed)
                    .unwrap_or(0.0),
            )
        });

        if let Some(idx) = Self::point_at_spline(&points, player_spline) {
            let (x, y) = projected[idx];
            g.fill_rounded_rect(x - 4.0, y - 4.0, 8.0, 8.0, 4.0, Color::rgb(120, 200, 255));
        }

        if self.config.show_corner_names {
            if let Some((number, name)) = corners::corner_at(&track_name, player_spline) {
                g.text(
                    &format!("T{number} {name}"),
                    8.0,
                    height as f32 - 8.0,
                    10.0,
                    Color::rgb(255, 190, 30),
                    true,
                );
            }
        }
    }

    fn before_stop(&mut self) {
        if let Some(job) = self.creation_job.take() {
            job.cancel_join();
        }
        *self.points.lock().expect("points slot poisoned") = None;
        *self.progress.lock().expect("progress slot poisoned") = None;
    }

    fn setup_preview_data(&self, snapshot: &mut TelemetrySnapshot) {
        use trackside_adapters::DemoAdapter;
        use trackside_core::adapter::SimulatorAdapter;
        DemoAdapter::new().setup_preview_data(&mut snapshot.local_car, &mut snapshot.session);

        // Previews skip the creation job; inject a synthetic loop
        let circle: Vec<TrackPoint> = (0..64)
            .map(|i| {
                let angle = i as f32 / 64.0 * std::f32::consts::TAU;
                TrackPoint {
                    x: angle.cos() * 100.0,
                    y: angle.sin() * 70.0,
                    spline: i as f32 / 64.0,
                }
            })
            .collect();
        *self.points.lock().expect("points slot poisoned") = Some(circle);
    }
}
