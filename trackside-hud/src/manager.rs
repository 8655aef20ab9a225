//! Overlay lifecycle manager
//!
//! Owns the set of active overlay instances. Each activation runs the
//! `before_start` -> subscribe -> render-job sequence exactly once, and
//! teardown always runs in the reverse order: stop the render timer,
//! drop the event subscription, then let the overlay dispose its cached
//! drawing resources. Subscriptions are RAII handles stored in the
//! active entry, so an aborted activation can never leak a listener.

use crate::overlay::{Overlay, OverlayContext};
use crate::render::{
    CommandRecorder, DrawCommand, RenderJob, SurfaceOptions, WindowBackend,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use trackside_core::events::{Subscription, TelemetryEvents};
use trackside_core::jobs::Job;
use trackside_core::telemetry::{SharedTelemetry, TelemetrySnapshot};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum OverlayStartError {
    #[error("overlay \"{0}\" is already active")]
    AlreadyActive(&'static str),
}

struct ActiveOverlay {
    overlay: Arc<Mutex<Box<dyn Overlay>>>,
    render_job: Job,
    subscription: Subscription,
}

pub struct OverlayManager {
    ctx: OverlayContext,
    events: TelemetryEvents,
    backend: Arc<dyn WindowBackend>,
    active: Mutex<HashMap<&'static str, ActiveOverlay>>,
}

fn interval_from_hz(hz: f32) -> Duration {
    let hz = hz.clamp(0.25, 120.0);
    Duration::from_millis((1000.0 / hz) as u64)
}

impl OverlayManager {
    pub fn new(
        ctx: OverlayContext,
        events: TelemetryEvents,
        backend: Arc<dyn WindowBackend>,
    ) -> Self {
        Self {
            ctx,
            events,
            backend,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Activate an overlay. At most one instance per overlay name can be
    /// active; a second start without an intervening stop is rejected.
    pub fn start(&self, mut overlay: Box<dyn Overlay>) -> Result<()> {
        let name = overlay.name();
        let mut active = self.active.lock().expect("overlay registry poisoned");
        if active.contains_key(name) {
            return Err(OverlayStartError::AlreadyActive(name).into());
        }

        // Nothing is wired yet; an error here aborts the activation with
        // no cleanup to perform.
        overlay.before_start(&self.ctx)?;

        let (width, height) = overlay.size();
        let refresh_hz = overlay.refresh_rate_hz();
        let overlay = Arc::new(Mutex::new(overlay));

        let subscription = {
            let overlay = Arc::clone(&overlay);
            self.events.subscribe(move |event| {
                let mut overlay = overlay
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                overlay.on_event(event);
            })
        };

        // If surface creation fails the subscription handle drops right
        // here and the listener is gone.
        let surface = self.backend.create_surface(&SurfaceOptions {
            title: name.to_string(),
            width,
            height,
            topmost: true,
            transparent: true,
            click_through: false,
        })?;

        let render_job = Job::new(
            format!("render-{name}"),
            interval_from_hz(refresh_hz),
            RenderJob::new(Arc::clone(&overlay), surface, self.ctx.clone()),
        );
        render_job.run();

        info!(overlay = name, hz = refresh_hz, "overlay started");
        active.insert(
            name,
            ActiveOverlay {
                overlay,
                render_job,
                subscription,
            },
        );
        Ok(())
    }

    /// Deactivate an overlay; `false` when it was not active.
    pub fn stop(&self, name: &str) -> bool {
        let entry = self
            .active
            .lock()
            .expect("overlay registry poisoned")
            .remove(name);
        let Some(entry) = entry else {
            warn!(overlay = name, "stop for an overlay that is not active");
            return false;
        };

        // Render timer first: no tick can be in flight afterwards.
        entry.render_job.cancel_join();
        // Unsubscribe before the overlay disposes anything a late event
        // handler could still touch.
        drop(entry.subscription);
        entry
            .overlay
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .before_stop();

        info!(overlay = name, "overlay stopped");
        true
    }

    pub fn stop_all(&self) {
        let names: Vec<&'static str> = self
            .active
            .lock()
            .expect("overlay registry poisoned")
            .keys()
            .copied()
            .collect();
        for name in names {
            self.stop(name);
        }
    }

    pub fn active_names(&self) -> Vec<&'static str> {
        self.active
            .lock()
            .expect("overlay registry poisoned")
            .keys()
            .copied()
            .collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active
            .lock()
            .expect("overlay registry poisoned")
            .contains_key(name)
    }
}

/// Render one frame of an overlay against synthetic preview data.
///
/// Builds a scratch snapshot, lets the overlay populate it through
/// `setup_preview_data` and records the resulting draw calls. The live
/// telemetry context is never touched, so generating configuration
/// thumbnails cannot corrupt a running session.
pub fn render_preview(overlay: &mut dyn Overlay, options: crate::config::HudOptions) -> Vec<DrawCommand> {
    let (writer, reader) = SharedTelemetry::new();
    writer.update(|snap: &mut TelemetrySnapshot| overlay.setup_preview_data(snap));
    writer.set_has_telemetry(true);

    let mut ctx = OverlayContext::new(reader, options);
    ctx.preview = true;

    let (width, height) = overlay.size();
    let mut recorder = CommandRecorder::new(width, height);
    overlay.render(&mut recorder, &ctx);
    recorder.into_commands()
}
