//! Integration tests for the overlay lifecycle and render dispatch

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use trackside_core::events::{TelemetryEvent, TelemetryEvents};
use trackside_core::model::SimStatus;
use trackside_core::telemetry::{SharedTelemetry, TelemetryWriter};
use trackside_hud::config::HudOptions;
use trackside_hud::manager::{render_preview, OverlayManager};
use trackside_hud::overlay::{Overlay, OverlayContext, RenderDecision};
use trackside_hud::render::{DrawCommand, DrawContext, HeadlessBackend, WindowBackend};

/// Test double recording its lifecycle and rendering the lap counter it
/// currently sees
struct ProbeOverlay {
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
    events_seen: Arc<AtomicUsize>,
    rendered_laps: Arc<AtomicI32>,
    renders: Arc<AtomicUsize>,
    gate: Arc<AtomicBool>,
}

#[derive(Clone, Default)]
struct ProbeHandles {
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
    events_seen: Arc<AtomicUsize>,
    rendered_laps: Arc<AtomicI32>,
    renders: Arc<AtomicUsize>,
    gate: Arc<AtomicBool>,
}

impl ProbeOverlay {
    fn new(handles: &ProbeHandles) -> Box<Self> {
        Box::new(Self {
            started: Arc::clone(&handles.started),
            stopped: Arc::clone(&handles.stopped),
            events_seen: Arc::clone(&handles.events_seen),
            rendered_laps: Arc::clone(&handles.rendered_laps),
            renders: Arc::clone(&handles.renders),
            gate: Arc::clone(&handles.gate),
        })
    }
}

impl Overlay for ProbeOverlay {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn size(&self) -> (u32, u32) {
        (80, 24)
    }

    fn refresh_rate_hz(&self) -> f32 {
        100.0
    }

    fn before_start(&mut self, _ctx: &OverlayContext) -> anyhow::Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_event(&mut self, _event: &TelemetryEvent) {
        self.events_seen.fetch_add(1, Ordering::SeqCst);
    }

    fn should_render(&self, _ctx: &OverlayContext) -> RenderDecision {
        if self.gate.load(Ordering::SeqCst) {
            RenderDecision::Always
        } else {
            RenderDecision::Never
        }
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
        let laps = ctx
            .telemetry
            .read(|snap| snap.local_car.race.laps_driven);
        self.rendered_laps.store(laps, Ordering::SeqCst);
        self.renders.fetch_add(1, Ordering::SeqCst);
        g.text(&format!("laps {laps}"), 2.0, 12.0, 11.0, Default::default(), false);
    }

    fn before_stop(&mut self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

struct Fixture {
    manager: OverlayManager,
    writer: TelemetryWriter,
    events: TelemetryEvents,
    handles: ProbeHandles,
}

fn fixture() -> Fixture {
    let (writer, telemetry) = SharedTelemetry::new();
    let events = TelemetryEvents::new();
    let ctx = OverlayContext::new(telemetry, HudOptions::default());
    let manager = OverlayManager::new(ctx, events.clone(), Arc::new(HeadlessBackend::new()));
    Fixture {
        manager,
        writer,
        events,
        handles: ProbeHandles::default(),
    }
}

#[test]
fn test_double_start_is_rejected() {
    let fx = fixture();
    fx.manager.start(ProbeOverlay::new(&fx.handles)).unwrap();
    let err = fx
        .manager
        .start(ProbeOverlay::new(&fx.handles))
        .unwrap_err();
    assert!(err.to_string().contains("already active"));
    assert_eq!(fx.handles.started.load(Ordering::SeqCst), 1);

    // Stop then start works again
    assert!(fx.manager.stop("probe"));
    fx.manager.start(ProbeOverlay::new(&fx.handles)).unwrap();
    assert_eq!(fx.handles.started.load(Ordering::SeqCst), 2);
    fx.manager.stop_all();
}

#[test]
fn test_stop_runs_before_stop_and_detaches_events() {
    let fx = fixture();
    fx.manager.start(ProbeOverlay::new(&fx.handles)).unwrap();

    fx.events.emit(&TelemetryEvent::StatusChanged(SimStatus::Live));
    assert_eq!(fx.handles.events_seen.load(Ordering::SeqCst), 1);

    assert!(fx.manager.stop("probe"));
    assert_eq!(fx.handles.stopped.load(Ordering::SeqCst), 1);

    // A post-stop event must not reach the overlay
    fx.events.emit(&TelemetryEvent::StatusChanged(SimStatus::Pause));
    assert_eq!(fx.handles.events_seen.load(Ordering::SeqCst), 1);

    // Stopping again reports not-active
    assert!(!fx.manager.stop("probe"));
}

#[test]
fn test_gated_render_resumes_with_current_data() {
    let fx = fixture();
    // Gate closed: ticks run but nothing renders
    fx.handles.gate.store(false, Ordering::SeqCst);
    fx.writer.update(|snap| snap.local_car.race.laps_driven = 1);

    fx.manager.start(ProbeOverlay::new(&fx.handles)).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fx.handles.renders.load(Ordering::SeqCst), 0);

    // Data moves on while hidden; the first visible frame must show the
    // current value, not anything captured while gated off
    fx.writer.update(|snap| snap.local_car.race.laps_driven = 11);
    fx.handles.gate.store(true, Ordering::SeqCst);

    let handles = fx.handles.clone();
    assert!(wait_until(Duration::from_secs(2), || handles
        .renders
        .load(Ordering::SeqCst)
        > 0));
    assert_eq!(fx.handles.rendered_laps.load(Ordering::SeqCst), 11);

    fx.manager.stop_all();
}

#[test]
fn test_render_job_survives_a_panicking_overlay() {
    struct PanickyOverlay {
        renders: Arc<AtomicUsize>,
    }

    impl Overlay for PanickyOverlay {
        fn name(&self) -> &'static str {
            "panicky"
        }
        fn size(&self) -> (u32, u32) {
            (10, 10)
        }
        fn refresh_rate_hz(&self) -> f32 {
            100.0
        }
        fn should_render(&self, _ctx: &OverlayContext) -> RenderDecision {
            RenderDecision::Always
        }
        fn render(&mut self, _g: &mut dyn DrawContext, _ctx: &OverlayContext) {
            let n = self.renders.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                panic!("first frame explodes");
            }
        }
    }

    let fx = fixture();
    let renders = Arc::new(AtomicUsize::new(0));
    fx.manager
        .start(Box::new(PanickyOverlay {
            renders: Arc::clone(&renders),
        }))
        .unwrap();

    let probe = Arc::clone(&renders);
    assert!(
        wait_until(Duration::from_secs(2), || probe.load(Ordering::SeqCst) >= 3),
        "render timer must keep firing after a panicked frame"
    );
    fx.manager.stop_all();
}

#[test]
fn test_preview_renders_without_touching_live_telemetry() {
    struct PreviewOverlay;

    impl Overlay for PreviewOverlay {
        fn name(&self) -> &'static str {
            "preview"
        }
        fn size(&self) -> (u32, u32) {
            (100, 20)
        }
        fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
            let laps = ctx.telemetry.read(|snap| snap.local_car.race.laps_driven);
            g.text(&format!("{laps}"), 0.0, 10.0, 10.0, Default::default(), false);
        }
        fn setup_preview_data(&self, snapshot: &mut trackside_core::telemetry::TelemetrySnapshot) {
            snapshot.local_car.race.laps_driven = 77;
        }
    }

    let commands = render_preview(&mut PreviewOverlay, HudOptions::default());
    assert!(commands
        .iter()
        .any(|c| matches!(c, DrawCommand::Text { text, .. } if text == "77")));
}

#[test]
fn test_headless_backend_records_presented_frames() {
    let (writer, telemetry) = SharedTelemetry::new();
    writer.update(|snap| snap.local_car.race.laps_driven = 5);
    let events = TelemetryEvents::new();
    let backend = Arc::new(HeadlessBackend::new());
    let ctx = OverlayContext::new(telemetry, HudOptions::default());
    let manager = OverlayManager::new(ctx, events, Arc::clone(&backend) as Arc<dyn WindowBackend>);

    let handles = ProbeHandles::default();
    handles.gate.store(true, Ordering::SeqCst);
    manager.start(ProbeOverlay::new(&handles)).unwrap();

    let probe = backend.probe("probe").expect("surface created");
    assert!(wait_until(Duration::from_secs(2), || probe.frames_presented() > 0));

    let rendered_text = Arc::new(Mutex::new(String::new()));
    let commands = probe.last_commands();
    if let Some(DrawCommand::Text { text, .. }) =
        commands.iter().find(|c| matches!(c, DrawCommand::Text { .. }))
    {
        *rendered_text.lock().unwrap() = text.clone();
    }
    assert_eq!(*rendered_text.lock().unwrap(), "laps 5");

    manager.stop_all();
}
