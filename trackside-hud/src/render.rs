//! Render dispatch
//!
//! The drawing boundary between overlays and the OS windowing
//! collaborator: overlays issue immediate-mode calls against a
//! [`DrawContext`], a [`WindowBackend`] supplies per-overlay transparent
//! surfaces, and a [`RenderJob`] drives one overlay's redraw cadence.
//! Expensive static imagery is cached in a [`RenderCache`] keyed by the
//! parameters that affect its appearance.

use crate::overlay::{resolve_should_render, Overlay, OverlayContext};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trackside_core::jobs::LoopJob;
use trackside_core::model::Color;

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        width: f32,
    },
    RoundedRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
        color: Color,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        color: Color,
        shadow: bool,
    },
    Blit {
        x: f32,
        y: f32,
        width: u32,
        height: u32,
    },
}

/// Immediate-mode 2D drawing surface handed to overlays each frame
pub trait DrawContext {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Color);
    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32);
    fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Color);
    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Color, shadow: bool);
    /// Approximate width of `text` at `size`
    fn measure_text(&self, text: &str, size: f32) -> f32;
    fn blit(&mut self, image: &Image, x: f32, y: f32);
}

/// A prerendered command list, replayed with a cheap blit
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl Image {
    /// Record draw calls into an immutable image
    pub fn render(width: u32, height: u32, draw: impl FnOnce(&mut dyn DrawContext)) -> Self {
        let mut recorder = CommandRecorder::new(width, height);
        draw(&mut recorder);
        Self {
            width,
            height,
            commands: recorder.commands,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

/// DrawContext that records commands instead of rasterizing
pub struct CommandRecorder {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}

impl DrawContext for CommandRecorder {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            color,
            width,
        });
    }

    fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Color) {
        self.commands.push(DrawCommand::RoundedRect {
            x,
            y,
            width: w,
            height: h,
            radius,
            color,
        });
    }

    fn text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Color, shadow: bool) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            size,
            color,
            shadow,
        });
    }

    fn measure_text(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * size * 0.55
    }

    fn blit(&mut self, image: &Image, x: f32, y: f32) {
        self.commands.push(DrawCommand::Blit {
            x,
            y,
            width: image.width,
            height: image.height,
        });
    }
}

/// Single-slot cache for an expensive-to-regenerate image.
///
/// The image is rebuilt only when the key changes; identical keys blit
/// the cached copy.
pub struct RenderCache<K: PartialEq + Clone> {
    slot: Option<(K, Image)>,
}

impl<K: PartialEq + Clone> RenderCache<K> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn get_or_render(
        &mut self,
        key: K,
        width: u32,
        height: u32,
        draw: impl FnOnce(&mut dyn DrawContext),
    ) -> &Image {
        let stale = match &self.slot {
            Some((cached, _)) => *cached != key,
            None => true,
        };
        if stale {
            self.slot = Some((key, Image::render(width, height, draw)));
        }
        &self.slot.as_ref().expect("just rendered").1
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}

impl<K: PartialEq + Clone> Default for RenderCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

// === OS window collaborator boundary ===

#[derive(Debug, Clone)]
pub struct SurfaceOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub topmost: bool,
    pub transparent: bool,
    pub click_through: bool,
}

/// One overlay's transparent, always-on-top window surface
pub trait OverlaySurface: Send {
    fn resize(&mut self, width: u32, height: u32);
    /// Run one frame of draw calls and present it
    fn frame(&mut self, draw: &mut dyn FnMut(&mut dyn DrawContext));
}

/// Creates overlay surfaces; implemented by the OS windowing collaborator
pub trait WindowBackend: Send + Sync {
    fn create_surface(&self, options: &SurfaceOptions) -> Result<Box<dyn OverlaySurface>>;
}

/// Shared inspection handle for one headless surface
#[derive(Clone, Default)]
pub struct SurfaceProbe {
    frames: Arc<AtomicUsize>,
    last_commands: Arc<Mutex<Vec<DrawCommand>>>,
}

impl SurfaceProbe {
    pub fn frames_presented(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn last_commands(&self) -> Vec<DrawCommand> {
        self.last_commands.lock().expect("probe lock poisoned").clone()
    }
}

struct HeadlessSurface {
    width: u32,
    height: u32,
    probe: SurfaceProbe,
}

impl OverlaySurface for HeadlessSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn frame(&mut self, draw: &mut dyn FnMut(&mut dyn DrawContext)) {
        let mut recorder = CommandRecorder::new(self.width, self.height);
        draw(&mut recorder);
        *self
            .probe
            .last_commands
            .lock()
            .expect("probe lock poisoned") = recorder.into_commands();
        self.probe.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that records frames instead of opening windows; used for
/// preview rendering and tests.
#[derive(Default)]
pub struct HeadlessBackend {
    probes: Mutex<Vec<(String, SurfaceProbe)>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe of the most recently created surface with this title
    pub fn probe(&self, title: &str) -> Option<SurfaceProbe> {
        self.probes
            .lock()
            .expect("backend lock poisoned")
            .iter()
            .rev()
            .find(|(t, _)| t == title)
            .map(|(_, p)| p.clone())
    }
}

impl WindowBackend for HeadlessBackend {
    fn create_surface(&self, options: &SurfaceOptions) -> Result<Box<dyn OverlaySurface>> {
        let probe = SurfaceProbe::default();
        self.probes
            .lock()
            .expect("backend lock poisoned")
            .push((options.title.clone(), probe.clone()));
        Ok(Box::new(HeadlessSurface {
            width: options.width,
            height: options.height,
            probe,
        }))
    }
}

// === Per-overlay render dispatch ===

/// LoopJob payload driving one overlay's redraws at its configured rate.
///
/// `should_render` false skips drawing but keeps the timer running, so
/// visibility resumes on the next tick with current data. The job runner
/// already catches per-iteration panics, so one broken draw never tears
/// the timer down.
pub struct RenderJob {
    overlay: Arc<Mutex<Box<dyn Overlay>>>,
    surface: Box<dyn OverlaySurface>,
    ctx: OverlayContext,
}

impl RenderJob {
    pub fn new(
        overlay: Arc<Mutex<Box<dyn Overlay>>>,
        surface: Box<dyn OverlaySurface>,
        ctx: OverlayContext,
    ) -> Self {
        Self {
            overlay,
            surface,
            ctx,
        }
    }
}

impl LoopJob for RenderJob {
    fn tick(&mut self) {
        // A panicked frame poisons the lock; the overlay state is still
        // sound (the panic was caught at the job boundary), so recover
        // instead of letting one bad frame kill the timer.
        let mut overlay = self
            .overlay
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !resolve_should_render(overlay.as_ref(), &self.ctx) {
            return;
        }

        // Auto-sizing overlays may change extent between frames
        let (width, height) = overlay.size();
        self.surface.resize(width, height);

        let ctx = &self.ctx;
        let overlay = &mut *overlay;
        self.surface.frame(&mut |g| overlay.render(g, ctx));
    }
}
