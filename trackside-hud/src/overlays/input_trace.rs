//! Input trace overlay
//!
//! Scrolling throttle/brake/steering traces. Sampling runs on its own
//! collector job at a higher rate than the redraw, feeding a bounded ring
//! buffer the render path reads.

use crate::config::load_overlay_config;
use crate::overlay::{Overlay, OverlayContext};
use crate::render::DrawContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trackside_core::jobs::{Job, LoopJob};
use trackside_core::model::Color;
use trackside_core::telemetry::SharedTelemetry;

const TRACE_HEIGHT: u32 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputTraceConfig {
    /// Samples kept, which is also the drawn width in pixels
    pub sample_count: u32,
    pub sample_hz: f32,
    pub refresh_hz: f32,
    pub show_steering: bool,
}

impl Default for InputTraceConfig {
    fn default() -> Self {
        Self {
            sample_count: 300,
            sample_hz: 30.0,
            refresh_hz: 15.0,
            show_steering: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSample {
    pub throttle: f32,
    pub brake: f32,
    pub steering: f32,
}

type SampleBuffer = Arc<Mutex<VecDeque<InputSample>>>;

/// Collector payload sampling the live snapshot into the ring buffer
struct InputCollector {
    telemetry: SharedTelemetry,
    samples: SampleBuffer,
    capacity: usize,
}

impl LoopJob for InputCollector {
    fn tick(&mut self) {
        let sample = self.telemetry.read(|snap| InputSample {
            throttle: snap.local_car.inputs.throttle.0,
            brake: snap.local_car.inputs.brake.0,
            steering: snap.local_car.inputs.steering,
        });

        let mut samples = self.samples.lock().expect("sample buffer poisoned");
        samples.push_back(sample);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }
}

pub struct InputTraceOverlay {
    config: InputTraceConfig,
    samples: SampleBuffer,
    collector: Option<Job>,
}

impl InputTraceOverlay {
    pub fn new() -> Self {
        Self::with_config(load_overlay_config("Input Trace"))
    }

    pub fn with_config(config: InputTraceConfig) -> Self {
        Self {
            config,
            samples: Arc::new(Mutex::new(VecDeque::new())),
            collector: None,
        }
    }

    fn draw_trace(
        &self,
        g: &mut dyn DrawContext,
        values: impl Iterator<Item = f32>,
        color: Color,
    ) {
        let height = TRACE_HEIGHT as f32;
        let mut prev: Option<(f32, f32)> = None;
        for (i, value) in values.enumerate() {
            let point = (i as f32, height - value.clamp(0.0, 1.0) * (height - 2.0) - 1.0);
            if let Some(prev) = prev {
                g.line(prev, point, color, 1.5);
            }
            prev = Some(point);
        }
    }
}

impl Default for InputTraceOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Overlay for InputTraceOverlay {
    fn name(&self) -> &'static str {
        "Input Trace"
    }

    fn size(&self) -> (u32, u32) {
        (self.config.sample_count, TRACE_HEIGHT)
    }

    fn refresh_rate_hz(&self) -> f32 {
        self.config.refresh_hz
    }

    fn before_start(&mut self, ctx: &OverlayContext) -> Result<()> {
        let interval = Duration::from_millis(
            (1000.0 / self.config.sample_hz.clamp(1.0, 120.0)) as u64,
        );
        let collector = Job::new(
            "input-trace-collector",
            interval,
            InputCollector {
                telemetry: ctx.telemetry.clone(),
                samples: Arc::clone(&self.samples),
                capacity: self.config.sample_count as usize,
            },
        );
        collector.run();
        self.collector = Some(collector);
        Ok(())
    }

    fn render(&mut self, g: &mut dyn DrawContext, ctx: &OverlayContext) {
        let (width, height) = self.size();
        g.fill_rounded_rect(
            0.0,
            0.0,
            width as f32,
            height as f32,
            4.0,
            Color::rgba(10, 10, 10, 168),
        );

        let samples: Vec<InputSample> = if ctx.preview {
            // Deterministic preview wave; the collector is not running
            (0..self.config.sample_count)
                .map(|i| {
                    let t = i as f32 / 40.0;
                    InputSample {
                        throttle: (t.sin() * 0.5 + 0.5).clamp(0.0, 1.0),
                        brake: ((t + 1.5).cos() * 0.5).max(0.0),
                        steering: (t * 0.7).sin() * 0.6,
                    }
                })
                .collect()
        } else {
            self.samples
                .lock()
                .expect("sample buffer poisoned")
                .iter()
                .copied()
                .collect()
        };

        self.draw_trace(g, samples.iter().map(|s| s.throttle), Color::GREEN);
        self.draw_trace(g, samples.iter().map(|s| s.brake), Color::RED);
        if self.config.show_steering {
            // Steering is signed; remap to 0..1 around the centerline
            self.draw_trace(
                g,
                samples.iter().map(|s| s.steering * 0.5 + 0.5),
                Color::WHITE,
            );
        }
    }

    fn before_stop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.cancel_join();
        }
        self.samples
            .lock()
            .expect("sample buffer poisoned")
            .clear();
    }
}
