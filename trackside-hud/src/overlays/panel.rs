//! Row-based info panel
//!
//! The small header/value table most overlays are built from: optional
//! progress bar at the top, then fixed-height rows on a rounded
//! background. Rows are queued during `render` and drawn in one pass.

use crate::render::{DrawContext, Image, RenderCache};
use trackside_core::model::Color;

const FONT_SIZE: f32 = 11.0;
const ROW_PADDING: f32 = 2.0;
const PANEL_ALPHA: u8 = 168;

enum Row {
    Line {
        header: String,
        value: String,
        value_color: Color,
    },
    ProgressBar {
        min: f32,
        max: f32,
        value: f32,
        text: String,
        color: Color,
    },
}

pub struct InfoPanel {
    width: u32,
    rows: Vec<Row>,
    background: RenderCache<(u32, u32)>,
}

impl InfoPanel {
    pub fn new(width: u32) -> Self {
        Self {
            width,
            rows: Vec::new(),
            background: RenderCache::new(),
        }
    }

    pub fn font_height() -> u32 {
        (FONT_SIZE + 2.0 * ROW_PADDING) as u32
    }

    /// Panel height for a given row count
    pub fn height_for_rows(rows: u32) -> u32 {
        rows * Self::font_height() + 2
    }

    pub fn add_line(&mut self, header: &str, value: String) {
        self.add_colored_line(header, value, Color::WHITE);
    }

    pub fn add_colored_line(&mut self, header: &str, value: String, value_color: Color) {
        self.rows.push(Row::Line {
            header: header.to_string(),
            value,
            value_color,
        });
    }

    pub fn add_progress_bar(&mut self, min: f32, max: f32, value: f32, text: String, color: Color) {
        self.rows.push(Row::ProgressBar {
            min,
            max,
            value,
            text,
            color,
        });
    }

    /// Draw and clear the queued rows
    pub fn draw(&mut self, g: &mut dyn DrawContext) {
        let row_height = Self::font_height() as f32;
        let height = Self::height_for_rows(self.rows.len() as u32);
        let width = self.width;

        let background: &Image = self.background.get_or_render(
            (width, height),
            width,
            height,
            |g| {
                g.fill_rounded_rect(
                    0.0,
                    0.0,
                    width as f32,
                    height as f32,
                    4.0,
                    Color::rgba(10, 10, 10, PANEL_ALPHA),
                );
            },
        );
        let background = background.clone();
        g.blit(&background, 0.0, 0.0);

        let mut y = ROW_PADDING + FONT_SIZE;
        for row in self.rows.drain(..) {
            match row {
                Row::Line {
                    header,
                    value,
                    value_color,
                } => {
                    g.text(&header, 4.0, y, FONT_SIZE, Color::WHITE, true);
                    let value_x = width as f32 * 0.45;
                    g.text(&value, value_x, y, FONT_SIZE, value_color, true);
                }
                Row::ProgressBar {
                    min,
                    max,
                    value,
                    text,
                    color,
                } => {
                    let span = (max - min).max(f32::EPSILON);
                    let fraction = ((value - min) / span).clamp(0.0, 1.0);
                    let bar_width = (width as f32 - 8.0) * fraction;
                    g.fill_rounded_rect(4.0, y - FONT_SIZE, bar_width, row_height - 2.0, 2.0, color);
                    let text_x = (width as f32 - g.measure_text(&text, FONT_SIZE)) / 2.0;
                    g.text(&text, text_x, y, FONT_SIZE, Color::WHITE, true);
                }
            }
            y += row_height;
        }
    }
}
