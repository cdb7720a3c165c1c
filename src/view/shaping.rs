//! Text measurement. Real glyph shaping is a host collaborator behind
//! [`TextShaper`]; [`MonospaceShaper`] is the built-in fallback.

use crate::document_model::FormatRun;
use std::fmt::Debug;
use thiserror::Error;
use unicode_width::UnicodeWidthChar;

/// Columns a tab advances by.
pub const TAB_WIDTH: usize = 4;

/// Font measurements in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub font_size: f32,
    /// Advance of one narrow cell.
    pub char_width: f32,
    pub line_height: f32,
}

impl FontMetrics {
    /// Metrics for a proportional-looking face: half-em cells.
    pub fn new(font_size: f32, line_spacing: f32) -> Self {
        Self {
            font_size,
            char_width: font_size * 0.5,
            line_height: font_size * line_spacing,
        }
    }

    /// Courier-like fixed pitch: 0.6 em per cell.
    pub fn fixed_pitch(font_size: f32, line_spacing: f32) -> Self {
        Self {
            font_size,
            char_width: font_size * 0.6,
            line_height: font_size * line_spacing,
        }
    }

    pub fn scaled(&self, zoom: f32) -> Self {
        Self {
            font_size: self.font_size * zoom,
            char_width: self.char_width * zoom,
            line_height: self.line_height * zoom,
        }
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::new(16.0, 1.0)
    }
}

/// Per-character measurements for one paragraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapedText {
    /// Horizontal advance of each character.
    pub advances: Vec<f32>,
    /// `breaks[i]` is true when a line may end after character `i`.
    pub breaks: Vec<bool>,
}

#[derive(Debug, Error)]
pub enum ShapingError {
    #[error("no glyph for {0:?}")]
    MissingGlyph(char),

    #[error("shaper unavailable: {0}")]
    Unavailable(String),
}

pub trait TextShaper: Debug {
    /// Measures `text`. `runs` are relative to the start of `text`.
    fn shape(&self, text: &str, runs: &[FormatRun], metrics: &FontMetrics) -> Result<ShapedText, ShapingError>;
}

/// Fixed-pitch measurement from Unicode display widths.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceShaper;

impl MonospaceShaper {
    pub fn cells(ch: char) -> usize {
        match ch {
            '\t' => TAB_WIDTH,
            _ => ch.width().unwrap_or(0),
        }
    }
}

impl TextShaper for MonospaceShaper {
    fn shape(&self, text: &str, _runs: &[FormatRun], metrics: &FontMetrics) -> Result<ShapedText, ShapingError> {
        let mut shaped = ShapedText::default();
        for ch in text.chars() {
            shaped.advances.push(Self::cells(ch) as f32 * metrics.char_width);
            shaped.breaks.push(ch.is_whitespace() || ch == '-' || ch == '—');
        }
        Ok(shaped)
    }
}
