use super::geometry::{Point, Rect};
use crate::document_model::{TextAttributes, VerticalAlign};

/// Semantic colors; each surface decides how to show them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Text,
    Background,
    Desk,
    PageShadow,
    Selection,
    CommentHighlight,
    ResolvedComment,
    Marker,
    Muted,
    Caret,
    Preedit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub vertical: VerticalAlign,
    pub color: Color,
}

impl TextStyle {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn with_color(color: Color) -> Self {
        Self { color, ..Self::default() }
    }

    pub fn from_attributes(attrs: &TextAttributes) -> Self {
        Self {
            bold: attrs.bold,
            italic: attrs.italic,
            underline: attrs.underline,
            strikethrough: attrs.strikethrough,
            vertical: attrs.vertical,
            color: Color::Text,
        }
    }
}

/// Where layout engines draw. Coordinates are viewport pixels.
pub trait Surface {
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draws `text` with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle);

    fn draw_line(&mut self, from: Point, to: Point, color: Color);

    /// Limits later drawing to `clip`; `None` removes the limit.
    fn set_clip(&mut self, clip: Option<Rect>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Color },
    Text { x: f32, y: f32, text: String, style: TextStyle },
    Line { from: Point, to: Point, color: Color },
    Clip(Option<Rect>),
}

/// Keeps every draw call, for tests and headless hosts.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Text draw calls in order.
    pub fn texts(&self) -> Vec<(&str, &TextStyle)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, style, .. } => Some((text.as_str(), style)),
                _ => None,
            })
            .collect()
    }

    pub fn rects(&self, color: Color) -> Vec<Rect> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::FillRect { rect, color: c } if *c == color => Some(*rect),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.to_string(),
            style: *style,
        });
    }

    fn draw_line(&mut self, from: Point, to: Point, color: Color) {
        self.ops.push(DrawOp::Line { from, to, color });
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.ops.push(DrawOp::Clip(clip));
    }
}
