use super::engine::LayoutEngine;
use super::flow::{FlowLayout, PlacedLine};
use super::geometry::{Point, Rect, Size};
use super::mode::ViewMode;
use super::paint::{self, PaintOptions};
use super::shaping::{FontMetrics, TextShaper};
use super::surface::{Color, Surface};
use super::view_model::ViewModel;
use crate::document_model::TextEdit;
use std::rc::Rc;

pub const DEFAULT_MARGIN: f32 = 16.0;
pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 4.0;

/// Line boxes are kept this many screens beyond the viewport.
const CACHE_SCREENS: f32 = 3.0;

/// One wrapped column of text with vertical scrolling.
#[derive(Debug)]
pub struct ContinuousLayout {
    flow: FlowLayout,
    base_metrics: FontMetrics,
    viewport: Size,
    margin: f32,
    top_padding: f32,
    bottom_padding: f32,
    scroll: f32,
    zoom: f32,
}

impl ContinuousLayout {
    pub fn new(shaper: Rc<dyn TextShaper>, metrics: FontMetrics, viewport: Size) -> Self {
        let margin = DEFAULT_MARGIN;
        let width = (viewport.width - 2.0 * margin).max(metrics.char_width);
        Self {
            flow: FlowLayout::new(shaper, metrics, width),
            base_metrics: metrics,
            viewport,
            margin,
            top_padding: 0.0,
            bottom_padding: 0.0,
            scroll: 0.0,
            zoom: 1.0,
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin.max(0.0);
        self.flow.set_width(self.text_width());
        self
    }

    pub fn text_width(&self) -> f32 {
        (self.viewport.width - 2.0 * self.margin).max(self.flow.metrics().char_width)
    }

    pub fn flow(&self) -> &FlowLayout {
        &self.flow
    }

    /// Blank space above the first and below the last line.
    pub(crate) fn set_padding(&mut self, top: f32, bottom: f32) {
        self.top_padding = top.max(0.0);
        self.bottom_padding = bottom.max(0.0);
    }

    pub(crate) fn set_scroll(&mut self, offset: f32) {
        let max = self.max_scroll();
        self.scroll = offset.clamp(0.0, max);
    }

    fn max_scroll(&mut self) -> f32 {
        let total = self.top_padding + self.flow.content_height() + self.bottom_padding;
        (total - self.viewport.height).max(0.0)
    }

    fn to_content_y(&self, y: f32) -> f32 {
        y + self.scroll - self.top_padding
    }

    fn to_viewport_y(&self, y: f32) -> f32 {
        y - self.scroll + self.top_padding
    }

    /// Content y of the top of the line holding `pos`, before padding.
    pub(crate) fn line_top(&mut self, doc: &dyn ViewModel, pos: usize) -> f32 {
        self.flow.line_at_pos(doc, pos).map_or(0.0, |line| line.y)
    }

    fn place(&self, line: &PlacedLine) -> (f32, f32) {
        (self.margin, self.to_viewport_y(line.y))
    }
}

impl LayoutEngine for ContinuousLayout {
    fn kind(&self) -> ViewMode {
        ViewMode::Continuous
    }

    fn initialize(&mut self, doc: &dyn ViewModel) {
        self.flow.set_width(self.text_width());
        self.flow.rebuild(doc);
        let offset = self.scroll;
        self.set_scroll(offset);
    }

    fn on_edit(&mut self, doc: &dyn ViewModel, edit: &TextEdit) {
        self.flow.apply_edit(doc, edit);
        let offset = self.scroll;
        self.set_scroll(offset);
    }

    fn render(&mut self, doc: &dyn ViewModel, surface: &mut dyn Surface, visible: Rect) {
        surface.set_clip(Some(visible));
        surface.fill_rect(visible, Color::Background);

        let top = self.to_content_y(visible.y);
        let bottom = self.to_content_y(visible.bottom());
        let buffer = self.viewport.height;
        let lines = self.flow.lines_in(doc, top - buffer, bottom + buffer);
        let width = self.text_width();
        for line in lines.iter().filter(|l| l.y + l.height > top && l.y < bottom) {
            let (x, y) = self.place(line);
            paint::paint_line(doc, surface, line, Point::new(x, y), width, PaintOptions::default());
        }
        let keep = self.viewport.height * CACHE_SCREENS;
        self.flow.evict_outside(top - keep, bottom + keep);

        if let Some(position) = doc.composition().map(|c| c.position) {
            let caret = self.cursor_rect(doc, position);
            paint::paint_preedit(doc, surface, caret);
        }
        surface.set_clip(None);
    }

    fn hit_test(&mut self, doc: &dyn ViewModel, x: f32, y: f32) -> usize {
        let content_y = self.to_content_y(y);
        match self.flow.line_at_y(doc, content_y) {
            Some(line) => line.stop_at_x(x - self.margin),
            None => 0,
        }
    }

    fn cursor_rect(&mut self, doc: &dyn ViewModel, pos: usize) -> Rect {
        let pos = pos.min(doc.len());
        let min_width = self.flow.metrics().char_width;
        let width = self.text_width();
        match self.flow.line_at_pos(doc, pos) {
            Some(line) => {
                let (x, y) = self.place(&line);
                line.cell(pos, width, min_width).translated(x, y)
            }
            None => Rect::new(self.margin, self.to_viewport_y(0.0), width, self.flow.metrics().line_height),
        }
    }

    fn selection_rects(&mut self, doc: &dyn ViewModel, start: usize, end: usize) -> Vec<Rect> {
        let top = self.to_content_y(0.0);
        let bottom = self.to_content_y(self.viewport.height);
        let width = self.text_width();
        self.flow
            .lines_in(doc, top, bottom)
            .iter()
            .filter_map(|line| {
                let (x, y) = self.place(line);
                line.selection_rect(start, end, width).map(|r| r.translated(x, y))
            })
            .collect()
    }

    fn page_count(&mut self, _doc: &dyn ViewModel) -> usize {
        1
    }

    fn page_at(&mut self, _doc: &dyn ViewModel, _pos: usize) -> usize {
        0
    }

    fn on_resize(&mut self, size: Size) {
        self.viewport = size;
        self.flow.set_width(self.text_width());
        let offset = self.scroll;
        self.set_scroll(offset);
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn on_scroll(&mut self, delta_y: f32) {
        let offset = self.scroll + delta_y;
        self.set_scroll(offset);
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.flow.set_metrics(self.base_metrics.scaled(self.zoom));
        self.flow.set_width(self.text_width());
        tracing::debug!(zoom = self.zoom, "zoom changed");
    }

    fn zoom(&self) -> f32 {
        self.zoom
    }

    fn scroll_offset(&self) -> f32 {
        self.scroll
    }

    fn content_height(&mut self, _doc: &dyn ViewModel) -> f32 {
        self.top_padding + self.flow.content_height() + self.bottom_padding
    }

    fn ensure_visible(&mut self, doc: &dyn ViewModel, pos: usize) {
        let caret = self.cursor_rect(doc, pos);
        if caret.y < 0.0 {
            let offset = self.scroll + caret.y;
            self.set_scroll(offset);
        } else if caret.bottom() > self.viewport.height {
            let offset = self.scroll + caret.bottom() - self.viewport.height;
            self.set_scroll(offset);
        }
    }

    fn line_bounds(&mut self, doc: &dyn ViewModel, pos: usize) -> (usize, usize) {
        match self.flow.line_at_pos(doc, pos) {
            Some(line) => (line.start, line.last_stop()),
            None => (0, 0),
        }
    }

    fn move_vertically(&mut self, doc: &dyn ViewModel, pos: usize, lines: isize, x: f32) -> usize {
        match self.flow.line_offset(doc, pos, lines) {
            Some(line) => line.stop_at_x(x - self.margin),
            None => pos,
        }
    }

    fn lines_per_screen(&self) -> usize {
        (self.viewport.height / self.flow.metrics().line_height).floor().max(1.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::{DocumentModel, TextAttributes};
    use crate::view::shaping::MonospaceShaper;
    use crate::view::surface::RecordingSurface;
    use crate::view::view_model::DocumentViewModel;

    const TEXT: &str = "It was a bright cold day in April, and the clocks were striking thirteen.\n\nWinston Smith slipped quickly through the glass doors.";

    fn layout(doc: &DocumentModel) -> ContinuousLayout {
        let mut layout = ContinuousLayout::new(
            Rc::new(MonospaceShaper),
            FontMetrics::new(16.0, 1.0),
            Size::new(272.0, 96.0),
        );
        layout.initialize(&DocumentViewModel::new(doc));
        layout
    }

    #[test]
    fn test_hit_test_lands_in_cursor_rect() {
        let doc = DocumentModel::with_text(TEXT);
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        let text_right = DEFAULT_MARGIN + layout.text_width();

        let mut y = 0.5;
        while y < 96.0 {
            let mut x = DEFAULT_MARGIN;
            while x < text_right {
                let pos = layout.hit_test(&view, x, y);
                let rect = layout.cursor_rect(&view, pos);
                assert!(rect.contains(x, y), "({x}, {y}) -> {pos} -> {rect:?}");
                x += 3.7;
            }
            y += 5.3;
        }
    }

    #[test]
    fn test_hit_test_clamps_out_of_bounds() {
        let doc = DocumentModel::with_text(TEXT);
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        assert_eq!(layout.hit_test(&view, -50.0, -50.0), 0);
        assert_eq!(layout.hit_test(&view, 5000.0, 1e6), doc.len());
        // Past the right edge of the first line: its last caret stop.
        let (_, last) = layout.line_bounds(&view, 0);
        assert_eq!(layout.hit_test(&view, 1000.0, 1.0), last);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let doc = DocumentModel::with_text(TEXT);
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        layout.on_resize(Size::new(272.0, 48.0));
        layout.on_scroll(-40.0);
        assert_eq!(layout.scroll_offset(), 0.0);
        layout.on_scroll(1e6);
        let max = layout.content_height(&view) - 48.0;
        assert_eq!(layout.scroll_offset(), max);
        assert!(max > 0.0);
    }

    #[test]
    fn test_ensure_visible_scrolls_to_caret() {
        let doc = DocumentModel::with_text(TEXT);
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        layout.on_resize(Size::new(272.0, 48.0));
        layout.ensure_visible(&view, doc.len());
        let caret = layout.cursor_rect(&view, doc.len());
        assert!(caret.y >= 0.0 && caret.bottom() <= 48.0);
        assert!(layout.scroll_offset() > 0.0);
    }

    #[test]
    fn test_render_draws_visible_text_and_selection() {
        let mut doc = DocumentModel::with_text("Bold start then plain");
        doc.apply_format(0, 4, TextAttributes::bold()).unwrap();
        doc.set_selection(5, 10, crate::document_model::SelectionEdge::End).unwrap();
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        let mut surface = RecordingSurface::new();
        layout.render(&view, &mut surface, Rect::new(0.0, 0.0, 272.0, 96.0));

        let texts = surface.texts();
        assert_eq!(texts[0].0, "Bold");
        assert!(texts[0].1.bold);
        assert_eq!(surface.rects(Color::Selection).len(), 1);
    }

    #[test]
    fn test_vertical_movement_keeps_column() {
        let doc = DocumentModel::with_text("abcdefgh\nab\nabcdefgh");
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        let x = layout.cursor_rect(&view, 6).x;
        // The short middle line clamps to its end.
        assert_eq!(layout.move_vertically(&view, 6, 1, x), 11);
        assert_eq!(layout.move_vertically(&view, 6, 2, x), 18);
    }

    #[test]
    fn test_zoom_relayouts() {
        let doc = DocumentModel::with_text(TEXT);
        let view = DocumentViewModel::new(&doc);
        let mut layout = layout(&doc);
        let before = layout.content_height(&view);
        layout.set_zoom(2.0);
        layout.render(&view, &mut RecordingSurface::new(), Rect::new(0.0, 0.0, 272.0, 96.0));
        assert!(layout.content_height(&view) > before);
        layout.set_zoom(100.0);
        assert_eq!(layout.zoom(), MAX_ZOOM);
    }
}
