use super::geometry::{Rect, Size};
use super::mode::ViewMode;
use super::surface::Surface;
use super::view_model::ViewModel;
use crate::document_model::TextEdit;
use std::time::Instant;

/// A presentation strategy: turns the document into geometry for drawing
/// and hit testing.
///
/// All coordinates are viewport pixels with the scroll offset applied. An
/// engine owns only derived caches; the document is passed into each call.
pub trait LayoutEngine {
    fn kind(&self) -> ViewMode;

    /// Discards caches and lays out from scratch.
    fn initialize(&mut self, doc: &dyn ViewModel);

    /// Updates caches after one primitive edit.
    fn on_edit(&mut self, doc: &dyn ViewModel, edit: &TextEdit);

    /// Formatting changed in `[start, end)`; text is unchanged.
    fn on_format_change(&mut self, doc: &dyn ViewModel, start: usize, end: usize) {
        let edit = TextEdit { start, removed: end - start, inserted: end - start };
        self.on_edit(doc, &edit);
    }

    fn render(&mut self, doc: &dyn ViewModel, surface: &mut dyn Surface, visible: Rect);

    /// Position whose caret cell contains the point, or the nearest one.
    fn hit_test(&mut self, doc: &dyn ViewModel, x: f32, y: f32) -> usize;

    /// The caret cell at `pos`.
    fn cursor_rect(&mut self, doc: &dyn ViewModel, pos: usize) -> Rect;

    fn selection_rects(&mut self, doc: &dyn ViewModel, start: usize, end: usize) -> Vec<Rect>;

    fn page_count(&mut self, doc: &dyn ViewModel) -> usize;

    /// Zero-based page holding `pos`.
    fn page_at(&mut self, doc: &dyn ViewModel, pos: usize) -> usize;

    fn on_resize(&mut self, size: Size);

    fn viewport_size(&self) -> Size;

    fn on_scroll(&mut self, delta_y: f32);

    fn set_zoom(&mut self, zoom: f32);

    fn zoom(&self) -> f32;

    fn scroll_offset(&self) -> f32;

    fn content_height(&mut self, doc: &dyn ViewModel) -> f32;

    /// Scrolls so the caret at `pos` is in view.
    fn ensure_visible(&mut self, doc: &dyn ViewModel, pos: usize);

    fn on_cursor_moved(&mut self, doc: &dyn ViewModel, pos: usize, _now: Instant) {
        self.ensure_visible(doc, pos);
    }

    /// Advances animations. Returns true when a repaint is needed.
    fn tick(&mut self, _now: Instant) -> bool {
        false
    }

    /// `[start, end]` caret stops of the visual line holding `pos`.
    fn line_bounds(&mut self, doc: &dyn ViewModel, pos: usize) -> (usize, usize);

    /// Position `lines` visual lines above (negative) or below `pos`, as
    /// close as possible to horizontal offset `x`.
    fn move_vertically(&mut self, doc: &dyn ViewModel, pos: usize, lines: isize, x: f32) -> usize;

    /// Visual lines that fit in the viewport.
    fn lines_per_screen(&self) -> usize;
}
