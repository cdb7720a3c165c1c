//! Submission format: plain fixed-pitch text, double spaced, on Letter pages
//! with one-inch margins and a `Title / page` running head.

use super::engine::LayoutEngine;
use super::geometry::{Rect, Size};
use super::mode::ViewMode;
use super::paginated::{Page, PageDecoration, PageSetup, PaginatedLayout};
use super::shaping::{FontMetrics, TextShaper};
use super::surface::Surface;
use super::view_model::ViewModel;
use crate::document_model::TextEdit;
use std::rc::Rc;

/// 12pt at 96 dpi.
pub const MANUSCRIPT_FONT_SIZE: f32 = 16.0;
pub const MANUSCRIPT_LINE_SPACING: f32 = 2.0;

#[derive(Debug)]
pub struct ManuscriptLayout {
    pages: PaginatedLayout,
}

impl ManuscriptLayout {
    pub fn new(shaper: Rc<dyn TextShaper>, viewport: Size) -> Self {
        let metrics = FontMetrics::fixed_pitch(MANUSCRIPT_FONT_SIZE, MANUSCRIPT_LINE_SPACING);
        let pages = PaginatedLayout::new(shaper, metrics, PageSetup::manuscript(), viewport)
            .plain()
            .with_decoration(PageDecoration::Manuscript);
        Self { pages }
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.pages.set_title(title);
    }

    pub fn set_widows_orphans(&mut self, widows: usize, orphans: usize) {
        self.pages.set_widows_orphans(widows, orphans);
    }

    pub fn pages(&mut self, doc: &dyn ViewModel) -> &[Page] {
        self.pages.pages(doc)
    }
}

impl LayoutEngine for ManuscriptLayout {
    fn kind(&self) -> ViewMode {
        ViewMode::Manuscript
    }

    fn initialize(&mut self, doc: &dyn ViewModel) {
        self.pages.initialize(doc);
    }

    fn on_edit(&mut self, doc: &dyn ViewModel, edit: &TextEdit) {
        self.pages.on_edit(doc, edit);
    }

    /// Formatting never changes the manuscript's geometry.
    fn on_format_change(&mut self, _doc: &dyn ViewModel, _start: usize, _end: usize) {}

    fn render(&mut self, doc: &dyn ViewModel, surface: &mut dyn Surface, visible: Rect) {
        self.pages.render(doc, surface, visible);
    }

    fn hit_test(&mut self, doc: &dyn ViewModel, x: f32, y: f32) -> usize {
        self.pages.hit_test(doc, x, y)
    }

    fn cursor_rect(&mut self, doc: &dyn ViewModel, pos: usize) -> Rect {
        self.pages.cursor_rect(doc, pos)
    }

    fn selection_rects(&mut self, doc: &dyn ViewModel, start: usize, end: usize) -> Vec<Rect> {
        self.pages.selection_rects(doc, start, end)
    }

    fn page_count(&mut self, doc: &dyn ViewModel) -> usize {
        self.pages.page_count(doc)
    }

    fn page_at(&mut self, doc: &dyn ViewModel, pos: usize) -> usize {
        self.pages.page_at(doc, pos)
    }

    fn on_resize(&mut self, size: Size) {
        self.pages.on_resize(size);
    }

    fn viewport_size(&self) -> Size {
        self.pages.viewport_size()
    }

    fn on_scroll(&mut self, delta_y: f32) {
        self.pages.on_scroll(delta_y);
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.pages.set_zoom(zoom);
    }

    fn zoom(&self) -> f32 {
        self.pages.zoom()
    }

    fn scroll_offset(&self) -> f32 {
        self.pages.scroll_offset()
    }

    fn content_height(&mut self, doc: &dyn ViewModel) -> f32 {
        self.pages.content_height(doc)
    }

    fn ensure_visible(&mut self, doc: &dyn ViewModel, pos: usize) {
        self.pages.ensure_visible(doc, pos);
    }

    fn line_bounds(&mut self, doc: &dyn ViewModel, pos: usize) -> (usize, usize) {
        self.pages.line_bounds(doc, pos)
    }

    fn move_vertically(&mut self, doc: &dyn ViewModel, pos: usize, lines: isize, x: f32) -> usize {
        self.pages.move_vertically(doc, pos, lines, x)
    }

    fn lines_per_screen(&self) -> usize {
        self.pages.lines_per_screen()
    }
}
