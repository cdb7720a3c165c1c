//! Print-style layout: the flow is cut into fixed-size pages stacked
//! vertically with a gap between them.
//!
//! Pagination runs in steps of a bounded number of paragraphs so a long
//! manuscript never stalls the caller. After an edit only the page before the
//! edited one is rebuilt onwards, and the rebuild stops as soon as a new page
//! starts where an old, unaffected page started.

use super::continuous::{MAX_ZOOM, MIN_ZOOM};
use super::engine::LayoutEngine;
use super::flow::{FlowLayout, PlacedLine};
use super::geometry::{Point, Rect, Size};
use super::mode::ViewMode;
use super::paint::{self, PaintOptions};
use super::shaping::{FontMetrics, TextShaper};
use super::surface::{Color, Surface, TextStyle};
use super::view_model::ViewModel;
use crate::document_model::TextEdit;
use std::mem;
use std::rc::Rc;

/// Minimum lines of a broken paragraph carried to the top of the next page.
pub const DEFAULT_WIDOWS: usize = 2;
/// Minimum lines of a broken paragraph left at the bottom of a page.
pub const DEFAULT_ORPHANS: usize = 2;

const PARAGRAPHS_PER_STEP: usize = 64;
const SHADOW_OFFSET: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    A4,
    A5,
    Letter,
    Legal,
    Custom { width_mm: f32, height_mm: f32 },
}

impl PageSize {
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match *self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::A5 => (148.0, 210.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::Custom { width_mm, height_mm } => (width_mm, height_mm),
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(PageSize::A4),
            "a5" => Some(PageSize::A5),
            "letter" => Some(PageSize::Letter),
            "legal" => Some(PageSize::Legal),
            _ => None,
        }
    }
}

/// Page margins in millimetres. With mirroring, `left` is the inner margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margins {
    pub fn uniform(mm: f32) -> Self {
        Self { top: mm, bottom: mm, left: mm, right: mm }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub size: PageSize,
    pub margins: Margins,
    /// Swap left and right margins on even pages.
    pub mirror: bool,
    pub header_height: f32,
    pub footer_height: f32,
    /// Space between stacked pages, in pixels.
    pub page_gap: f32,
    pub dpi: f32,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margins: Margins::uniform(25.0),
            mirror: false,
            header_height: 10.0,
            footer_height: 10.0,
            page_gap: 24.0,
            dpi: 96.0,
        }
    }
}

impl PageSetup {
    /// US Letter with one-inch margins and a running header.
    pub fn manuscript() -> Self {
        Self {
            size: PageSize::Letter,
            margins: Margins::uniform(25.4),
            mirror: false,
            header_height: 12.7,
            footer_height: 0.0,
            page_gap: 24.0,
            dpi: 96.0,
        }
    }

    pub fn px(&self, mm: f32) -> f32 {
        mm * self.dpi / 25.4
    }
}

/// What is printed outside the text area of each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageDecoration {
    /// Running title in the header, page number centred in the footer.
    #[default]
    Standard,
    /// `Title / page` at the right of the header.
    Manuscript,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLine {
    /// Document offset where the line starts.
    pub start: usize,
    /// Top edge relative to the page's text area.
    pub y: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub lines: Vec<PageLine>,
}

impl Page {
    pub fn start(&self) -> usize {
        self.lines.first().map_or(0, |l| l.start)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_y(&self, start: usize) -> Option<f32> {
        self.lines
            .binary_search_by(|l| l.start.cmp(&start))
            .ok()
            .map(|i| self.lines[i].y)
    }
}

/// State of a pagination pass that has not reached the end yet.
#[derive(Debug)]
struct Progress {
    paragraph: usize,
    line: usize,
    current: Vec<PageLine>,
    y: f32,
    /// Pages from before the edit, already shifted to new offsets.
    tail: Vec<Page>,
}

impl Progress {
    fn at(paragraph: usize, line: usize) -> Self {
        Self {
            paragraph,
            line,
            current: Vec::new(),
            y: 0.0,
            tail: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct PaginatedLayout {
    flow: FlowLayout,
    base_metrics: FontMetrics,
    setup: PageSetup,
    decoration: PageDecoration,
    paint: PaintOptions,
    title: Option<String>,
    widows: usize,
    orphans: usize,
    viewport: Size,
    scroll: f32,
    zoom: f32,
    pages: Vec<Page>,
    progress: Option<Progress>,
    /// Pages built by the current or last pass.
    rebuilt: usize,
}

impl PaginatedLayout {
    pub fn new(shaper: Rc<dyn TextShaper>, metrics: FontMetrics, setup: PageSetup, viewport: Size) -> Self {
        let mut layout = Self {
            flow: FlowLayout::new(shaper, metrics, 1.0),
            base_metrics: metrics,
            setup,
            decoration: PageDecoration::Standard,
            paint: PaintOptions::default(),
            title: None,
            widows: DEFAULT_WIDOWS,
            orphans: DEFAULT_ORPHANS,
            viewport,
            scroll: 0.0,
            zoom: 1.0,
            pages: Vec::new(),
            progress: Some(Progress::at(0, 0)),
            rebuilt: 0,
        };
        let width = layout.text_width();
        layout.flow.set_width(width);
        layout
    }

    /// Plain text only: runs are neither shaped nor drawn, and neither are
    /// comment highlights or note markers.
    pub fn plain(mut self) -> Self {
        self.flow.set_ignore_formats(true);
        self.paint = PaintOptions { formats: false, annotations: false };
        self
    }

    pub fn with_decoration(mut self, decoration: PageDecoration) -> Self {
        self.decoration = decoration;
        self
    }

    pub fn setup(&self) -> &PageSetup {
        &self.setup
    }

    pub fn set_page_setup(&mut self, setup: PageSetup) {
        self.setup = setup;
        let width = self.text_width();
        self.flow.set_width(width);
        self.restart_full();
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn set_widows_orphans(&mut self, widows: usize, orphans: usize) {
        self.widows = widows;
        self.orphans = orphans;
        self.restart_full();
    }

    /// Pages built by the most recent pagination pass.
    pub fn rebuilt_pages(&self) -> usize {
        self.rebuilt
    }

    pub fn is_paginated(&self) -> bool {
        self.progress.is_none()
    }

    /// All pages, finishing pagination first.
    pub fn pages(&mut self, doc: &dyn ViewModel) -> &[Page] {
        self.ensure_paginated(doc);
        &self.pages
    }

    fn scaled(&self, mm: f32) -> f32 {
        self.setup.px(mm) * self.zoom
    }

    fn page_size(&self) -> Size {
        let (width, height) = self.setup.size.dimensions_mm();
        Size::new(self.scaled(width), self.scaled(height))
    }

    pub fn text_width(&self) -> f32 {
        let margins = self.setup.margins;
        (self.page_size().width - self.scaled(margins.left + margins.right)).max(self.flow.metrics().char_width)
    }

    fn text_height(&self) -> f32 {
        let setup = &self.setup;
        let reserved = setup.margins.top + setup.margins.bottom + setup.header_height + setup.footer_height;
        (self.page_size().height - self.scaled(reserved)).max(self.flow.metrics().line_height)
    }

    /// Document y of the top edge of page `index`.
    fn page_top(&self, index: usize) -> f32 {
        self.setup.page_gap + index as f32 * (self.page_size().height + self.setup.page_gap)
    }

    fn page_left(&self) -> f32 {
        ((self.viewport.width - self.page_size().width) / 2.0).max(0.0)
    }

    fn left_margin(&self, index: usize) -> f32 {
        let margins = self.setup.margins;
        if self.setup.mirror && index % 2 == 1 {
            self.scaled(margins.right)
        } else {
            self.scaled(margins.left)
        }
    }

    /// Viewport position of the top-left corner of page `index`'s text area.
    fn content_origin(&self, index: usize) -> Point {
        let top = self.setup.margins.top + self.setup.header_height;
        Point::new(
            self.page_left() + self.left_margin(index),
            self.page_top(index) + self.scaled(top) - self.scroll,
        )
    }

    fn page_index_at_pos(&self, pos: usize) -> usize {
        self.pages.partition_point(|p| p.start() <= pos).saturating_sub(1)
    }

    fn page_index_at_y(&self, doc_y: f32) -> usize {
        let stride = self.page_size().height + self.setup.page_gap;
        let index = ((doc_y - self.setup.page_gap) / stride).floor().max(0.0) as usize;
        index.min(self.pages.len().saturating_sub(1))
    }

    fn restart_full(&mut self) {
        self.pages.clear();
        self.progress = Some(Progress::at(0, 0));
        self.rebuilt = 0;
    }

    /// Restarts pagination for an edit whose first changed paragraph is
    /// `first`. `edit` is in the offsets of the text before the edit.
    fn restart_after(&mut self, doc: &dyn ViewModel, first: usize, edit: &TextEdit) {
        // Built pages of an unfinished pass end before an unpaginated gap;
        // only its tail still reaches the end of the document.
        let pending = self.progress.take().map(|progress| progress.tail);
        if self.pages.is_empty() {
            self.restart_full();
            return;
        }
        let (paragraph_start, _) = self.flow.paragraph_range(first).unwrap_or((0, 0));
        let holding = self.pages.partition_point(|p| p.start() <= paragraph_start).saturating_sub(1);
        let restart = holding.saturating_sub(1);

        let changed_to = self.flow.paragraph_index_at_pos(edit.start + edit.inserted);
        let stable_from = self.flow.paragraph_range(changed_to).map_or(usize::MAX, |(_, end)| end + 1);

        let old = self.pages.split_off(restart);
        let resume = old.first().map_or(0, |p| p.start());
        let candidates: Vec<Page> = match pending {
            Some(tail) => tail,
            None => old.into_iter().skip(1).collect(),
        };
        let tail: Vec<Page> = candidates
            .into_iter()
            .filter(|page| page.start() >= edit.old_end())
            .map(|mut page| {
                for line in &mut page.lines {
                    line.start = line.start + edit.inserted - edit.removed;
                }
                page
            })
            .filter(|page| page.start() >= stable_from)
            .collect();

        let (paragraph, line) = self
            .flow
            .line_at_pos(doc, resume)
            .map_or((0, 0), |l| (l.paragraph, l.index));
        tracing::trace!(restart, paragraph, kept_tail = tail.len(), "pagination restarted");
        self.progress = Some(Progress { tail, ..Progress::at(paragraph, line) });
        self.rebuilt = 0;
    }

    /// Paginates up to `budget` paragraphs. Returns true once every page is
    /// known.
    pub fn paginate_step(&mut self, doc: &dyn ViewModel, budget: usize) -> bool {
        let Some(mut progress) = self.progress.take() else {
            return true;
        };
        let count = self.flow.paragraph_count();
        let end = (progress.paragraph + budget.max(1)).min(count);
        while progress.paragraph < end {
            let lines = self.flow.paragraph_lines(doc, progress.paragraph);
            if self.place_paragraph(&mut progress, &lines) {
                tracing::debug!(pages = self.pages.len(), rebuilt = self.rebuilt, "pagination converged");
                return true;
            }
            progress.paragraph += 1;
            progress.line = 0;
        }
        if progress.paragraph < count {
            self.progress = Some(progress);
            return false;
        }
        if !progress.current.is_empty() || self.pages.is_empty() {
            self.pages.push(Page { lines: progress.current });
            self.rebuilt += 1;
        }
        tracing::debug!(pages = self.pages.len(), rebuilt = self.rebuilt, "pagination complete");
        true
    }

    fn ensure_paginated(&mut self, doc: &dyn ViewModel) {
        while !self.paginate_step(doc, PARAGRAPHS_PER_STEP) {}
    }

    /// Paginates until pages reach document height `doc_y`.
    fn paginate_until(&mut self, doc: &dyn ViewModel, doc_y: f32) {
        while self.progress.is_some() && (self.pages.is_empty() || self.page_top(self.pages.len()) <= doc_y) {
            self.paginate_step(doc, PARAGRAPHS_PER_STEP);
        }
    }

    /// Paginates until the page holding offset `pos` is finished.
    fn paginate_past(&mut self, doc: &dyn ViewModel, pos: usize) {
        while self.progress.is_some() && self.pages.last().is_none_or(|p| p.start() <= pos) {
            self.paginate_step(doc, PARAGRAPHS_PER_STEP);
        }
    }

    /// Places the lines of one paragraph from `progress.line` on. Returns
    /// true when the rest of the document was spliced from the old pages.
    fn place_paragraph(&mut self, progress: &mut Progress, lines: &[PlacedLine]) -> bool {
        let height = self.text_height();
        let mut from = progress.line;
        while from < lines.len() {
            if progress.current.is_empty() && self.try_converge(progress, lines[from].start) {
                return true;
            }
            let available = height - progress.y;
            let mut fit = 0;
            let mut used = 0.0;
            for line in &lines[from..] {
                if used + line.height > available {
                    break;
                }
                used += line.height;
                fit += 1;
            }
            let remaining = lines.len() - from;
            let take = if fit >= remaining {
                remaining
            } else {
                self.lines_before_break(from, fit, remaining, progress.current.is_empty())
            };
            for line in &lines[from..from + take] {
                progress.current.push(PageLine {
                    start: line.start,
                    y: progress.y,
                    height: line.height,
                });
                progress.y += line.height;
            }
            from += take;
            if from < lines.len() {
                self.finish_page(progress);
            }
        }
        false
    }

    /// How many of the `remaining` lines go on the current page when only
    /// `fit` of them fit.
    fn lines_before_break(&self, from: usize, fit: usize, remaining: usize, page_empty: bool) -> usize {
        let mut take = fit;
        if remaining - take < self.widows {
            take = remaining.saturating_sub(self.widows);
        }
        if from == 0 && take < self.orphans {
            take = 0;
        }
        if take == 0 && page_empty {
            take = fit.max(1);
        }
        take
    }

    fn finish_page(&mut self, progress: &mut Progress) {
        self.pages.push(Page { lines: mem::take(&mut progress.current) });
        progress.y = 0.0;
        self.rebuilt += 1;
    }

    fn try_converge(&mut self, progress: &mut Progress, start: usize) -> bool {
        let passed = progress.tail.partition_point(|p| p.start() < start);
        progress.tail.drain(..passed);
        if progress.tail.first().is_some_and(|p| p.start() == start) {
            self.pages.append(&mut progress.tail);
            return true;
        }
        false
    }

    fn clamp_scroll(&mut self) {
        let mut scroll = self.scroll.max(0.0);
        if self.progress.is_none() {
            let max = (self.page_top(self.pages.len()) - self.viewport.height).max(0.0);
            scroll = scroll.min(max);
        }
        self.scroll = scroll;
    }

    fn paint_decorations(&self, surface: &mut dyn Surface, index: usize, page: Rect) {
        let setup = &self.setup;
        let char_width = self.flow.metrics().char_width;
        let width_of = |label: &str| label.chars().count() as f32 * char_width;
        let left = page.x + self.left_margin(index);
        let header_y = page.y + self.scaled(setup.margins.top);
        let style = TextStyle::with_color(Color::Muted);
        let number = index + 1;

        match self.decoration {
            PageDecoration::Standard => {
                if let Some(title) = self.title.as_deref() {
                    if setup.header_height > 0.0 {
                        surface.draw_text(left, header_y, title, &style);
                    }
                }
                if setup.footer_height > 0.0 {
                    let label = number.to_string();
                    let x = page.x + (page.width - width_of(&label)) / 2.0;
                    let y = page.bottom() - self.scaled(setup.margins.bottom + setup.footer_height);
                    surface.draw_text(x, y, &label, &style);
                }
            }
            PageDecoration::Manuscript => {
                let label = format!("{} / {}", self.title.as_deref().unwrap_or("Untitled"), number);
                let right = left + self.text_width();
                let x = (right - width_of(&label)).max(left);
                surface.draw_text(x, header_y, &label, &style);
            }
        }
    }
}

impl LayoutEngine for PaginatedLayout {
    fn kind(&self) -> ViewMode {
        ViewMode::Page
    }

    fn initialize(&mut self, doc: &dyn ViewModel) {
        let width = self.text_width();
        self.flow.set_width(width);
        self.flow.rebuild(doc);
        self.restart_full();
    }

    fn on_edit(&mut self, doc: &dyn ViewModel, edit: &TextEdit) {
        let first = self.flow.apply_edit(doc, edit);
        self.restart_after(doc, first, edit);
    }

    fn render(&mut self, doc: &dyn ViewModel, surface: &mut dyn Surface, visible: Rect) {
        self.paginate_until(doc, visible.bottom() + self.scroll);
        self.clamp_scroll();
        surface.set_clip(Some(visible));
        surface.fill_rect(visible, Color::Desk);

        let size = self.page_size();
        let left = self.page_left();
        let width = self.text_width();
        let first = self.page_index_at_y(visible.y + self.scroll);
        for index in first..self.pages.len() {
            let top = self.page_top(index) - self.scroll;
            if top >= visible.bottom() {
                break;
            }
            let page = Rect::new(left, top, size.width, size.height);
            if !page.intersects(&visible) {
                continue;
            }
            surface.fill_rect(page.translated(SHADOW_OFFSET, SHADOW_OFFSET), Color::PageShadow);
            surface.fill_rect(page, Color::Background);
            self.paint_decorations(surface, index, page);

            let origin = self.content_origin(index);
            for page_line in &self.pages[index].lines {
                if let Some(line) = self.flow.line_at_pos(doc, page_line.start) {
                    let at = Point::new(origin.x, origin.y + page_line.y);
                    paint::paint_line(doc, surface, &line, at, width, self.paint);
                }
            }
        }

        if let Some(position) = doc.composition().map(|c| c.position) {
            let caret = self.cursor_rect(doc, position);
            paint::paint_preedit(doc, surface, caret);
        }
        surface.set_clip(None);
    }

    fn hit_test(&mut self, doc: &dyn ViewModel, x: f32, y: f32) -> usize {
        let doc_y = y + self.scroll;
        self.paginate_until(doc, doc_y);
        let index = self.page_index_at_y(doc_y);
        let origin = self.content_origin(index);
        let Some(page) = self.pages.get(index) else {
            return 0;
        };
        let relative = y - origin.y;
        let at = page
            .lines
            .partition_point(|l| l.y + l.height <= relative)
            .min(page.lines.len().saturating_sub(1));
        let Some(start) = page.lines.get(at).map(|l| l.start) else {
            return 0;
        };
        match self.flow.line_at_pos(doc, start) {
            Some(line) => line.stop_at_x(x - origin.x),
            None => 0,
        }
    }

    fn cursor_rect(&mut self, doc: &dyn ViewModel, pos: usize) -> Rect {
        let pos = pos.min(doc.len());
        let metrics = self.flow.metrics();
        let Some(line) = self.flow.line_at_pos(doc, pos) else {
            return Rect::new(0.0, 0.0, metrics.char_width, metrics.line_height);
        };
        self.paginate_past(doc, line.start);
        let index = self.page_index_at_pos(line.start);
        let origin = self.content_origin(index);
        let y = self.pages.get(index).and_then(|p| p.line_y(line.start)).unwrap_or(0.0);
        line.cell(pos, self.text_width(), metrics.char_width)
            .translated(origin.x, origin.y + y)
    }

    fn selection_rects(&mut self, doc: &dyn ViewModel, start: usize, end: usize) -> Vec<Rect> {
        self.paginate_until(doc, self.scroll + self.viewport.height);
        let width = self.text_width();
        let first = self.page_index_at_y(self.scroll);
        let mut rects = Vec::new();
        for index in first..self.pages.len() {
            let origin = self.content_origin(index);
            if origin.y > self.viewport.height {
                break;
            }
            for page_line in &self.pages[index].lines {
                let Some(line) = self.flow.line_at_pos(doc, page_line.start) else {
                    continue;
                };
                if let Some(rect) = line.selection_rect(start, end, width) {
                    rects.push(rect.translated(origin.x, origin.y + page_line.y));
                }
            }
        }
        rects
    }

    fn page_count(&mut self, doc: &dyn ViewModel) -> usize {
        self.ensure_paginated(doc);
        self.pages.len()
    }

    fn page_at(&mut self, doc: &dyn ViewModel, pos: usize) -> usize {
        let start = self.flow.line_at_pos(doc, pos).map_or(0, |l| l.start);
        self.paginate_past(doc, start);
        self.page_index_at_pos(start)
    }

    fn on_resize(&mut self, size: Size) {
        self.viewport = size;
        self.clamp_scroll();
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }

    fn on_scroll(&mut self, delta_y: f32) {
        self.scroll += delta_y;
        self.clamp_scroll();
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.flow.set_metrics(self.base_metrics.scaled(self.zoom));
        let width = self.text_width();
        self.flow.set_width(width);
        self.restart_full();
    }

    fn zoom(&self) -> f32 {
        self.zoom
    }

    fn scroll_offset(&self) -> f32 {
        self.scroll
    }

    fn content_height(&mut self, doc: &dyn ViewModel) -> f32 {
        self.ensure_paginated(doc);
        self.page_top(self.pages.len())
    }

    fn ensure_visible(&mut self, doc: &dyn ViewModel, pos: usize) {
        let caret = self.cursor_rect(doc, pos);
        if caret.y < 0.0 {
            self.scroll += caret.y;
        } else if caret.bottom() > self.viewport.height {
            self.scroll += caret.bottom() - self.viewport.height;
        }
        self.clamp_scroll();
    }

    fn line_bounds(&mut self, doc: &dyn ViewModel, pos: usize) -> (usize, usize) {
        match self.flow.line_at_pos(doc, pos) {
            Some(line) => (line.start, line.last_stop()),
            None => (0, 0),
        }
    }

    fn move_vertically(&mut self, doc: &dyn ViewModel, pos: usize, lines: isize, x: f32) -> usize {
        let Some(target) = self.flow.line_offset(doc, pos, lines) else {
            return pos;
        };
        self.paginate_past(doc, target.start);
        let origin = self.content_origin(self.page_index_at_pos(target.start));
        target.stop_at_x(x - origin.x)
    }

    fn lines_per_screen(&self) -> usize {
        (self.viewport.height / self.flow.metrics().line_height).floor().max(1.0) as usize
    }
}
