//! Typewriter view: the caret line stays at a fixed height of the viewport
//! and the text scrolls underneath it.

use super::continuous::ContinuousLayout;
use super::engine::LayoutEngine;
use super::geometry::{Rect, Size};
use super::mode::ViewMode;
use super::shaping::{FontMetrics, TextShaper};
use super::surface::Surface;
use super::view_model::ViewModel;
use crate::document_model::TextEdit;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Fraction of the viewport height where the caret line sits.
pub const DEFAULT_FOCUS: f32 = 0.4;
pub const DEFAULT_SCROLL_DURATION: Duration = Duration::from_millis(150);

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

#[derive(Debug, Clone, Copy)]
struct ScrollAnimation {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
}

impl ScrollAnimation {
    /// Offset at `now`, and whether the animation has finished.
    fn sample(&self, now: Instant) -> (f32, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        (self.from + (self.to - self.from) * ease_out_cubic(t), false)
    }
}

#[derive(Debug)]
pub struct CenterLockLayout {
    inner: ContinuousLayout,
    focus: f32,
    duration: Duration,
    smooth: bool,
    animation: Option<ScrollAnimation>,
}

impl CenterLockLayout {
    pub fn new(shaper: Rc<dyn TextShaper>, metrics: FontMetrics, viewport: Size) -> Self {
        let mut layout = Self {
            inner: ContinuousLayout::new(shaper, metrics, viewport),
            focus: DEFAULT_FOCUS,
            duration: DEFAULT_SCROLL_DURATION,
            smooth: true,
            animation: None,
        };
        layout.apply_padding();
        layout
    }

    pub fn with_focus(mut self, focus: f32) -> Self {
        self.focus = focus.clamp(0.0, 1.0);
        self.apply_padding();
        self
    }

    pub fn with_scroll_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn focus(&self) -> f32 {
        self.focus
    }

    /// With smooth scrolling off the view jumps straight to the caret.
    pub fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
        if !smooth {
            self.finish_animation();
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    fn apply_padding(&mut self) {
        let height = self.inner.viewport_size().height;
        self.inner.set_padding(height * self.focus, height * (1.0 - self.focus));
    }

    fn finish_animation(&mut self) {
        if let Some(animation) = self.animation.take() {
            self.inner.set_scroll(animation.to);
        }
    }
}

impl LayoutEngine for CenterLockLayout {
    fn kind(&self) -> ViewMode {
        ViewMode::Typewriter
    }

    fn initialize(&mut self, doc: &dyn ViewModel) {
        self.animation = None;
        self.inner.initialize(doc);
    }

    fn on_edit(&mut self, doc: &dyn ViewModel, edit: &TextEdit) {
        self.inner.on_edit(doc, edit);
    }

    fn render(&mut self, doc: &dyn ViewModel, surface: &mut dyn Surface, visible: Rect) {
        self.inner.render(doc, surface, visible);
    }

    fn hit_test(&mut self, doc: &dyn ViewModel, x: f32, y: f32) -> usize {
        self.inner.hit_test(doc, x, y)
    }

    fn cursor_rect(&mut self, doc: &dyn ViewModel, pos: usize) -> Rect {
        self.inner.cursor_rect(doc, pos)
    }

    fn selection_rects(&mut self, doc: &dyn ViewModel, start: usize, end: usize) -> Vec<Rect> {
        self.inner.selection_rects(doc, start, end)
    }

    fn page_count(&mut self, doc: &dyn ViewModel) -> usize {
        self.inner.page_count(doc)
    }

    fn page_at(&mut self, doc: &dyn ViewModel, pos: usize) -> usize {
        self.inner.page_at(doc, pos)
    }

    fn on_resize(&mut self, size: Size) {
        self.inner.on_resize(size);
        self.apply_padding();
    }

    fn viewport_size(&self) -> Size {
        self.inner.viewport_size()
    }

    fn on_scroll(&mut self, delta_y: f32) {
        self.animation = None;
        self.inner.on_scroll(delta_y);
    }

    fn set_zoom(&mut self, zoom: f32) {
        self.inner.set_zoom(zoom);
    }

    fn zoom(&self) -> f32 {
        self.inner.zoom()
    }

    fn scroll_offset(&self) -> f32 {
        self.inner.scroll_offset()
    }

    fn content_height(&mut self, doc: &dyn ViewModel) -> f32 {
        self.inner.content_height(doc)
    }

    /// Jumps without animating.
    fn ensure_visible(&mut self, doc: &dyn ViewModel, pos: usize) {
        self.animation = None;
        let target = self.inner.line_top(doc, pos);
        self.inner.set_scroll(target);
    }

    fn on_cursor_moved(&mut self, doc: &dyn ViewModel, pos: usize, now: Instant) {
        let target = self.inner.line_top(doc, pos);
        let from = self.inner.scroll_offset();
        if !self.smooth || self.duration.is_zero() || (target - from).abs() < 0.5 {
            self.animation = None;
            self.inner.set_scroll(target);
            return;
        }
        tracing::trace!(from, target, "scroll animation started");
        self.animation = Some(ScrollAnimation {
            from,
            to: target,
            started: now,
            duration: self.duration,
        });
    }

    fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };
        let (offset, done) = animation.sample(now);
        self.inner.set_scroll(offset);
        if done {
            self.animation = None;
        }
        true
    }

    fn line_bounds(&mut self, doc: &dyn ViewModel, pos: usize) -> (usize, usize) {
        self.inner.line_bounds(doc, pos)
    }

    fn move_vertically(&mut self, doc: &dyn ViewModel, pos: usize, lines: isize, x: f32) -> usize {
        self.inner.move_vertically(doc, pos, lines, x)
    }

    fn lines_per_screen(&self) -> usize {
        self.inner.lines_per_screen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::DocumentModel;
    use crate::view::shaping::MonospaceShaper;
    use crate::view::view_model::DocumentViewModel;

    fn typewriter(doc: &DocumentModel) -> CenterLockLayout {
        let mut layout = CenterLockLayout::new(
            Rc::new(MonospaceShaper),
            FontMetrics::new(16.0, 1.0),
            Size::new(272.0, 160.0),
        );
        layout.initialize(&DocumentViewModel::new(doc));
        layout
    }

    fn forty_lines() -> DocumentModel {
        let text = (0..40).map(|i| format!("row {i}")).collect::<Vec<_>>().join("\n");
        DocumentModel::with_text(&text)
    }

    #[test]
    fn test_ease_out_cubic() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < 1e-6);
        assert_eq!(ease_out_cubic(3.0), 1.0);
    }

    #[test]
    fn test_first_line_sits_at_focus() {
        let doc = DocumentModel::with_text("only line");
        let view = DocumentViewModel::new(&doc);
        let mut layout = typewriter(&doc);
        layout.ensure_visible(&view, 0);
        assert_eq!(layout.scroll_offset(), 0.0);
        assert_eq!(layout.cursor_rect(&view, 0).y, 64.0);
    }

    #[test]
    fn test_cursor_move_animates_to_focus() {
        let doc = forty_lines();
        let view = DocumentViewModel::new(&doc);
        let mut layout = typewriter(&doc);
        let start = Instant::now();

        // "row 20" starts paragraph 20.
        let pos = doc.text().find("row 20").unwrap();
        layout.on_cursor_moved(&view, pos, start);
        assert!(layout.is_animating());
        assert_eq!(layout.scroll_offset(), 0.0);

        assert!(layout.tick(start + Duration::from_millis(75)));
        assert!((layout.scroll_offset() - 320.0 * 0.875).abs() < 0.01);

        assert!(layout.tick(start + Duration::from_millis(150)));
        assert_eq!(layout.scroll_offset(), 320.0);
        assert_eq!(layout.cursor_rect(&view, pos).y, 64.0);
        assert!(!layout.tick(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_instant_when_smooth_disabled() {
        let doc = forty_lines();
        let view = DocumentViewModel::new(&doc);
        let mut layout = typewriter(&doc);
        layout.set_smooth(false);
        layout.on_cursor_moved(&view, doc.len(), Instant::now());
        assert!(!layout.is_animating());
        assert_eq!(layout.cursor_rect(&view, doc.len()).y, 64.0);
    }

    #[test]
    fn test_manual_scroll_cancels_animation() {
        let doc = forty_lines();
        let view = DocumentViewModel::new(&doc);
        let mut layout = typewriter(&doc);
        layout.on_cursor_moved(&view, doc.len(), Instant::now());
        layout.on_scroll(10.0);
        assert!(!layout.is_animating());
        assert_eq!(layout.scroll_offset(), 10.0);
    }
}
