//! Mouse selection state machine.

use crate::document_model::{DocumentModel, Selection, SelectionEdge};
use crate::error::Result;
use std::time::{Duration, Instant};

pub const DOUBLE_CLICK_TIME: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerState {
    #[default]
    Idle,
    Selecting { anchor: usize },
}

#[derive(Debug, Default)]
pub struct PointerTracker {
    state: PointerState,
    last_click: Option<(Instant, usize)>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    /// Primary button down at document position `pos`.
    pub fn press(&mut self, doc: &mut DocumentModel, pos: usize, shift: bool, now: Instant) -> Result<()> {
        let pos = pos.min(doc.len());
        // A click always ends the typing run, even on the caret itself
        doc.seal_typing_run();

        if shift {
            let anchor = doc.selection().map_or(doc.cursor(), |s| s.anchor());
            doc.extend_selection_to(pos)?;
            self.state = PointerState::Selecting { anchor };
            self.last_click = None;
            return Ok(());
        }

        let double = self
            .last_click
            .is_some_and(|(at, at_pos)| at_pos == pos && now.saturating_duration_since(at) <= DOUBLE_CLICK_TIME);
        if double {
            let (start, end) = doc.word_bounds(pos);
            doc.set_selection(start, end, SelectionEdge::End)?;
            self.state = PointerState::Selecting { anchor: start };
            self.last_click = None;
            tracing::trace!(start, end, "word selected by double click");
            return Ok(());
        }

        doc.set_cursor(pos)?;
        self.state = PointerState::Selecting { anchor: pos };
        self.last_click = Some((now, pos));
        Ok(())
    }

    /// Pointer moved with the button held.
    pub fn drag(&mut self, doc: &mut DocumentModel, pos: usize) -> Result<()> {
        let PointerState::Selecting { anchor } = self.state else {
            return Ok(());
        };
        let pos = pos.min(doc.len());
        match Selection::from_anchor(anchor, pos) {
            Some(selection) => doc.set_selection(selection.start, selection.end, selection.active),
            None => doc.set_cursor(pos),
        }
    }

    pub fn release(&mut self) {
        self.state = PointerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_drag_release() {
        let mut doc = DocumentModel::with_text("hello brave world");
        let mut pointer = PointerTracker::new();
        let now = Instant::now();

        pointer.press(&mut doc, 6, false, now).unwrap();
        assert_eq!(pointer.state(), PointerState::Selecting { anchor: 6 });
        assert_eq!(doc.cursor(), 6);
        assert_eq!(doc.selection(), None);

        pointer.drag(&mut doc, 11).unwrap();
        assert_eq!(doc.selected_text().as_deref(), Some("brave"));

        // Dragging back past the anchor flips the active edge
        pointer.drag(&mut doc, 2).unwrap();
        let selection = doc.selection().unwrap();
        assert_eq!((selection.start, selection.end, selection.active), (2, 6, SelectionEdge::Start));
        assert_eq!(doc.cursor(), 2);

        pointer.release();
        assert_eq!(pointer.state(), PointerState::Idle);
        pointer.drag(&mut doc, 17).unwrap();
        assert_eq!(doc.selected_text().as_deref(), Some("llo "));
    }

    #[test]
    fn test_double_click_selects_word() {
        let mut doc = DocumentModel::with_text("hello brave world");
        let mut pointer = PointerTracker::new();
        let now = Instant::now();

        pointer.press(&mut doc, 8, false, now).unwrap();
        pointer.release();
        pointer.press(&mut doc, 8, false, now + Duration::from_millis(200)).unwrap();
        assert_eq!(doc.selected_text().as_deref(), Some("brave"));

        // Too slow for a double click
        pointer.release();
        pointer.press(&mut doc, 2, false, now + Duration::from_secs(1)).unwrap();
        pointer.press(&mut doc, 2, false, now + Duration::from_secs(2)).unwrap();
        assert_eq!(doc.selection(), None);
    }

    #[test]
    fn test_shift_click_extends() {
        let mut doc = DocumentModel::with_text("hello brave world");
        let mut pointer = PointerTracker::new();
        let now = Instant::now();

        pointer.press(&mut doc, 6, false, now).unwrap();
        pointer.release();
        pointer.press(&mut doc, 17, true, now).unwrap();
        assert_eq!(doc.selected_text().as_deref(), Some("brave world"));
        pointer.drag(&mut doc, 11).unwrap();
        assert_eq!(doc.selected_text().as_deref(), Some("brave"));
    }

    #[test]
    fn test_click_breaks_typing_run() {
        let mut doc = DocumentModel::new();
        let mut pointer = PointerTracker::new();
        let now = Instant::now();

        doc.type_char('a', now).unwrap();
        pointer.press(&mut doc, 1, false, now).unwrap();
        doc.type_char('b', now).unwrap();
        assert!(doc.undo());
        assert_eq!(doc.text(), "a");
    }
}
