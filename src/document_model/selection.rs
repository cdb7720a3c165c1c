use super::edit::TextEdit;

/// Which edge of a selection follows the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEdge {
    Start,
    End,
}

/// A non-empty selected span. `start <= end` always holds; `active` says
/// which edge the caret sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub active: SelectionEdge,
}

impl Selection {
    /// Builds a selection from an anchor and the caret position. Returns
    /// `None` when both are equal.
    pub fn from_anchor(anchor: usize, caret: usize) -> Option<Self> {
        match anchor.cmp(&caret) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(Self {
                start: anchor,
                end: caret,
                active: SelectionEdge::End,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                start: caret,
                end: anchor,
                active: SelectionEdge::Start,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The caret end.
    pub fn caret(&self) -> usize {
        match self.active {
            SelectionEdge::Start => self.start,
            SelectionEdge::End => self.end,
        }
    }

    /// The fixed end.
    pub fn anchor(&self) -> usize {
        match self.active {
            SelectionEdge::Start => self.end,
            SelectionEdge::End => self.start,
        }
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    /// Moves the selection through an edit; `None` if it collapsed.
    pub fn mapped(&self, edit: &TextEdit) -> Option<Self> {
        let start = edit.map_point(self.start);
        let end = edit.map_range_end(self.end).max(start);
        if start == end {
            None
        } else {
            Some(Self { start, end, active: self.active })
        }
    }
}
