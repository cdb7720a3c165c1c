/// One primitive text mutation, expressed in pre-edit coordinates.
///
/// An insertion has `removed == 0`, a deletion has `inserted == 0`. Replacing
/// text is reported as a deletion followed by an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub removed: usize,
    pub inserted: usize,
}

impl TextEdit {
    pub fn insertion(pos: usize, len: usize) -> Self {
        Self { start: pos, removed: 0, inserted: len }
    }

    pub fn deletion(start: usize, len: usize) -> Self {
        Self { start, removed: len, inserted: 0 }
    }

    /// End of the affected span before the edit.
    pub fn old_end(&self) -> usize {
        self.start + self.removed
    }

    /// End of the affected span after the edit.
    pub fn new_end(&self) -> usize {
        self.start + self.inserted
    }

    pub fn is_insertion(&self) -> bool {
        self.removed == 0
    }

    /// Maps a single position through the edit.
    ///
    /// Positions before the edit stay, positions inside a removed span clamp
    /// to its start, positions at or after the old end shift by the delta.
    pub fn map_point(&self, pos: usize) -> usize {
        if pos < self.start {
            pos
        } else if pos < self.old_end() {
            self.start
        } else {
            pos + self.inserted - self.removed
        }
    }

    /// Maps the exclusive end of a range. Text inserted exactly at the end of
    /// a range does not extend it.
    pub fn map_range_end(&self, end: usize) -> usize {
        if self.is_insertion() && end == self.start {
            end
        } else {
            self.map_point(end)
        }
    }

    /// Whether a non-empty range lies entirely inside the removed span.
    pub fn swallows(&self, start: usize, end: usize) -> bool {
        self.removed > 0 && start < end && self.start <= start && end <= self.old_end()
    }

    pub fn touches(&self, start: usize, end: usize) -> bool {
        let old_end = self.old_end().max(self.start + 1);
        start < old_end && end >= self.start
    }

    /// One edit covering the effect of `self` followed by `next`, where
    /// `next` is expressed in post-`self` coordinates. The result may cover
    /// more text than was actually changed.
    pub fn compose(&self, next: &TextEdit) -> TextEdit {
        let start = self.start.min(next.start);
        let middle_end = self.new_end().max(next.old_end());
        let old_end = middle_end - self.inserted + self.removed;
        let new_end = middle_end - next.removed + next.inserted;
        TextEdit {
            start,
            removed: old_end - start,
            inserted: new_end - start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_shifts_at_and_after() {
        let edit = TextEdit::insertion(5, 3);
        assert_eq!(edit.map_point(4), 4);
        assert_eq!(edit.map_point(5), 8);
        assert_eq!(edit.map_point(9), 12);
        assert_eq!(edit.map_range_end(5), 5);
    }

    #[test]
    fn test_deletion_clamps_inside() {
        let edit = TextEdit::deletion(4, 4);
        assert_eq!(edit.map_point(3), 3);
        assert_eq!(edit.map_point(4), 4);
        assert_eq!(edit.map_point(7), 4);
        assert_eq!(edit.map_point(8), 4);
        assert_eq!(edit.map_point(10), 6);
        assert!(edit.swallows(5, 8));
        assert!(!edit.swallows(3, 6));
        assert!(!edit.swallows(5, 5));
    }

    #[test]
    fn test_compose_replace() {
        // "Hello World" -> delete "World" -> insert "Earth"
        let delete = TextEdit::deletion(6, 5);
        let insert = TextEdit::insertion(6, 5);
        assert_eq!(delete.compose(&insert), TextEdit { start: 6, removed: 5, inserted: 5 });

        // Edits far apart merge into one covering span.
        let first = TextEdit::insertion(2, 3);
        let second = TextEdit::deletion(10, 2);
        assert_eq!(first.compose(&second), TextEdit { start: 2, removed: 7, inserted: 8 });
    }
}
