use crate::error::{EditorError, Result};
use std::fmt;

const MIN_GAP: usize = 64;

/// Character storage with a movable gap at the last edit point.
///
/// Offsets are measured in `char`s. The buffer layout is
/// `[0, gap_start)` text, `[gap_start, gap_end)` free, `[gap_end, cap)` text.
/// Sequential typing only touches the gap edge, so it costs O(1) amortized;
/// jumping elsewhere costs the distance the gap has to travel.
#[derive(Clone)]
pub struct GapBuffer {
    buffer: Vec<char>,
    gap_start: usize,
    gap_end: usize,
}

impl GapBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MIN_GAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_GAP);
        Self {
            buffer: vec!['\0'; capacity],
            gap_start: 0,
            gap_end: capacity,
        }
    }

    pub fn from_text(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let capacity = len + MIN_GAP;
        let mut buffer = chars;
        buffer.resize(capacity, '\0');
        Self {
            buffer,
            gap_start: len,
            gap_end: capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len() - self.gap_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Where the gap currently sits, as a text offset.
    pub fn gap_position(&self) -> usize {
        self.gap_start
    }

    pub fn insert(&mut self, pos: usize, text: &str) -> Result<()> {
        if pos > self.len() {
            return Err(EditorError::out_of_range("insert position", pos, self.len()));
        }
        if text.is_empty() {
            return Ok(());
        }

        let count = text.chars().count();
        self.move_gap(pos);
        if self.gap_len() < count {
            self.grow(count);
        }
        for ch in text.chars() {
            self.buffer[self.gap_start] = ch;
            self.gap_start += 1;
        }
        Ok(())
    }

    /// Removes `len` characters starting at `start` and returns them.
    pub fn delete(&mut self, start: usize, len: usize) -> Result<String> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| EditorError::InvalidArgument(format!("delete length {len} overflows")))?;
        if start > self.len() || end > self.len() {
            return Err(EditorError::InvalidArgument(format!(
                "delete range {start}..{end} out of range (length {})",
                self.len()
            )));
        }
        if len == 0 {
            return Ok(String::new());
        }

        self.move_gap(start);
        let removed: String = self.buffer[self.gap_end..self.gap_end + len].iter().collect();
        self.gap_end += len;
        Ok(removed)
    }

    pub fn read(&self, start: usize, len: usize) -> Result<String> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| EditorError::InvalidArgument(format!("read length {len} overflows")))?;
        if end > self.len() {
            return Err(EditorError::InvalidArgument(format!(
                "read range {start}..{end} out of range (length {})",
                self.len()
            )));
        }
        Ok((start..end).map(|i| self.buffer[self.physical(i)]).collect())
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        if pos < self.len() {
            Some(self.buffer[self.physical(pos)])
        } else {
            None
        }
    }

    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.len());
        text.extend(&self.buffer[..self.gap_start]);
        text.extend(&self.buffer[self.gap_end..]);
        text
    }

    /// Iterates characters from `start` to the end of the text.
    pub fn chars_from(&self, start: usize) -> impl Iterator<Item = char> + '_ {
        (start.min(self.len())..self.len()).map(move |i| self.buffer[self.physical(i)])
    }

    /// Iterates characters backwards, starting just before `end`.
    pub fn chars_before(&self, end: usize) -> impl Iterator<Item = char> + '_ {
        (0..end.min(self.len())).rev().map(move |i| self.buffer[self.physical(i)])
    }

    fn physical(&self, logical: usize) -> usize {
        if logical < self.gap_start {
            logical
        } else {
            logical + self.gap_len()
        }
    }

    fn move_gap(&mut self, pos: usize) {
        if pos < self.gap_start {
            // Shift the span [pos, gap_start) to the end of the gap.
            let count = self.gap_start - pos;
            self.buffer
                .copy_within(pos..self.gap_start, self.gap_end - count);
            self.gap_start = pos;
            self.gap_end -= count;
        } else if pos > self.gap_start {
            // Shift the span after the gap down to where the gap started.
            let count = pos - self.gap_start;
            self.buffer
                .copy_within(self.gap_end..self.gap_end + count, self.gap_start);
            self.gap_start += count;
            self.gap_end += count;
        }
    }

    fn grow(&mut self, needed: usize) {
        let len = self.len();
        let new_capacity = (self.buffer.len() * 2).max(len + needed + MIN_GAP);
        let extra = new_capacity - self.buffer.len();
        let tail_len = self.buffer.len() - self.gap_end;

        self.buffer.resize(new_capacity, '\0');
        if tail_len > 0 {
            let old_gap_end = self.gap_end;
            self.buffer
                .copy_within(old_gap_end..old_gap_end + tail_len, old_gap_end + extra);
        }
        self.gap_end += extra;
        tracing::trace!(capacity = new_capacity, "gap buffer grown");
    }
}

impl Default for GapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl fmt::Debug for GapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GapBuffer")
            .field("len", &self.len())
            .field("gap", &(self.gap_start..self.gap_end))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_empty() {
        let buffer = GapBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.text(), "");
    }

    #[test]
    fn test_insert_in_middle() {
        let mut buffer = GapBuffer::from_text("Hello World");
        buffer.insert(5, " there").unwrap();
        assert_eq!(buffer.text(), "Hello there World");
        assert_eq!(buffer.len(), 17);
    }

    #[test]
    fn test_round_trip_restores_text() {
        let original = "The quick brown fox";
        for pos in 0..=original.chars().count() {
            let mut buffer = GapBuffer::from_text(original);
            buffer.insert(pos, "jumps ").unwrap();
            let removed = buffer.delete(pos, 6).unwrap();
            assert_eq!(removed, "jumps ");
            assert_eq!(buffer.text(), original);
            assert_eq!(buffer.len(), original.len());
        }
    }

    #[test]
    fn test_sequential_typing_keeps_gap_at_cursor() {
        let mut buffer = GapBuffer::new();
        for (i, ch) in "typing".chars().enumerate() {
            buffer.insert(i, &ch.to_string()).unwrap();
            assert_eq!(buffer.gap_position(), i + 1);
        }
        assert_eq!(buffer.text(), "typing");
    }

    #[test]
    fn test_growth_past_initial_gap() {
        let mut buffer = GapBuffer::from_text("ab");
        let long: String = std::iter::repeat('x').take(500).collect();
        buffer.insert(1, &long).unwrap();
        assert_eq!(buffer.len(), 502);
        assert_eq!(buffer.char_at(0), Some('a'));
        assert_eq!(buffer.char_at(501), Some('b'));
        assert!(buffer.capacity() >= 502);
    }

    #[test]
    fn test_delete_after_gap_moves() {
        let mut buffer = GapBuffer::from_text("Hello, Cruel World!");
        buffer.insert(0, ">> ").unwrap();
        let removed = buffer.delete(10, 6).unwrap();
        assert_eq!(removed, "Cruel ");
        assert_eq!(buffer.text(), ">> Hello, World!");
    }

    #[test]
    fn test_unicode_offsets_are_chars() {
        let mut buffer = GapBuffer::from_text("zażółć");
        assert_eq!(buffer.len(), 6);
        buffer.insert(6, " gęślą").unwrap();
        assert_eq!(buffer.read(2, 4).unwrap(), "żółć");
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut buffer = GapBuffer::from_text("abc");
        assert!(matches!(buffer.insert(4, "x"), Err(EditorError::InvalidArgument(_))));
        assert!(matches!(buffer.delete(2, 2), Err(EditorError::InvalidArgument(_))));
        assert!(matches!(buffer.read(1, 5), Err(EditorError::InvalidArgument(_))));
        assert_eq!(buffer.text(), "abc");
    }

    #[test]
    fn test_iterators_cross_the_gap() {
        let mut buffer = GapBuffer::from_text("abcdef");
        buffer.insert(3, "-").unwrap();
        let forward: String = buffer.chars_from(2).collect();
        assert_eq!(forward, "c-def");
        let backward: String = buffer.chars_before(4).collect();
        assert_eq!(backward, "-cba");
    }
}
