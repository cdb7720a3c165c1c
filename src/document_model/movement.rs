use super::document::DocumentModel;
use super::stats::is_word_char;

impl DocumentModel {
    /// `[start, end)` of the word at `pos`.
    ///
    /// When `pos` sits just after a word (end of text, before a space) that
    /// word is used. Outside any word the single character at `pos` is
    /// returned.
    pub fn word_bounds(&self, pos: usize) -> (usize, usize) {
        let len = self.len();
        let pos = pos.min(len);
        let on_word = self.char_at(pos).is_some_and(is_word_char);
        let after_word = pos > 0 && self.char_at(pos - 1).is_some_and(is_word_char);

        if !on_word && !after_word {
            return (pos, (pos + 1).min(len));
        }
        let start = pos - self.state.text.chars_before(pos).take_while(|c| is_word_char(*c)).count();
        let end = pos + self.state.text.chars_from(pos).take_while(|c| is_word_char(*c)).count();
        (start, end)
    }

    /// End of the next word to the right, skipping separators first.
    pub fn next_word_boundary(&self, pos: usize) -> usize {
        let pos = pos.min(self.len());
        let mut chars = self.state.text.chars_from(pos).peekable();
        let mut moved = 0;
        while chars.next_if(|c| !is_word_char(*c)).is_some() {
            moved += 1;
        }
        while chars.next_if(|c| is_word_char(*c)).is_some() {
            moved += 1;
        }
        pos + moved
    }

    /// Start of the previous word to the left, skipping separators first.
    pub fn previous_word_boundary(&self, pos: usize) -> usize {
        let pos = pos.min(self.len());
        let mut chars = self.state.text.chars_before(pos).peekable();
        let mut moved = 0;
        while chars.next_if(|c| !is_word_char(*c)).is_some() {
            moved += 1;
        }
        while chars.next_if(|c| is_word_char(*c)).is_some() {
            moved += 1;
        }
        pos - moved
    }

    /// Start of the paragraph before the one holding `pos`, or the start of
    /// the current paragraph when `pos` is not already there.
    pub fn previous_paragraph_start(&self, pos: usize) -> usize {
        let (start, _) = self.paragraph_bounds(pos);
        if start < pos || start == 0 {
            start
        } else {
            self.paragraph_bounds(start - 1).0
        }
    }

    /// Start of the paragraph after the one holding `pos`, or the end of
    /// the text.
    pub fn next_paragraph_start(&self, pos: usize) -> usize {
        let (_, end) = self.paragraph_bounds(pos);
        (end + 1).min(self.len())
    }
}
