/// Reading speed used for the reading-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentStats {
    pub words: usize,
    pub characters: usize,
    pub characters_no_spaces: usize,
    /// Non-empty paragraphs.
    pub paragraphs: usize,
    pub reading_minutes: usize,
}

impl DocumentStats {
    pub fn from_chars<I>(chars: I) -> Self
    where
        I: IntoIterator<Item = char>,
    {
        let mut stats = DocumentStats::default();
        let mut in_word = false;
        let mut paragraph_has_text = false;

        for ch in chars {
            if ch == '\n' {
                if paragraph_has_text {
                    stats.paragraphs += 1;
                }
                paragraph_has_text = false;
                in_word = false;
                continue;
            }

            stats.characters += 1;
            if ch.is_whitespace() {
                in_word = false;
                continue;
            }

            stats.characters_no_spaces += 1;
            paragraph_has_text = true;
            if is_word_char(ch) {
                if !in_word {
                    stats.words += 1;
                    in_word = true;
                }
            } else {
                in_word = false;
            }
        }
        if paragraph_has_text {
            stats.paragraphs += 1;
        }
        stats.reading_minutes = stats.words.div_ceil(WORDS_PER_MINUTE);
        stats
    }
}

/// Characters that make up words, for counting and word movement.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '\'' || ch == '’' || ch == '-' || ch == '_'
}
