use super::document::DocumentModel;
use crate::error::{EditorError, Result};
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Treat the pattern as a regular expression instead of literal text.
    pub regex: bool,
    pub wrap: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            regex: false,
            wrap: true,
        }
    }
}

/// A match in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SearchMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Find and replace over a [`DocumentModel`].
///
/// Matches are cached per document revision and recomputed lazily after
/// any edit.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    pattern: String,
    options: SearchOptions,
    regex: Option<Regex>,
    matches: Vec<SearchMatch>,
    current: Option<usize>,
    searched_revision: Option<u64>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn options(&self) -> SearchOptions {
        self.options
    }

    /// Compiles a new pattern. An empty pattern clears the search.
    pub fn set_pattern(&mut self, pattern: &str, options: SearchOptions) -> Result<()> {
        self.pattern = pattern.to_string();
        self.options = options;
        self.matches.clear();
        self.current = None;
        self.searched_revision = None;
        self.regex = None;

        if pattern.is_empty() {
            return Ok(());
        }

        let mut source = if options.regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        if options.whole_word {
            source = format!(r"\b(?:{source})\b");
        }
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .build()
            .map_err(|e| EditorError::InvalidPattern(e.to_string()))?;
        self.regex = Some(regex);
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.regex.is_some()
    }

    /// All matches in the current text.
    pub fn find_all(&mut self, doc: &DocumentModel) -> &[SearchMatch] {
        self.refresh(doc);
        &self.matches
    }

    pub fn match_count(&mut self, doc: &DocumentModel) -> usize {
        self.find_all(doc).len()
    }

    /// The match last returned by a find call, if the text has not changed.
    pub fn current(&self) -> Option<&SearchMatch> {
        self.current.and_then(|i| self.matches.get(i))
    }

    /// First match starting at or after `from`, wrapping if enabled.
    pub fn find_next(&mut self, doc: &DocumentModel, from: usize) -> Option<SearchMatch> {
        self.refresh(doc);
        let index = match self.matches.iter().position(|m| m.start >= from) {
            Some(index) => index,
            None if self.options.wrap && !self.matches.is_empty() => 0,
            None => return None,
        };
        self.current = Some(index);
        self.matches.get(index).cloned()
    }

    /// Last match starting before `from`, wrapping if enabled.
    pub fn find_previous(&mut self, doc: &DocumentModel, from: usize) -> Option<SearchMatch> {
        self.refresh(doc);
        let index = match self.matches.iter().rposition(|m| m.start < from) {
            Some(index) => index,
            None if self.options.wrap && !self.matches.is_empty() => self.matches.len() - 1,
            None => return None,
        };
        self.current = Some(index);
        self.matches.get(index).cloned()
    }

    /// Replaces the current match and advances to the next one. Returns
    /// the range of the inserted replacement, or `None` when there was no
    /// current match.
    pub fn replace_current(
        &mut self,
        doc: &mut DocumentModel,
        replacement: &str,
    ) -> Result<Option<(usize, usize)>> {
        self.refresh(doc);
        let Some(found) = self.current().cloned() else {
            return Ok(None);
        };
        let text = self.expand(&doc.text(), &found, replacement);
        let inserted = text.chars().count();
        doc.replace_text(found.start, found.len(), &text)?;
        tracing::debug!(start = found.start, removed = found.len(), inserted, "replaced match");

        let after = found.start + inserted;
        self.refresh(doc);
        self.current = self.matches.iter().position(|m| m.start >= after);
        Ok(Some((found.start, after)))
    }

    /// Replaces every match as one undoable edit. Returns the number of
    /// replacements.
    pub fn replace_all(&mut self, doc: &mut DocumentModel, replacement: &str) -> Result<usize> {
        self.refresh(doc);
        if self.matches.is_empty() {
            return Ok(0);
        }
        let text = doc.text();
        let edits: Vec<(usize, usize, String)> = self
            .matches
            .iter()
            .map(|m| (m.start, m.len(), self.expand(&text, m, replacement)))
            .collect();
        let count = edits.len();
        doc.replace_ranges(edits, "Replace All")?;
        tracing::debug!(count, pattern = %self.pattern, "replaced all matches");
        self.refresh(doc);
        Ok(count)
    }

    fn refresh(&mut self, doc: &DocumentModel) {
        if self.searched_revision == Some(doc.revision()) {
            return;
        }
        self.searched_revision = Some(doc.revision());
        self.current = None;
        self.matches.clear();
        let Some(regex) = &self.regex else {
            return;
        };

        let text = doc.text();
        let mut chars_seen = 0;
        let mut bytes_seen = 0;
        for found in regex.find_iter(&text) {
            if found.start() == found.end() {
                continue;
            }
            chars_seen += text[bytes_seen..found.start()].chars().count();
            let len = found.as_str().chars().count();
            self.matches.push(SearchMatch {
                start: chars_seen,
                end: chars_seen + len,
                text: found.as_str().to_string(),
            });
            chars_seen += len;
            bytes_seen = found.end();
        }
    }

    /// Replacement text for one match; `$1`-style groups expand in regex mode.
    fn expand(&self, text: &str, found: &SearchMatch, replacement: &str) -> String {
        let Some(regex) = self.regex.as_ref().filter(|_| self.options.regex) else {
            return replacement.to_string();
        };
        let byte_start = text
            .char_indices()
            .nth(found.start)
            .map_or(text.len(), |(i, _)| i);
        match regex.captures_at(text, byte_start) {
            Some(caps) => {
                let mut expanded = String::new();
                caps.expand(replacement, &mut expanded);
                expanded
            }
            None => replacement.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_search_is_case_insensitive_by_default() {
        let doc = DocumentModel::with_text("Rain. rain? RAIN!");
        let mut search = SearchEngine::new();
        search.set_pattern("rain", SearchOptions::default()).unwrap();
        let starts: Vec<usize> = search.find_all(&doc).iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 6, 12]);
    }

    #[test]
    fn test_char_offsets_after_multibyte_text() {
        let doc = DocumentModel::with_text("café — café");
        let mut search = SearchEngine::new();
        search.set_pattern("café", SearchOptions::default()).unwrap();
        let found: Vec<(usize, usize)> = search.find_all(&doc).iter().map(|m| (m.start, m.end)).collect();
        assert_eq!(found, vec![(0, 4), (7, 11)]);
    }

    #[test]
    fn test_whole_word_and_case() {
        let doc = DocumentModel::with_text("art Art party art");
        let mut search = SearchEngine::new();
        let options = SearchOptions { case_sensitive: true, whole_word: true, ..SearchOptions::default() };
        search.set_pattern("art", options).unwrap();
        let starts: Vec<usize> = search.find_all(&doc).iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 14]);
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let doc = DocumentModel::with_text("a x a x a");
        let mut search = SearchEngine::new();
        search.set_pattern("a", SearchOptions::default()).unwrap();
        assert_eq!(search.find_next(&doc, 1).unwrap().start, 4);
        assert_eq!(search.find_next(&doc, 9).unwrap().start, 0);
        assert_eq!(search.find_previous(&doc, 4).unwrap().start, 0);
        assert_eq!(search.find_previous(&doc, 0).unwrap().start, 8);

        let options = SearchOptions { wrap: false, ..SearchOptions::default() };
        search.set_pattern("a", options).unwrap();
        assert!(search.find_next(&doc, 9).is_none());
    }

    #[test]
    fn test_invalid_regex() {
        let mut search = SearchEngine::new();
        let options = SearchOptions { regex: true, ..SearchOptions::default() };
        let err = search.set_pattern("(unclosed", options).unwrap_err();
        assert!(matches!(err, EditorError::InvalidPattern(_)));
    }

    #[test]
    fn test_replace_current_advances() {
        let mut doc = DocumentModel::with_text("cat and cat");
        let mut search = SearchEngine::new();
        search.set_pattern("cat", SearchOptions::default()).unwrap();
        search.find_next(&doc, 0);
        let replaced = search.replace_current(&mut doc, "lion").unwrap();
        assert_eq!(replaced, Some((0, 4)));
        assert_eq!(doc.text(), "lion and cat");
        assert_eq!(search.current().map(|m| m.start), Some(9));
    }

    #[test]
    fn test_replace_all_is_one_undo_step() {
        let mut doc = DocumentModel::with_text("one fish two fish red fish");
        let mut search = SearchEngine::new();
        search.set_pattern("fish", SearchOptions::default()).unwrap();
        assert_eq!(search.replace_all(&mut doc, "cat").unwrap(), 3);
        assert_eq!(doc.text(), "one cat two cat red cat");
        assert!(doc.undo());
        assert_eq!(doc.text(), "one fish two fish red fish");
    }

    #[test]
    fn test_regex_groups_expand() {
        let mut doc = DocumentModel::with_text("Smith, John; Doe, Jane");
        let mut search = SearchEngine::new();
        let options = SearchOptions { regex: true, case_sensitive: true, ..SearchOptions::default() };
        search.set_pattern(r"(\w+), (\w+)", options).unwrap();
        search.replace_all(&mut doc, "$2 $1").unwrap();
        assert_eq!(doc.text(), "John Smith; Jane Doe");
    }
}
