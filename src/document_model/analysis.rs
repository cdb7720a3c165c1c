//! Writer-facing text analysis: word frequency, close repetitions and inline
//! tags such as `TODO:`. Everything here works on a [`DocumentSnapshot`] so
//! it can run on a worker thread and report back through a
//! [`ResultInbox`](super::background::ResultInbox).

use super::background::{AnalysisResult, Diagnostic, DiagnosticKind, DocumentSnapshot};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

pub const DEFAULT_OVERUSE_THRESHOLD: f64 = 1.5;
pub const DEFAULT_REPETITION_DISTANCE: usize = 50;

static WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b\p{L}+\b").ok());
static TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(TODO|FIX|CHECK|NOTE|WARNING)\b\s*:?\s*(.*)").ok());

const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "as", "is",
    "was", "are", "were", "been", "be", "have", "has", "had", "do", "does", "did", "will", "would", "could",
    "should", "may", "might", "must", "shall", "can", "need", "it", "its", "this", "that", "these", "those", "i",
    "you", "he", "she", "we", "they", "me", "him", "her", "us", "them", "my", "your", "his", "our", "their", "what",
    "which", "who", "whom", "whose", "where", "when", "why", "how", "all", "each", "every", "both", "few", "more",
    "most", "other", "some", "such", "no", "not", "only", "same", "so", "than", "too", "very", "just", "also", "now",
    "here", "there", "then", "if", "about", "into", "through", "during", "before", "after", "above", "below",
    "between", "under", "again", "once", "any", "because", "being", "down", "further", "herself", "himself",
    "itself", "myself", "ourselves", "themselves", "yourself", "yourselves", "off", "out", "over", "own", "up",
    "while", "against", "am", "aren", "couldn", "didn", "doesn", "don", "hadn", "hasn", "haven", "isn", "ll",
    "mightn", "mustn", "needn", "shan", "shouldn", "ve", "wasn", "weren", "won", "wouldn", "s", "t", "d", "m", "re",
];

const POLISH_STOP_WORDS: &[&str] = &[
    "i", "w", "z", "na", "do", "o", "ze", "to", "nie", "sie", "co", "jak", "ale", "po", "tak", "za", "od", "juz",
    "czy", "gdy", "go", "je", "jego", "jej", "ich", "tylko", "lub", "przez", "przy", "tym", "oraz", "ten", "ta",
    "te", "tej", "tego", "tych", "byc", "jest", "sa", "byl", "byla", "bylo", "bedzie", "a", "jako", "tez", "wiec",
    "aby", "jednak", "moze", "mozna", "mi", "mnie", "my", "nas", "ty", "ci", "wy", "was", "on", "ona", "ono", "oni",
    "one", "sobie", "siebie", "bo", "gdyz", "poniewaz", "ktory", "ktora", "ktore", "ktorzy", "u", "bardzo", "bez",
    "dla", "jeszcze", "kiedy", "niech", "pod", "przed", "nad", "miedzy", "razem", "wszystko", "nic", "kto",
    "nigdy", "zawsze", "teraz", "tutaj", "tam", "wszyscy", "kazdy", "kazda", "swoj", "swoja", "swoje", "twoj",
    "twoja", "twoje",
];

/// Language whose stop-word list is filtered out of frequency counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Polish,
}

impl Language {
    pub fn id(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Polish => "pl",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "pl" | "polish" => Some(Language::Polish),
            _ => None,
        }
    }

    fn stop_words(&self) -> &'static [&'static str] {
        match self {
            Language::English => ENGLISH_STOP_WORDS,
            Language::Polish => POLISH_STOP_WORDS,
        }
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.stop_words().contains(&word.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyOptions {
    /// Share of counted words, in percent, at which a word is overused.
    pub overuse_threshold: f64,
    /// Largest gap, in words, still reported as a close repetition.
    pub repetition_distance: usize,
    pub filter_stop_words: bool,
    pub language: Language,
}

impl Default for FrequencyOptions {
    fn default() -> Self {
        Self {
            overuse_threshold: DEFAULT_OVERUSE_THRESHOLD,
            repetition_distance: DEFAULT_REPETITION_DISTANCE,
            filter_stop_words: true,
            language: Language::English,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordFrequency {
    /// Lowercased word.
    pub word: String,
    pub count: usize,
    /// Share of counted words, in percent.
    pub percentage: f64,
    pub overused: bool,
}

/// The same word twice within the repetition distance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRepetition {
    pub word: String,
    /// Word indices of the two occurrences.
    pub first: usize,
    pub second: usize,
    pub distance: usize,
    /// Character range of the second occurrence.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyReport {
    /// Sorted by count, most frequent first.
    pub frequencies: Vec<WordFrequency>,
    /// Sorted by distance, closest first.
    pub repetitions: Vec<CloseRepetition>,
    /// Words counted after stop-word filtering.
    pub total_words: usize,
    positions: HashMap<String, Vec<usize>>,
}

impl FrequencyReport {
    pub fn unique_words(&self) -> usize {
        self.frequencies.len()
    }

    pub fn top_words(&self, n: usize) -> &[WordFrequency] {
        &self.frequencies[..n.min(self.frequencies.len())]
    }

    pub fn overused(&self) -> impl Iterator<Item = &WordFrequency> + '_ {
        self.frequencies.iter().filter(|f| f.overused)
    }

    /// Case-insensitive lookup; unknown words report a count of zero.
    pub fn frequency_of(&self, word: &str) -> WordFrequency {
        let word = word.to_lowercase();
        self.frequencies
            .iter()
            .find(|f| f.word == word)
            .cloned()
            .unwrap_or(WordFrequency { word, count: 0, percentage: 0.0, overused: false })
    }

    /// Word indices where `word` occurs.
    pub fn positions_of(&self, word: &str) -> &[usize] {
        self.positions.get(&word.to_lowercase()).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Maps increasing byte offsets of one string to character offsets.
struct CharCounter<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharCounter<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, byte: 0, chars: 0 }
    }

    fn at(&mut self, byte: usize) -> usize {
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

/// Counts words of two or more letters, case-insensitively.
pub fn analyze_words(text: &str, options: &FrequencyOptions) -> FrequencyReport {
    let Some(pattern) = WORD.as_ref() else {
        tracing::warn!("word pattern unavailable");
        return FrequencyReport::default();
    };
    let mut counter = CharCounter::new(text);
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
    let mut ranges: HashMap<usize, (usize, usize)> = HashMap::new();
    let mut total = 0usize;

    let words = pattern.find_iter(text).filter(|m| m.as_str().chars().nth(1).is_some());
    for (index, found) in words.enumerate() {
        let word = found.as_str().to_lowercase();
        if options.filter_stop_words && options.language.is_stop_word(&word) {
            continue;
        }
        let start = counter.at(found.start());
        let end = counter.at(found.end());
        ranges.insert(index, (start, end));
        *counts.entry(word.clone()).or_default() += 1;
        positions.entry(word).or_default().push(index);
        total += 1;
    }

    let mut frequencies: Vec<WordFrequency> = counts
        .into_iter()
        .map(|(word, count)| {
            let percentage = 100.0 * count as f64 / total as f64;
            WordFrequency { word, count, percentage, overused: percentage >= options.overuse_threshold }
        })
        .collect();
    frequencies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));

    let mut repetitions = Vec::new();
    for (word, seen) in &positions {
        for pair in seen.windows(2) {
            let distance = pair[1] - pair[0];
            if distance <= options.repetition_distance {
                let (start, end) = ranges.get(&pair[1]).copied().unwrap_or_default();
                repetitions.push(CloseRepetition {
                    word: word.clone(),
                    first: pair[0],
                    second: pair[1],
                    distance,
                    start,
                    end,
                });
            }
        }
    }
    repetitions.sort_by_key(|r| (r.distance, r.first));

    tracing::debug!(
        total,
        unique = frequencies.len(),
        repetitions = repetitions.len(),
        "word frequency analysed"
    );
    FrequencyReport { frequencies, repetitions, total_words: total, positions }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Todo,
    Fix,
    Check,
    Note,
    Warning,
}

impl TagKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            TagKind::Todo => "TODO",
            TagKind::Fix => "FIX",
            TagKind::Check => "CHECK",
            TagKind::Note => "NOTE",
            TagKind::Warning => "WARNING",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "TODO" => Some(TagKind::Todo),
            "FIX" => Some(TagKind::Fix),
            "CHECK" => Some(TagKind::Check),
            "NOTE" => Some(TagKind::Note),
            "WARNING" => Some(TagKind::Warning),
            _ => None,
        }
    }
}

/// A tag keyword and the rest of its paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedTag {
    pub kind: TagKind,
    pub paragraph: usize,
    /// Character offset of the keyword in the document.
    pub start: usize,
    /// Keyword length in characters.
    pub len: usize,
    pub content: String,
}

impl DetectedTag {
    /// One-based, for display.
    pub fn line_number(&self) -> usize {
        self.paragraph + 1
    }
}

/// Finds `TODO`, `FIX`, `CHECK`, `NOTE` and `WARNING` markers, in any case,
/// one per paragraph at most.
pub fn detect_tags(text: &str) -> Vec<DetectedTag> {
    let mut tags = Vec::new();
    let Some(pattern) = TAG.as_ref() else {
        tracing::warn!("tag pattern unavailable");
        return tags;
    };
    let mut paragraph_start = 0usize;
    for (paragraph, line) in text.split('\n').enumerate() {
        for captures in pattern.captures_iter(line) {
            let (Some(keyword), Some(content)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let Some(kind) = TagKind::from_keyword(keyword.as_str()) else {
                continue;
            };
            let offset = line[..keyword.start()].chars().count();
            tags.push(DetectedTag {
                kind,
                paragraph,
                start: paragraph_start + offset,
                len: keyword.as_str().chars().count(),
                content: content.as_str().trim().to_string(),
            });
        }
        paragraph_start += line.chars().count() + 1;
    }
    tracing::trace!(tags = tags.len(), "tags scanned");
    tags
}

/// Everything the writer panels show, computed from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterReport {
    /// Revision of the snapshot the report describes.
    pub revision: u64,
    pub frequency: FrequencyReport,
    pub tags: Vec<DetectedTag>,
}

impl WriterReport {
    /// Tags and close repetitions as ranged diagnostics, so they follow
    /// later edits like any other background result.
    pub fn diagnostics(&self) -> Vec<AnalysisResult<Diagnostic>> {
        let tags = self.tags.iter().map(|tag| AnalysisResult {
            revision: self.revision,
            start: tag.start,
            end: tag.start + tag.len,
            payload: Diagnostic {
                kind: DiagnosticKind::Tag(tag.kind),
                message: format!("{}: {}", tag.kind.keyword(), tag.content),
                suggestions: Vec::new(),
            },
        });
        let repetitions = self.frequency.repetitions.iter().map(|repetition| AnalysisResult {
            revision: self.revision,
            start: repetition.start,
            end: repetition.end,
            payload: Diagnostic {
                kind: DiagnosticKind::Repetition,
                message: format!("'{}' repeated after {} words", repetition.word, repetition.distance),
                suggestions: Vec::new(),
            },
        });
        tags.chain(repetitions).collect()
    }
}

pub fn analyze_snapshot(snapshot: &DocumentSnapshot, options: &FrequencyOptions) -> WriterReport {
    WriterReport {
        revision: snapshot.revision,
        frequency: analyze_words(&snapshot.text, options),
        tags: detect_tags(&snapshot.text),
    }
}

/// Analyses `snapshot` on a worker thread. The report covers the whole
/// snapshot, so any later edit makes it stale.
pub fn spawn_writer_analysis(
    snapshot: DocumentSnapshot,
    options: FrequencyOptions,
    sender: Sender<AnalysisResult<WriterReport>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let end = snapshot.text.chars().count();
        let report = analyze_snapshot(&snapshot, &options);
        let result = AnalysisResult { revision: snapshot.revision, start: 0, end, payload: report };
        if sender.send(result).is_err() {
            tracing::debug!(revision = snapshot.revision, "writer analysis dropped, inbox closed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::{DocumentModel, ResultInbox};

    fn report(text: &str) -> FrequencyReport {
        analyze_words(text, &FrequencyOptions::default())
    }

    #[test]
    fn test_counts_are_case_insensitive_and_skip_short_words() {
        let counted = report("Word word WORD");
        assert_eq!((counted.total_words, counted.unique_words()), (3, 1));
        assert_eq!(counted.frequency_of("Word").count, 3);

        let counted = analyze_words(
            "I am a test, x.",
            &FrequencyOptions { filter_stop_words: false, ..FrequencyOptions::default() },
        );
        assert_eq!(counted.total_words, 2);
        assert_eq!(report("").total_words, 0);
        assert_eq!(report("Hello, world! How's it: going?").total_words, 3);
    }

    #[test]
    fn test_frequencies_sorted_with_percentages() {
        let counted = report("aaa bbb aaa ccc bbb aaa");
        let words: Vec<(&str, usize)> = counted.frequencies.iter().map(|f| (f.word.as_str(), f.count)).collect();
        assert_eq!(words, vec![("aaa", 3), ("bbb", 2), ("ccc", 1)]);
        assert!((counted.frequency_of("aaa").percentage - 50.0).abs() < 1e-9);
        assert_eq!(counted.top_words(2).len(), 2);
        assert_eq!(counted.top_words(10).len(), 3);
        assert_eq!(counted.frequency_of("zzz").count, 0);
    }

    #[test]
    fn test_overuse_threshold() {
        let text = format!("test {}", (0..99).map(|i| format!("w{}", "x".repeat(i + 1))).collect::<Vec<_>>().join(" "));
        let mut options = FrequencyOptions { overuse_threshold: 1.0, ..FrequencyOptions::default() };
        let counted = analyze_words(&format!("{text} test"), &options);
        let overused: Vec<&str> = counted.overused().map(|f| f.word.as_str()).collect();
        assert_eq!(overused, vec!["test"]);

        options.overuse_threshold = 5.0;
        assert_eq!(analyze_words(&format!("{text} test"), &options).overused().count(), 0);
    }

    #[test]
    fn test_stop_words() {
        assert_eq!(report("The quick brown fox is here").total_words, 3);
        let unfiltered = FrequencyOptions { filter_stop_words: false, ..FrequencyOptions::default() };
        assert_eq!(analyze_words("The quick brown fox is here", &unfiltered).total_words, 6);

        assert!(Language::English.is_stop_word("THE"));
        assert!(!Language::English.is_stop_word("fox"));
        assert!(Language::Polish.is_stop_word("jest"));
        assert!(!Language::Polish.is_stop_word("kot"));
        assert_eq!(Language::from_id("PL"), Some(Language::Polish));
    }

    #[test]
    fn test_close_repetitions_carry_ranges() {
        let text = "The test was a good test, said another voice far away.";
        let counted = report(text);
        assert_eq!(counted.repetitions.len(), 1);
        let repetition = &counted.repetitions[0];
        assert_eq!(repetition.word, "test");
        // Word indices count stop words but not single letters:
        // the(0) test(1) was(2) good(3) test(4).
        assert_eq!((repetition.first, repetition.second, repetition.distance), (1, 4, 3));
        let found: String = text.chars().skip(repetition.start).take(repetition.end - repetition.start).collect();
        assert_eq!((repetition.start, found.as_str()), (20, "test"));
        assert_eq!(counted.positions_of("TEST"), &[1, 4]);

        let far = FrequencyOptions { repetition_distance: 2, ..FrequencyOptions::default() };
        assert!(analyze_words(text, &far).repetitions.is_empty());
    }

    #[test]
    fn test_tags_with_positions() {
        let text = "Opening line.\nźle TODO: rewrite this\nnote - check dates\nfixed nothing here";
        let tags = detect_tags(text);
        assert_eq!(tags.len(), 2);

        assert_eq!(tags[0].kind, TagKind::Todo);
        assert_eq!((tags[0].paragraph, tags[0].line_number()), (1, 2));
        assert_eq!((tags[0].start, tags[0].len), (18, 4));
        assert_eq!(tags[0].content, "rewrite this");

        // One marker per paragraph; the rest of the line is its content.
        assert_eq!(tags[1].kind, TagKind::Note);
        assert_eq!(tags[1].start, 37);
        assert_eq!(tags[1].content, "- check dates");
        assert_eq!(TagKind::from_keyword("warning"), Some(TagKind::Warning));
    }

    #[test]
    fn test_report_through_inbox() {
        let doc = DocumentModel::with_text("FIX: the the ending");
        let inbox = ResultInbox::new();
        spawn_writer_analysis(doc.snapshot(), FrequencyOptions::default(), inbox.sender())
            .join()
            .unwrap();

        let results = inbox.drain(&doc);
        assert_eq!(results.len(), 1);
        let report = &results[0].payload;
        assert_eq!(report.revision, doc.revision());
        assert_eq!(report.tags[0].kind, TagKind::Fix);
        assert_eq!(report.frequency.frequency_of("ending").count, 1);
    }

    #[test]
    fn test_report_as_diagnostics() {
        let doc = DocumentModel::with_text("CHECK: dates\nrain, rain everywhere");
        let report = analyze_snapshot(&doc.snapshot(), &FrequencyOptions::default());
        let diagnostics = report.diagnostics();
        let spans: Vec<(DiagnosticKind, usize, usize)> =
            diagnostics.iter().map(|d| (d.payload.kind, d.start, d.end)).collect();
        assert_eq!(
            spans,
            vec![(DiagnosticKind::Tag(TagKind::Check), 0, 5), (DiagnosticKind::Repetition, 19, 23)]
        );
        assert_eq!(diagnostics[0].payload.message, "CHECK: dates");
        assert!(diagnostics.iter().all(|d| d.payload.kind.is_writer() && d.revision == doc.revision()));
    }

    #[test]
    fn test_report_stale_after_edit() {
        let mut doc = DocumentModel::with_text("TODO: later");
        let inbox = ResultInbox::new();
        let handle = spawn_writer_analysis(doc.snapshot(), FrequencyOptions::default(), inbox.sender());
        doc.insert_text(0, "x").unwrap();
        handle.join().unwrap();
        assert!(inbox.drain(&doc).is_empty());
    }
}
