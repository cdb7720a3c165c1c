/// View Model - Abstracts document data for the layout engines
/// Engines read everything through this trait and never touch the model's
/// storage directly.
use crate::document_model::{Annotation, Composition, DocumentModel, FormatRun, Selection};

/// Read-only view of a document, passed into every layout call.
pub trait ViewModel {
    /// Length in characters.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text in `[start, end)`, clamped to the document.
    fn text_range(&self, start: usize, end: usize) -> String;

    /// Characters from `pos` to the end.
    fn chars_from(&self, pos: usize) -> Box<dyn Iterator<Item = char> + '_>;

    /// Format runs clipped to `[start, end)`.
    fn runs_in(&self, start: usize, end: usize) -> Vec<FormatRun>;

    fn annotations_in(&self, start: usize, end: usize) -> Vec<&Annotation>;

    fn cursor(&self) -> usize;

    fn selection(&self) -> Option<Selection>;

    fn composition(&self) -> Option<&Composition>;

    fn revision(&self) -> u64;
}

/// Concrete implementation that adapts DocumentModel to ViewModel
pub struct DocumentViewModel<'a> {
    document: &'a DocumentModel,
}

impl<'a> DocumentViewModel<'a> {
    pub fn new(document: &'a DocumentModel) -> Self {
        Self { document }
    }
}

impl<'a> ViewModel for DocumentViewModel<'a> {
    fn len(&self) -> usize {
        self.document.len()
    }

    fn text_range(&self, start: usize, end: usize) -> String {
        let len = self.document.len();
        let end = end.min(len);
        let start = start.min(end);
        self.document.text_range(start, end).unwrap_or_default()
    }

    fn chars_from(&self, pos: usize) -> Box<dyn Iterator<Item = char> + '_> {
        Box::new(self.document.chars_from(pos.min(self.document.len())))
    }

    fn runs_in(&self, start: usize, end: usize) -> Vec<FormatRun> {
        self.document.runs_in(start, end)
    }

    fn annotations_in(&self, start: usize, end: usize) -> Vec<&Annotation> {
        self.document.annotations_in(start, end)
    }

    fn cursor(&self) -> usize {
        self.document.cursor()
    }

    fn selection(&self) -> Option<Selection> {
        self.document.selection()
    }

    fn composition(&self) -> Option<&Composition> {
        self.document.composition()
    }

    fn revision(&self) -> u64 {
        self.document.revision()
    }
}
