//! Plumbing for work done off the editing thread (spell and grammar checks,
//! writer analysis over large documents). Workers receive an immutable
//! [`DocumentSnapshot`] and send results back through a [`ResultInbox`].

use super::analysis::TagKind;
use super::document::DocumentModel;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

/// Immutable copy of the text at one revision.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub revision: u64,
    pub text: Arc<str>,
}

/// A result covering `[start, end)` of the snapshot it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult<P> {
    pub revision: u64,
    pub start: usize,
    pub end: usize,
    pub payload: P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Spelling,
    Grammar,
    Style,
    /// Same word again within the repetition distance.
    Repetition,
    /// Inline marker such as `TODO:`.
    Tag(TagKind),
}

impl DiagnosticKind {
    /// Produced by the built-in writer analysis rather than a collaborator.
    pub fn is_writer(&self) -> bool {
        matches!(self, DiagnosticKind::Repetition | DiagnosticKind::Tag(_))
    }
}

/// Payload produced by checker collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// Receiving end for background results.
///
/// Senders are cloned out to worker threads; the owner drains on its own
/// thread and only sees results that still describe the current text.
#[derive(Debug)]
pub struct ResultInbox<P> {
    sender: Sender<AnalysisResult<P>>,
    receiver: Receiver<AnalysisResult<P>>,
}

impl<P> ResultInbox<P> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> Sender<AnalysisResult<P>> {
        self.sender.clone()
    }

    /// Takes every queued result, dropping the stale ones. Fresh results are
    /// returned with their range moved to current positions.
    pub fn drain(&self, doc: &DocumentModel) -> Vec<AnalysisResult<P>> {
        let mut fresh = Vec::new();
        let mut dropped = 0usize;
        while let Ok(result) = self.receiver.try_recv() {
            match doc.map_range_since(result.revision, result.start, result.end) {
                Some((start, end)) => fresh.push(AnalysisResult {
                    revision: doc.revision(),
                    start,
                    end,
                    ..result
                }),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, kept = fresh.len(), "stale background results discarded");
        }
        fresh
    }
}

impl<P> Default for ResultInbox<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn diagnostic(message: &str) -> Diagnostic {
        Diagnostic {
            kind: DiagnosticKind::Spelling,
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn test_result_from_worker_thread() {
        let doc = DocumentModel::with_text("teh cat sat");
        let inbox = ResultInbox::new();
        let snapshot = doc.snapshot();
        let sender = inbox.sender();

        thread::spawn(move || {
            let end = snapshot.text.find(' ').unwrap_or(0);
            sender
                .send(AnalysisResult {
                    revision: snapshot.revision,
                    start: 0,
                    end,
                    payload: diagnostic("teh"),
                })
                .unwrap();
        })
        .join()
        .unwrap();

        let results = inbox.drain(&doc);
        assert_eq!(results.len(), 1);
        assert_eq!((results[0].start, results[0].end), (0, 3));
    }

    #[test]
    fn test_edit_inside_range_discards_result() {
        let mut doc = DocumentModel::with_text("teh cat sat");
        let inbox = ResultInbox::new();
        let revision = doc.revision();
        doc.insert_text(1, "x").unwrap();

        inbox
            .sender()
            .send(AnalysisResult { revision, start: 0, end: 3, payload: diagnostic("teh") })
            .unwrap();
        assert!(inbox.drain(&doc).is_empty());
    }

    #[test]
    fn test_edit_elsewhere_moves_result() {
        let mut doc = DocumentModel::with_text("teh cat sat");
        let inbox = ResultInbox::new();
        let revision = doc.revision();
        doc.insert_text(4, "big ").unwrap();
        doc.delete_text(0, 8).unwrap();
        assert_eq!(doc.text(), "cat sat");

        inbox
            .sender()
            .send(AnalysisResult { revision, start: 8, end: 11, payload: diagnostic("sat") })
            .unwrap();
        let results = inbox.drain(&doc);
        assert_eq!(results.len(), 1);
        assert_eq!((results[0].start, results[0].end), (4, 7));
        assert_eq!(results[0].revision, doc.revision());
    }
}
