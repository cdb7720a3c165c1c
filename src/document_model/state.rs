use super::annotations::{AnchorConflict, Anchor, Annotation, AnnotationId, AnnotationStore};
use super::edit::TextEdit;
use super::format::{FormatModel, FormatRun};
use super::gap_buffer::GapBuffer;
use super::selection::Selection;
use crate::error::{EditorError, Result};

/// What to do with an annotation whose whole anchored range was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Re-anchor to the paragraph around the deletion point.
    #[default]
    RetargetParagraph,
    /// Drop the annotation.
    Delete,
    /// Keep it as a zero-length range at the deletion point.
    KeepCollapsed,
    /// Leave it collapsed and let the caller decide.
    Ask,
}

impl OrphanPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "retarget" | "paragraph" => Some(OrphanPolicy::RetargetParagraph),
            "delete" => Some(OrphanPolicy::Delete),
            "keep" | "collapse" => Some(OrphanPolicy::KeepCollapsed),
            "ask" => Some(OrphanPolicy::Ask),
            _ => None,
        }
    }
}

/// Everything a deletion needs to put back on undo.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedSpan {
    pub text: String,
    pub runs: Vec<FormatRun>,
    /// Every anchor as it was before the deletion.
    pub anchors: Vec<(AnnotationId, Anchor)>,
    /// Annotations dropped by the orphan policy.
    pub dropped: Vec<Annotation>,
}

/// The mutable state edit commands operate on.
///
/// Kept apart from the history so a command can borrow it mutably while the
/// command stack is borrowed too.
#[derive(Debug, Clone)]
pub struct DocumentState {
    pub(crate) text: GapBuffer,
    pub(crate) formats: FormatModel,
    pub(crate) annotations: AnnotationStore,
    pub(crate) cursor: usize,
    pub(crate) selection: Option<Selection>,
    pub(crate) orphan_policy: OrphanPolicy,
    pub(crate) pending_conflicts: Vec<AnchorConflict>,
    /// Primitive edits applied since the owner last drained them.
    pub(crate) edits: Vec<TextEdit>,
    /// Formatting ranges touched since the owner last drained them.
    pub(crate) format_changes: Vec<(usize, usize)>,
    pub(crate) annotations_touched: bool,
}

impl DocumentState {
    pub fn new(text: &str) -> Self {
        Self {
            text: GapBuffer::from_text(text),
            formats: FormatModel::new(),
            annotations: AnnotationStore::new(),
            cursor: 0,
            selection: None,
            orphan_policy: OrphanPolicy::default(),
            pending_conflicts: Vec::new(),
            edits: Vec::new(),
            format_changes: Vec::new(),
            annotations_touched: false,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn check_position(&self, pos: usize) -> Result<()> {
        if pos > self.text.len() {
            return Err(EditorError::out_of_range("position", pos, self.text.len()));
        }
        Ok(())
    }

    pub fn check_range(&self, start: usize, len: usize) -> Result<()> {
        match start.checked_add(len) {
            Some(end) if end <= self.text.len() => Ok(()),
            _ => Err(EditorError::InvalidArgument(format!(
                "range {start}+{len} out of range (length {})",
                self.text.len()
            ))),
        }
    }

    /// `[start, end)` of the paragraph containing `pos`, excluding the newline.
    pub fn paragraph_bounds(&self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.text.len());
        let start = pos - self.text.chars_before(pos).take_while(|c| *c != '\n').count();
        let end = pos + self.text.chars_from(pos).take_while(|c| *c != '\n').count();
        (start, end)
    }

    /// Inserts text and moves formats and anchors along with it.
    pub(crate) fn insert_raw(&mut self, pos: usize, text: &str) -> Result<usize> {
        self.text.insert(pos, text)?;
        let len = text.chars().count();
        if len == 0 {
            return Ok(0);
        }
        let edit = TextEdit::insertion(pos, len);
        self.formats.on_insert(pos, len);
        let changes = self.annotations.adjust(&edit);
        if !changes.is_empty() {
            self.annotations_touched = true;
            self.annotations.renumber_footnotes();
        }
        self.pending_conflicts = self
            .pending_conflicts
            .iter()
            .map(|c| AnchorConflict { collapsed_at: edit.map_point(c.collapsed_at), ..*c })
            .collect();
        self.edits.push(edit);
        Ok(len)
    }

    /// Deletes text, capturing everything needed to restore it.
    pub(crate) fn delete_raw(&mut self, start: usize, len: usize) -> Result<DeletedSpan> {
        self.check_range(start, len)?;
        let runs = self.formats.runs_in(start, start + len);
        let anchors = self.annotations.anchors();
        let text = self.text.delete(start, len)?;
        let mut span = DeletedSpan { text, runs, anchors, dropped: Vec::new() };
        if len == 0 {
            return Ok(span);
        }

        let edit = TextEdit::deletion(start, len);
        self.formats.on_delete(start, len);
        let changes = self.annotations.adjust(&edit);
        if !changes.is_empty() {
            self.annotations_touched = true;
        }
        self.pending_conflicts.retain(|c| self.annotations.get(c.id).is_ok());
        for conflict in changes.conflicts {
            self.resolve_orphan(conflict, &mut span.dropped);
        }
        self.annotations.renumber_footnotes();
        self.edits.push(edit);
        Ok(span)
    }

    /// Puts a deleted span back exactly as it was.
    pub(crate) fn restore_deleted(&mut self, start: usize, span: &DeletedSpan) -> Result<()> {
        self.insert_raw(start, &span.text)?;
        let end = start + span.text.chars().count();
        self.formats.restore_range(start, end, &span.runs);
        if !span.runs.is_empty() || end > start {
            self.format_changes.push((start, end));
        }
        for annotation in &span.dropped {
            self.annotations.restore(annotation.clone());
        }
        for (id, anchor) in &span.anchors {
            // The host may have removed the annotation since.
            if let Err(err) = self.annotations.set_anchor(*id, *anchor) {
                tracing::debug!(%id, %err, "anchor not restored");
            }
        }
        let restored: Vec<AnnotationId> = span.anchors.iter().map(|(id, _)| *id).collect();
        self.pending_conflicts.retain(|c| !restored.contains(&c.id));
        self.annotations.renumber_footnotes();
        self.annotations_touched = true;
        Ok(())
    }

    fn resolve_orphan(&mut self, conflict: AnchorConflict, dropped: &mut Vec<Annotation>) {
        match self.orphan_policy {
            OrphanPolicy::RetargetParagraph => {
                let (start, end) = self.paragraph_bounds(conflict.collapsed_at);
                match self.annotations.set_anchor(conflict.id, Anchor::range(start, end)) {
                    Ok(()) => tracing::debug!(id = %conflict.id, start, end, "orphaned anchor moved to paragraph"),
                    Err(err) => tracing::warn!(id = %conflict.id, %err, "orphaned anchor not retargeted"),
                }
            }
            OrphanPolicy::Delete => {
                if let Ok(annotation) = self.annotations.remove(conflict.id) {
                    tracing::debug!(id = %conflict.id, "orphaned annotation deleted");
                    dropped.push(annotation);
                }
            }
            OrphanPolicy::KeepCollapsed => {}
            OrphanPolicy::Ask => {
                tracing::debug!(id = %conflict.id, "orphaned anchor awaiting decision");
                self.pending_conflicts.push(conflict);
            }
        }
    }

    pub(crate) fn set_cursor_raw(&mut self, pos: usize, selection: Option<Selection>) {
        self.cursor = pos.min(self.text.len());
        self.selection = selection;
    }
}
