use super::annotations::{
    Anchor, AnchorConflict, Annotation, AnnotationId, AnnotationKind, Citation, Comment, Footnote,
    IndexEntry, NoteKind,
};
use super::background::DocumentSnapshot;
use super::command::{EditCommand, FormatOp};
use super::edit::TextEdit;
use super::format::{FormatFlag, FormatRun, TextAttributes};
use super::selection::{Selection, SelectionEdge};
use super::state::{DocumentState, OrphanPolicy};
use super::stats::DocumentStats;
use super::undo::{CommandStack, HistoryEntry, MergeRules};
use crate::error::{EditorError, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// How many changes the model remembers for stale-result detection.
pub const EDIT_LOG_LIMIT: usize = 256;

pub type ObserverId = usize;
pub type Observer = Box<dyn FnMut(&DocumentEvent)>;

/// Notifications fired after the model is consistent again.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    TextChanged(TextEdit),
    FormattingChanged { start: usize, end: usize },
    CursorMoved { position: usize },
    SelectionChanged { selection: Option<Selection> },
    AnnotationsChanged,
    AnchorConflict(AnchorConflict),
    CompositionChanged,
    StatsUpdated(DocumentStats),
    HistoryCleared,
}

/// A logged change, in the coordinates of the text just before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentChange {
    Text(TextEdit),
    Format { start: usize, end: usize },
}

/// Provisional IME text shown at `position` but not yet in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub position: usize,
    pub text: String,
}

/// The document: text, formatting, annotations, caret and history.
///
/// Every mutation goes through this type so that undo, revision tracking and
/// observers stay in step.
pub struct DocumentModel {
    pub(super) state: DocumentState,
    history: CommandStack<EditCommand>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: ObserverId,
    revision: u64,
    edit_log: VecDeque<(u64, DocumentChange)>,
    /// Oldest revision the log can still map forward from.
    log_floor: u64,
    composition: Option<Composition>,
    stats_revision: Option<u64>,
}

impl fmt::Debug for DocumentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentModel")
            .field("len", &self.len())
            .field("cursor", &self.state.cursor)
            .field("selection", &self.state.selection)
            .field("revision", &self.revision)
            .field("undo", &self.history.undo_len())
            .field("redo", &self.history.redo_len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for DocumentModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentModel {
    pub fn new() -> Self {
        Self::with_text("")
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            state: DocumentState::new(text),
            history: CommandStack::new(),
            observers: Vec::new(),
            next_observer: 0,
            revision: 0,
            edit_log: VecDeque::new(),
            log_floor: 0,
            composition: None,
            stats_revision: None,
        }
    }

    pub fn set_history_limit(&mut self, limit: usize) {
        self.history.set_limit(limit);
    }

    pub fn set_merge_rules(&mut self, rules: MergeRules) {
        self.history.set_rules(rules);
    }

    // ---- queries -------------------------------------------------------

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.len() == 0
    }

    pub fn text(&self) -> String {
        self.state.text.text()
    }

    pub fn text_range(&self, start: usize, end: usize) -> Result<String> {
        if start > end {
            return Err(EditorError::InvalidArgument(format!("range {start}..{end} is reversed")));
        }
        self.state.text.read(start, end - start)
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.state.text.char_at(pos)
    }

    pub fn chars_from(&self, pos: usize) -> impl Iterator<Item = char> + '_ {
        self.state.text.chars_from(pos)
    }

    pub fn format_at(&self, pos: usize) -> TextAttributes {
        self.state.formats.format_at(pos)
    }

    pub fn format_runs(&self) -> &[FormatRun] {
        self.state.formats.runs()
    }

    pub fn runs_in(&self, start: usize, end: usize) -> Vec<FormatRun> {
        self.state.formats.runs_in(start, end)
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn selection(&self) -> Option<Selection> {
        self.state.selection
    }

    pub fn selected_text(&self) -> Option<String> {
        let selection = self.state.selection?;
        self.state.text.read(selection.start, selection.len()).ok()
    }

    /// Bumped on every text or format change, including undo and redo.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn paragraph_bounds(&self, pos: usize) -> (usize, usize) {
        self.state.paragraph_bounds(pos)
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats::from_chars(self.state.text.chars_from(0))
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            revision: self.revision,
            text: Arc::from(self.text()),
        }
    }

    pub fn composition(&self) -> Option<&Composition> {
        self.composition.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.history.peek_undo().map(|c| c.label())
    }

    // ---- text mutation -------------------------------------------------

    pub fn insert_text(&mut self, pos: usize, text: &str) -> Result<()> {
        self.state.check_position(pos)?;
        if text.is_empty() {
            return Ok(());
        }
        self.history.seal();
        let command = EditCommand::insert(&self.state, pos, text, Instant::now());
        self.run(command)
    }

    pub fn delete_text(&mut self, start: usize, len: usize) -> Result<()> {
        self.state.check_range(start, len)?;
        if len == 0 {
            return Ok(());
        }
        self.history.seal();
        let command = EditCommand::delete(&self.state, start, len);
        self.run(command)
    }

    /// Replaces `len` characters at `start` as a single undo step.
    pub fn replace_text(&mut self, start: usize, len: usize, text: &str) -> Result<()> {
        self.replace_ranges(vec![(start, len, text.to_string())], "Replace")
    }

    /// Replaces several non-overlapping ranges as a single undo step.
    pub fn replace_ranges(&mut self, mut edits: Vec<(usize, usize, String)>, label: &'static str) -> Result<()> {
        edits.sort_by(|a, b| b.0.cmp(&a.0));
        let mut limit = self.len();
        for (start, len, _) in &edits {
            self.state.check_range(*start, *len)?;
            if start + len > limit {
                return Err(EditorError::InvalidArgument(format!(
                    "replacement at {start}+{len} overlaps another"
                )));
            }
            limit = *start;
        }

        // Later ranges first, so earlier offsets stay valid.
        let now = Instant::now();
        let mut commands = Vec::new();
        for (start, len, text) in &edits {
            if *len > 0 {
                commands.push(EditCommand::delete(&self.state, *start, *len));
            }
            if !text.is_empty() {
                commands.push(EditCommand::insert(&self.state, *start, text, now));
            }
        }
        if commands.is_empty() {
            return Ok(());
        }
        self.history.seal();
        let command = if commands.len() == 1 {
            commands.remove(0)
        } else {
            EditCommand::Batch { label, commands }
        };
        self.run(command)?;
        self.history.seal();
        Ok(())
    }

    /// Inserts at the caret, replacing the selection if there is one.
    pub fn insert_at_cursor(&mut self, text: &str) -> Result<()> {
        match self.state.selection {
            Some(selection) => self.replace_text(selection.start, selection.len(), text),
            None => self.insert_text(self.state.cursor, text),
        }
    }

    /// Inserts one typed character. Consecutive keystrokes merge into one
    /// undo step.
    pub fn type_char(&mut self, ch: char, now: Instant) -> Result<()> {
        if let Some(selection) = self.state.selection {
            return self.replace_text(selection.start, selection.len(), &ch.to_string());
        }
        let command = EditCommand::keystroke(&self.state, self.state.cursor, ch, now);
        self.run(command)
    }

    pub fn delete_selection(&mut self) -> Result<bool> {
        let Some(selection) = self.state.selection else {
            return Ok(false);
        };
        self.delete_text(selection.start, selection.len())?;
        Ok(true)
    }

    /// Deletes the selection or the character before the caret.
    pub fn backspace(&mut self) -> Result<bool> {
        if self.delete_selection()? {
            return Ok(true);
        }
        let cursor = self.state.cursor;
        if cursor == 0 {
            return Ok(false);
        }
        self.delete_text(cursor - 1, 1)?;
        Ok(true)
    }

    /// Deletes the selection or the character after the caret.
    pub fn delete_forward(&mut self) -> Result<bool> {
        if self.delete_selection()? {
            return Ok(true);
        }
        let cursor = self.state.cursor;
        if cursor >= self.len() {
            return Ok(false);
        }
        self.delete_text(cursor, 1)?;
        Ok(true)
    }

    /// Replaces the whole content. Formatting, annotations and history are
    /// dropped.
    pub fn load_text(&mut self, text: &str) {
        let removed = self.len();
        let policy = self.state.orphan_policy;
        self.state = DocumentState::new(text);
        self.state.orphan_policy = policy;
        self.history.clear();
        self.composition = None;
        self.revision += 1;
        self.edit_log.clear();
        self.log_floor = self.revision;
        self.stats_revision = None;
        tracing::info!(chars = self.len(), "document loaded");

        let edit = TextEdit { start: 0, removed, inserted: self.len() };
        self.notify(&DocumentEvent::TextChanged(edit));
        self.notify(&DocumentEvent::AnnotationsChanged);
        self.notify(&DocumentEvent::CursorMoved { position: 0 });
        self.notify(&DocumentEvent::HistoryCleared);
    }

    // ---- formatting ----------------------------------------------------

    pub fn apply_format(&mut self, start: usize, end: usize, attrs: TextAttributes) -> Result<()> {
        self.format_range(start, end, FormatOp::Apply(attrs))
    }

    pub fn remove_format(&mut self, start: usize, end: usize, attrs: TextAttributes) -> Result<()> {
        self.format_range(start, end, FormatOp::Remove(attrs))
    }

    pub fn clear_format(&mut self, start: usize, end: usize) -> Result<()> {
        self.format_range(start, end, FormatOp::Clear)
    }

    /// Removes `flag` if the whole range has it, otherwise applies it.
    pub fn toggle_format(&mut self, start: usize, end: usize, flag: FormatFlag) -> Result<()> {
        let (start, end) = self.clamp_range(start, end);
        let attrs = TextAttributes::from_flag(flag);
        if self.state.formats.range_has(start, end, flag) {
            self.remove_format(start, end, attrs)
        } else {
            self.apply_format(start, end, attrs)
        }
    }

    fn format_range(&mut self, start: usize, end: usize, op: FormatOp) -> Result<()> {
        let (start, end) = self.clamp_range(start, end);
        if start == end {
            return Ok(());
        }
        self.history.seal();
        let command = EditCommand::format(&self.state, start, end, op);
        self.run(command)?;
        self.history.seal();
        Ok(())
    }

    fn clamp_range(&self, start: usize, end: usize) -> (usize, usize) {
        let end = end.min(self.len());
        (start.min(end), end)
    }

    // ---- caret ---------------------------------------------------------

    pub fn set_cursor(&mut self, pos: usize) -> Result<()> {
        self.state.check_position(pos)?;
        self.move_caret(pos, None);
        Ok(())
    }

    /// Moves the caret while keeping the selection anchor where it was.
    pub fn extend_selection_to(&mut self, pos: usize) -> Result<()> {
        self.state.check_position(pos)?;
        let anchor = self.state.selection.map_or(self.state.cursor, |s| s.anchor());
        self.move_caret(pos, Selection::from_anchor(anchor, pos));
        Ok(())
    }

    pub fn set_selection(&mut self, start: usize, end: usize, active: SelectionEdge) -> Result<()> {
        if start > end {
            return Err(EditorError::InvalidArgument(format!("selection {start}..{end} is reversed")));
        }
        self.state.check_position(end)?;
        if start == end {
            self.move_caret(start, None);
            return Ok(());
        }
        let selection = Selection { start, end, active };
        self.move_caret(selection.caret(), Some(selection));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.move_caret(self.state.cursor, None);
    }

    pub fn select_all(&mut self) {
        let len = self.len();
        self.move_caret(len, Selection::from_anchor(0, len));
    }

    /// Ends the current typing run; the next keystroke starts a new undo step.
    pub fn seal_typing_run(&mut self) {
        self.history.seal();
    }

    fn move_caret(&mut self, pos: usize, selection: Option<Selection>) {
        let before = (self.state.cursor, self.state.selection);
        if before == (pos, selection) {
            return;
        }
        self.history.seal();
        self.state.set_cursor_raw(pos, selection);
        self.notify_caret(before.0, before.1);
    }

    // ---- history -------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let before = (self.state.cursor, self.state.selection);
        let known = self.pending_ids();
        self.composition = None;
        if !self.history.undo(&mut self.state) {
            return false;
        }
        self.publish(before, &known);
        true
    }

    pub fn redo(&mut self) -> bool {
        let before = (self.state.cursor, self.state.selection);
        let known = self.pending_ids();
        self.composition = None;
        match self.history.redo(&mut self.state) {
            Ok(true) => {
                self.publish(before, &known);
                true
            }
            Ok(false) => false,
            Err(err) => {
                tracing::warn!(%err, "redo failed");
                self.publish(before, &known);
                false
            }
        }
    }

    pub fn clear_undo_history(&mut self) {
        self.history.clear();
        self.notify(&DocumentEvent::HistoryCleared);
    }

    fn run(&mut self, command: EditCommand) -> Result<()> {
        let before = (self.state.cursor, self.state.selection);
        let known = self.pending_ids();
        let result = self.history.execute(command, &mut self.state);
        // A failed batch rolls itself back but may still have touched state.
        self.publish(before, &known);
        result
    }

    fn pending_ids(&self) -> Vec<AnnotationId> {
        self.state.pending_conflicts.iter().map(|c| c.id).collect()
    }

    /// Drains what the last command did and tells everyone about it.
    fn publish(&mut self, before: (usize, Option<Selection>), known_conflicts: &[AnnotationId]) {
        let edits = std::mem::take(&mut self.state.edits);
        let format_changes = std::mem::take(&mut self.state.format_changes);
        let annotations_touched = std::mem::replace(&mut self.state.annotations_touched, false);

        if !edits.is_empty() || !format_changes.is_empty() {
            self.revision += 1;
        }
        for edit in &edits {
            self.log(DocumentChange::Text(*edit));
            if let Some(composition) = &mut self.composition {
                composition.position = edit.map_point(composition.position);
            }
        }
        for (start, end) in &format_changes {
            self.log(DocumentChange::Format { start: *start, end: *end });
        }
        if !edits.is_empty() {
            tracing::trace!(revision = self.revision, edits = edits.len(), len = self.len(), "text changed");
        }

        for edit in edits {
            self.notify(&DocumentEvent::TextChanged(edit));
        }
        for (start, end) in format_changes {
            self.notify(&DocumentEvent::FormattingChanged { start, end });
        }
        if annotations_touched {
            self.notify(&DocumentEvent::AnnotationsChanged);
        }
        let conflicts: Vec<AnchorConflict> = self
            .state
            .pending_conflicts
            .iter()
            .filter(|c| !known_conflicts.contains(&c.id))
            .copied()
            .collect();
        for conflict in conflicts {
            self.notify(&DocumentEvent::AnchorConflict(conflict));
        }
        self.notify_caret(before.0, before.1);
    }

    fn log(&mut self, change: DocumentChange) {
        self.edit_log.push_back((self.revision, change));
        while self.edit_log.len() > EDIT_LOG_LIMIT {
            if let Some((revision, _)) = self.edit_log.pop_front() {
                self.log_floor = revision;
            }
        }
    }

    /// Changes made after `revision`, oldest first. `None` when the log no
    /// longer reaches back that far.
    pub fn changes_since(&self, revision: u64) -> Option<Vec<DocumentChange>> {
        if revision < self.log_floor || revision > self.revision {
            return None;
        }
        Some(
            self.edit_log
                .iter()
                .filter(|(logged, _)| *logged > revision)
                .map(|(_, change)| *change)
                .collect(),
        )
    }

    /// Moves `[start, end)` from `revision` coordinates to current ones.
    /// `None` when any later text edit touched the range.
    pub fn map_range_since(&self, revision: u64, start: usize, end: usize) -> Option<(usize, usize)> {
        let changes = self.changes_since(revision)?;
        let (mut start, mut end) = (start, end);
        for change in changes {
            if let DocumentChange::Text(edit) = change {
                if edit.touches(start, end) {
                    return None;
                }
                start = edit.map_point(start);
                end = edit.map_range_end(end).max(start);
            }
        }
        (end <= self.len()).then_some((start, end))
    }

    // ---- annotations ---------------------------------------------------

    pub fn add_comment(&mut self, start: usize, end: usize, comment: Comment) -> Result<AnnotationId> {
        if start >= end {
            return Err(EditorError::InvalidArgument(format!("comment range {start}..{end} is empty")));
        }
        self.state.check_position(end)?;
        Ok(self.add_annotation(Anchor::range(start, end), AnnotationKind::Comment(comment)))
    }

    pub fn add_footnote(&mut self, pos: usize, kind: NoteKind, content: &str) -> Result<AnnotationId> {
        self.state.check_position(pos)?;
        let note = Footnote { kind, number: 0, content: content.to_string() };
        Ok(self.add_annotation(Anchor::Point(pos), AnnotationKind::Footnote(note)))
    }

    pub fn add_citation(&mut self, pos: usize, key: &str, locator: Option<&str>) -> Result<AnnotationId> {
        self.state.check_position(pos)?;
        let citation = Citation {
            key: key.to_string(),
            locator: locator.map(str::to_string),
        };
        Ok(self.add_annotation(Anchor::Point(pos), AnnotationKind::Citation(citation)))
    }

    pub fn add_index_entry(&mut self, anchor: Anchor, term: &str, subterm: Option<&str>) -> Result<AnnotationId> {
        self.state.check_position(anchor.end())?;
        let entry = IndexEntry {
            term: term.to_string(),
            subterm: subterm.map(str::to_string),
        };
        Ok(self.add_annotation(anchor, AnnotationKind::IndexEntry(entry)))
    }

    fn add_annotation(&mut self, anchor: Anchor, kind: AnnotationKind) -> AnnotationId {
        let name = kind.name();
        let id = self.state.annotations.insert(anchor, kind);
        self.state.annotations.renumber_footnotes();
        tracing::debug!(%id, kind = name, start = anchor.start(), end = anchor.end(), "annotation added");
        self.notify(&DocumentEvent::AnnotationsChanged);
        id
    }

    pub fn update_comment_text(&mut self, id: AnnotationId, text: &str) -> Result<()> {
        self.with_comment(id, |comment| comment.text = text.to_string())
    }

    pub fn set_comment_resolved(&mut self, id: AnnotationId, resolved: bool) -> Result<()> {
        self.with_comment(id, |comment| comment.resolved = resolved)
    }

    fn with_comment(&mut self, id: AnnotationId, update: impl FnOnce(&mut Comment)) -> Result<()> {
        match self.state.annotations.kind_mut(id)? {
            AnnotationKind::Comment(comment) => update(comment),
            other => {
                return Err(EditorError::InvalidArgument(format!("{id} is a {}, not a comment", other.name())));
            }
        }
        self.notify(&DocumentEvent::AnnotationsChanged);
        Ok(())
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> Result<Annotation> {
        let removed = self.state.annotations.remove(id)?;
        self.state.pending_conflicts.retain(|c| c.id != id);
        self.state.annotations.renumber_footnotes();
        tracing::debug!(%id, "annotation removed");
        self.notify(&DocumentEvent::AnnotationsChanged);
        Ok(removed)
    }

    pub fn annotation(&self, id: AnnotationId) -> Result<&Annotation> {
        self.state.annotations.get(id)
    }

    /// All annotations, ordered by anchor start.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.state.annotations.iter()
    }

    pub fn annotations_in(&self, start: usize, end: usize) -> Vec<&Annotation> {
        self.state.annotations.in_range(start, end)
    }

    pub fn comments(&self) -> Vec<&Annotation> {
        self.state.annotations.comments()
    }

    pub fn footnotes(&self, kind: NoteKind) -> Vec<&Annotation> {
        self.state.annotations.footnotes(kind)
    }

    pub fn orphan_policy(&self) -> OrphanPolicy {
        self.state.orphan_policy
    }

    pub fn set_orphan_policy(&mut self, policy: OrphanPolicy) {
        self.state.orphan_policy = policy;
    }

    pub fn pending_conflicts(&self) -> &[AnchorConflict] {
        &self.state.pending_conflicts
    }

    /// Settles a conflict left open by [`OrphanPolicy::Ask`].
    pub fn resolve_anchor_conflict(&mut self, id: AnnotationId, resolution: OrphanPolicy) -> Result<()> {
        let Some(index) = self.state.pending_conflicts.iter().position(|c| c.id == id) else {
            return Err(EditorError::NotFound(id));
        };
        let conflict = self.state.pending_conflicts[index];
        match resolution {
            OrphanPolicy::RetargetParagraph => {
                let (start, end) = self.state.paragraph_bounds(conflict.collapsed_at);
                self.state.annotations.set_anchor(id, Anchor::range(start, end))?;
            }
            OrphanPolicy::Delete => {
                self.state.annotations.remove(id)?;
                self.state.annotations.renumber_footnotes();
            }
            OrphanPolicy::KeepCollapsed => {}
            OrphanPolicy::Ask => {
                return Err(EditorError::InvalidArgument("a conflict cannot be resolved by asking again".into()));
            }
        }
        self.state.pending_conflicts.remove(index);
        tracing::debug!(%id, ?resolution, "anchor conflict resolved");
        self.notify(&DocumentEvent::AnnotationsChanged);
        Ok(())
    }

    // ---- IME -----------------------------------------------------------

    /// Shows provisional input at the caret without touching the text.
    pub fn set_composition(&mut self, text: &str) {
        if text.is_empty() {
            self.cancel_composition();
            return;
        }
        let position = match &self.composition {
            Some(composition) => composition.position,
            None => self.state.selection.map_or(self.state.cursor, |s| s.start),
        };
        self.composition = Some(Composition { position, text: text.to_string() });
        self.notify(&DocumentEvent::CompositionChanged);
    }

    /// Replaces the preedit with final text through the undoable path.
    pub fn commit_composition(&mut self, text: &str) -> Result<()> {
        if self.composition.take().is_some() {
            self.notify(&DocumentEvent::CompositionChanged);
        }
        self.insert_at_cursor(text)
    }

    pub fn cancel_composition(&mut self) {
        if self.composition.take().is_some() {
            self.notify(&DocumentEvent::CompositionChanged);
        }
    }

    // ---- observers -----------------------------------------------------

    pub fn subscribe(&mut self, observer: Observer) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    /// Whether the text changed since stats were last published.
    pub fn stats_stale(&self) -> bool {
        self.stats_revision != Some(self.revision)
    }

    /// Recounts and fires [`DocumentEvent::StatsUpdated`].
    pub fn publish_stats(&mut self) -> DocumentStats {
        let stats = self.stats();
        self.stats_revision = Some(self.revision);
        self.notify(&DocumentEvent::StatsUpdated(stats));
        stats
    }

    fn notify_caret(&mut self, cursor: usize, selection: Option<Selection>) {
        if self.state.selection != selection {
            let selection = self.state.selection;
            self.notify(&DocumentEvent::SelectionChanged { selection });
        }
        if self.state.cursor != cursor {
            let position = self.state.cursor;
            self.notify(&DocumentEvent::CursorMoved { position });
        }
    }

    fn notify(&mut self, event: &DocumentEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime};

    fn recorder(doc: &mut DocumentModel) -> Rc<RefCell<Vec<DocumentEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        doc.subscribe(Box::new(move |event| sink.borrow_mut().push(event.clone())));
        events
    }

    fn comment(text: &str) -> Comment {
        Comment {
            text: text.into(),
            author: "editor".into(),
            created_at: SystemTime::UNIX_EPOCH,
            resolved: false,
        }
    }

    #[test]
    fn test_insert_delete_round_trip() {
        let mut doc = DocumentModel::with_text("Hello World");
        doc.insert_text(5, ", brave new").unwrap();
        assert_eq!(doc.text(), "Hello, brave new World");
        doc.delete_text(5, 11).unwrap();
        assert_eq!(doc.text(), "Hello World");
    }

    #[test]
    fn test_hello_there_world_undo() {
        let mut doc = DocumentModel::with_text("Hello World");
        doc.set_cursor(6).unwrap();
        doc.insert_text(6, "there ").unwrap();
        assert_eq!(doc.text(), "Hello there World");
        assert_eq!(doc.cursor(), 12);

        assert!(doc.undo());
        assert_eq!(doc.text(), "Hello World");
        assert_eq!(doc.cursor(), 6);

        assert!(doc.redo());
        assert_eq!(doc.text(), "Hello there World");
        assert_eq!(doc.cursor(), 12);
    }

    #[test]
    fn test_out_of_range_fails_fast() {
        let mut doc = DocumentModel::with_text("abc");
        assert!(matches!(doc.insert_text(4, "x"), Err(EditorError::InvalidArgument(_))));
        assert!(matches!(doc.delete_text(2, 2), Err(EditorError::InvalidArgument(_))));
        assert!(doc.set_cursor(9).is_err());
        assert_eq!(doc.text(), "abc");
        assert_eq!(doc.revision(), 0);
    }

    #[test]
    fn test_empty_history_is_a_noop() {
        let mut doc = DocumentModel::with_text("abc");
        assert!(!doc.undo());
        assert!(!doc.redo());
        assert_eq!(doc.text(), "abc");
    }

    #[test]
    fn test_typing_merges_until_caret_moves() {
        let mut doc = DocumentModel::new();
        let t0 = Instant::now();
        for (i, ch) in "cat".chars().enumerate() {
            doc.type_char(ch, t0 + Duration::from_millis(100 * i as u64)).unwrap();
        }
        doc.set_cursor(0).unwrap();
        doc.type_char('A', t0 + Duration::from_millis(400)).unwrap();
        assert_eq!(doc.text(), "Acat");

        assert!(doc.undo());
        assert_eq!(doc.text(), "cat");
        assert!(doc.undo());
        assert_eq!(doc.text(), "");
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_typing_pause_starts_new_run() {
        let mut doc = DocumentModel::new();
        let t0 = Instant::now();
        doc.type_char('a', t0).unwrap();
        doc.type_char('b', t0 + Duration::from_secs(3)).unwrap();
        doc.undo();
        assert_eq!(doc.text(), "a");
    }

    #[test]
    fn test_typing_replaces_selection() {
        let mut doc = DocumentModel::with_text("Hello World");
        doc.set_selection(6, 11, SelectionEdge::End).unwrap();
        doc.type_char('Y', Instant::now()).unwrap();
        assert_eq!(doc.text(), "Hello Y");
        assert_eq!(doc.selection(), None);
        doc.undo();
        assert_eq!(doc.text(), "Hello World");
        assert_eq!(doc.selection().map(|s| (s.start, s.end)), Some((6, 11)));
    }

    #[test]
    fn test_backspace_and_delete_forward() {
        let mut doc = DocumentModel::with_text("abc");
        doc.set_cursor(0).unwrap();
        assert!(!doc.backspace().unwrap());
        assert!(doc.delete_forward().unwrap());
        assert_eq!(doc.text(), "bc");
        doc.set_cursor(2).unwrap();
        assert!(!doc.delete_forward().unwrap());
        assert!(doc.backspace().unwrap());
        assert_eq!(doc.text(), "b");
    }

    #[test]
    fn test_format_clamps_and_toggles() {
        let mut doc = DocumentModel::with_text("Hello World");
        doc.apply_format(6, 99, TextAttributes::bold()).unwrap();
        assert_eq!(doc.format_runs(), &[FormatRun::new(6, 11, TextAttributes::bold())]);

        let revision = doc.revision();
        doc.apply_format(4, 4, TextAttributes::italic()).unwrap();
        assert_eq!(doc.revision(), revision);

        doc.toggle_format(6, 11, FormatFlag::Bold).unwrap();
        assert!(doc.format_runs().is_empty());
        doc.toggle_format(0, 8, FormatFlag::Bold).unwrap();
        assert!(doc.format_at(7).bold);
        assert!(doc.undo());
        assert!(!doc.format_at(7).bold);
    }

    #[test]
    fn test_history_limit() {
        let mut doc = DocumentModel::new();
        doc.set_history_limit(3);
        for i in 0..5 {
            doc.insert_text(doc.len(), &i.to_string()).unwrap();
        }
        let mut undone = 0;
        while doc.undo() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert_eq!(doc.text(), "01");
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut doc = DocumentModel::with_text("abc");
        let events = recorder(&mut doc);
        doc.insert_text(1, "X").unwrap();
        let seen = events.borrow().clone();
        assert_eq!(
            seen,
            vec![
                DocumentEvent::TextChanged(TextEdit::insertion(1, 1)),
                DocumentEvent::CursorMoved { position: 2 },
            ]
        );
    }

    #[test]
    fn test_unsubscribe_stops_events() {
        let mut doc = DocumentModel::with_text("abc");
        let events = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&events);
        let id = doc.subscribe(Box::new(move |_| *sink.borrow_mut() += 1));
        doc.insert_text(0, "x").unwrap();
        let count = *events.borrow();
        assert!(doc.unsubscribe(id));
        doc.insert_text(0, "y").unwrap();
        assert_eq!(*events.borrow(), count);
    }

    #[test]
    fn test_anchor_shift_and_restore_on_undo() {
        let mut doc = DocumentModel::with_text("The quick brown fox");
        let id = doc.add_comment(10, 15, comment("colour?")).unwrap();
        doc.insert_text(0, "So, ").unwrap();
        assert_eq!(doc.annotation(id).unwrap().anchor, Anchor::range(14, 19));
        doc.delete_text(8, 8).unwrap();
        assert_eq!(doc.annotation(id).unwrap().anchor, Anchor::range(8, 11));
        doc.undo();
        doc.undo();
        assert_eq!(doc.annotation(id).unwrap().anchor, Anchor::range(10, 15));
    }

    #[test]
    fn test_footnotes_renumber_per_kind() {
        let mut doc = DocumentModel::with_text("a b c d e");
        let late = doc.add_footnote(8, NoteKind::Footnote, "late").unwrap();
        let end = doc.add_footnote(4, NoteKind::Endnote, "end").unwrap();
        let early = doc.add_footnote(2, NoteKind::Footnote, "early").unwrap();

        let number = |doc: &DocumentModel, id| doc.annotation(id).unwrap().as_footnote().unwrap().number;
        assert_eq!(number(&doc, early), 1);
        assert_eq!(number(&doc, late), 2);
        assert_eq!(number(&doc, end), 1);

        doc.remove_annotation(early).unwrap();
        assert_eq!(number(&doc, late), 1);
    }

    #[test]
    fn test_unknown_annotation_is_not_found() {
        let mut doc = DocumentModel::with_text("abc");
        let id = doc.add_citation(1, "smith2020", Some("p. 4")).unwrap();
        doc.remove_annotation(id).unwrap();
        assert!(matches!(doc.remove_annotation(id), Err(EditorError::NotFound(_))));
        assert!(matches!(doc.update_comment_text(id, "x"), Err(EditorError::NotFound(_))));
    }

    #[test]
    fn test_ask_policy_reports_conflict() {
        let mut doc = DocumentModel::with_text("Keep this. Drop this part. Keep.");
        doc.set_orphan_policy(OrphanPolicy::Ask);
        let id = doc.add_comment(16, 20, comment("hmm")).unwrap();
        let events = recorder(&mut doc);

        doc.delete_text(11, 16).unwrap();
        assert!(events.borrow().iter().any(|e| matches!(e, DocumentEvent::AnchorConflict(c) if c.id == id)));
        assert_eq!(doc.pending_conflicts().len(), 1);

        doc.resolve_anchor_conflict(id, OrphanPolicy::Delete).unwrap();
        assert!(doc.pending_conflicts().is_empty());
        assert!(doc.annotation(id).is_err());
    }

    #[test]
    fn test_replace_ranges_single_undo() {
        let mut doc = DocumentModel::with_text("a-b-c");
        doc.replace_ranges(vec![(1, 1, "+".into()), (3, 1, "+".into())], "Replace All").unwrap();
        assert_eq!(doc.text(), "a+b+c");
        assert!(doc.undo());
        assert_eq!(doc.text(), "a-b-c");
        assert!(doc.replace_ranges(vec![(0, 3, "x".into()), (2, 2, "y".into())], "Replace All").is_err());
    }

    #[test]
    fn test_composition_commits_through_history() {
        let mut doc = DocumentModel::with_text("ab");
        doc.set_cursor(1).unwrap();
        doc.set_composition("ka");
        assert_eq!(doc.composition().map(|c| c.position), Some(1));
        assert_eq!(doc.text(), "ab");
        doc.commit_composition("か").unwrap();
        assert!(doc.composition().is_none());
        assert_eq!(doc.text(), "aかb");
        doc.undo();
        assert_eq!(doc.text(), "ab");
    }

    #[test]
    fn test_load_text_resets() {
        let mut doc = DocumentModel::with_text("old");
        doc.apply_format(0, 3, TextAttributes::bold()).unwrap();
        let revision = doc.revision();
        doc.load_text("new text");
        assert_eq!(doc.text(), "new text");
        assert!(doc.format_runs().is_empty());
        assert!(!doc.can_undo());
        assert!(doc.revision() > revision);
        assert!(doc.changes_since(revision).is_none());
    }

    #[test]
    fn test_stats_publication() {
        let mut doc = DocumentModel::with_text("one two three");
        let events = recorder(&mut doc);
        assert!(doc.stats_stale());
        let stats = doc.publish_stats();
        assert_eq!(stats.words, 3);
        assert!(!doc.stats_stale());
        assert!(matches!(events.borrow().last(), Some(DocumentEvent::StatsUpdated(_))));
    }
}
