use super::format::{FormatRun, TextAttributes};
use super::selection::Selection;
use super::state::{DeletedSpan, DocumentState};
use super::undo::{HistoryEntry, MergeRules, UndoCommand};
use crate::error::Result;
use std::time::Instant;

/// Caret and selection as they were before a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretState {
    pub cursor: usize,
    pub selection: Option<Selection>,
}

impl CaretState {
    pub fn capture(state: &DocumentState) -> Self {
        Self {
            cursor: state.cursor,
            selection: state.selection,
        }
    }

    fn restore(&self, state: &mut DocumentState) {
        state.set_cursor_raw(self.cursor, self.selection);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOp {
    Apply(TextAttributes),
    Remove(TextAttributes),
    Clear,
}

/// Every undoable document edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    InsertText {
        pos: usize,
        text: String,
        /// Created by a single keystroke; only these form typing runs.
        typed: bool,
        issued_at: Instant,
        before: CaretState,
    },
    DeleteText {
        start: usize,
        len: usize,
        /// Filled in on execute.
        deleted: Option<DeletedSpan>,
        before: CaretState,
    },
    ApplyFormat {
        start: usize,
        end: usize,
        op: FormatOp,
        /// Runs inside the range before the change, filled in on execute.
        previous: Vec<FormatRun>,
        before: CaretState,
    },
    Batch {
        label: &'static str,
        commands: Vec<EditCommand>,
    },
}

impl EditCommand {
    pub fn insert(state: &DocumentState, pos: usize, text: &str, issued_at: Instant) -> Self {
        EditCommand::InsertText {
            pos,
            text: text.to_string(),
            typed: false,
            issued_at,
            before: CaretState::capture(state),
        }
    }

    /// A single keystroke, eligible for typing-run merging.
    pub fn keystroke(state: &DocumentState, pos: usize, ch: char, issued_at: Instant) -> Self {
        EditCommand::InsertText {
            pos,
            text: ch.to_string(),
            typed: true,
            issued_at,
            before: CaretState::capture(state),
        }
    }

    pub fn delete(state: &DocumentState, start: usize, len: usize) -> Self {
        EditCommand::DeleteText {
            start,
            len,
            deleted: None,
            before: CaretState::capture(state),
        }
    }

    pub fn format(state: &DocumentState, start: usize, end: usize, op: FormatOp) -> Self {
        EditCommand::ApplyFormat {
            start,
            end,
            op,
            previous: Vec::new(),
            before: CaretState::capture(state),
        }
    }

    fn caret_before(&self) -> Option<CaretState> {
        match self {
            EditCommand::InsertText { before, .. }
            | EditCommand::DeleteText { before, .. }
            | EditCommand::ApplyFormat { before, .. } => Some(*before),
            EditCommand::Batch { commands, .. } => commands.first().and_then(|c| c.caret_before()),
        }
    }
}

impl UndoCommand<DocumentState> for EditCommand {
    fn execute(&mut self, state: &mut DocumentState) -> Result<()> {
        match self {
            EditCommand::InsertText { pos, text, .. } => {
                let len = state.insert_raw(*pos, text)?;
                state.set_cursor_raw(*pos + len, None);
            }
            EditCommand::DeleteText { start, len, deleted, .. } => {
                let span = state.delete_raw(*start, *len)?;
                *deleted = Some(span);
                state.set_cursor_raw(*start, None);
            }
            EditCommand::ApplyFormat { start, end, op, previous, .. } => {
                let doc_len = state.len();
                *previous = state.formats.runs_in(*start, *end);
                match op {
                    FormatOp::Apply(attrs) => state.formats.apply_format(*start, *end, *attrs, doc_len),
                    FormatOp::Remove(attrs) => state.formats.remove_format(*start, *end, *attrs, doc_len),
                    FormatOp::Clear => state.formats.clear_format(*start, *end, doc_len),
                }
                state.format_changes.push((*start, *end));
            }
            EditCommand::Batch { commands, .. } => {
                for done in 0..commands.len() {
                    if let Err(err) = commands[done].execute(state) {
                        // Leave the document as it was before the batch.
                        for executed in commands[..done].iter_mut().rev() {
                            executed.undo(state);
                        }
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    fn undo(&mut self, state: &mut DocumentState) {
        match self {
            EditCommand::InsertText { pos, text, before, .. } => {
                let len = text.chars().count();
                if let Err(err) = state.delete_raw(*pos, len) {
                    tracing::warn!(%err, "undo of insert failed");
                }
                before.restore(state);
            }
            EditCommand::DeleteText { start, deleted, before, .. } => {
                if let Some(span) = deleted.take() {
                    if let Err(err) = state.restore_deleted(*start, &span) {
                        tracing::warn!(%err, "undo of delete failed");
                    }
                }
                before.restore(state);
            }
            EditCommand::ApplyFormat { start, end, previous, before, .. } => {
                state.formats.restore_range(*start, *end, previous);
                state.format_changes.push((*start, *end));
                before.restore(state);
            }
            EditCommand::Batch { commands, .. } => {
                for command in commands.iter_mut().rev() {
                    command.undo(state);
                }
            }
        }
    }
}

impl HistoryEntry for EditCommand {
    /// Consecutive keystrokes at contiguous positions fold into one typing run.
    fn merge(&self, next: &Self, rules: &MergeRules) -> Option<Self> {
        let (
            EditCommand::InsertText { pos, text, typed: true, issued_at, before },
            EditCommand::InsertText {
                pos: next_pos,
                text: next_text,
                typed: true,
                issued_at: next_at,
                ..
            },
        ) = (self, next)
        else {
            return None;
        };

        let len = text.chars().count();
        if next_text.chars().count() != 1 || text.contains('\n') || next_text.contains('\n') {
            return None;
        }
        if *next_pos != pos + len || len + 1 > rules.max_len {
            return None;
        }
        if next_at.saturating_duration_since(*issued_at) > rules.window {
            return None;
        }

        Some(EditCommand::InsertText {
            pos: *pos,
            text: format!("{text}{next_text}"),
            typed: true,
            issued_at: *next_at,
            before: *before,
        })
    }

    fn label(&self) -> &'static str {
        match self {
            EditCommand::InsertText { typed: true, .. } => "Typing",
            EditCommand::InsertText { .. } => "Insert Text",
            EditCommand::DeleteText { .. } => "Delete Text",
            EditCommand::ApplyFormat { op: FormatOp::Apply(_), .. } => "Apply Format",
            EditCommand::ApplyFormat { op: FormatOp::Remove(_), .. } => "Remove Format",
            EditCommand::ApplyFormat { op: FormatOp::Clear, .. } => "Clear Format",
            EditCommand::Batch { label, .. } => *label,
        }
    }
}

impl EditCommand {
    /// Cursor position the command restores on undo.
    pub fn cursor_before(&self) -> Option<usize> {
        self.caret_before().map(|c| c.cursor)
    }
}
