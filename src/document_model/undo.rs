use crate::error::Result;
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_UNDO_LIMIT: usize = 100;
pub const DEFAULT_MERGE_WINDOW: Duration = Duration::from_millis(1000);
pub const DEFAULT_TYPING_RUN_LIMIT: usize = 256;

/// Limits applied when folding consecutive commands into one history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRules {
    /// Longest pause between two keystrokes that still counts as one run.
    pub window: Duration,
    /// Longest typing run, in characters.
    pub max_len: usize,
}

impl Default for MergeRules {
    fn default() -> Self {
        Self {
            window: DEFAULT_MERGE_WINDOW,
            max_len: DEFAULT_TYPING_RUN_LIMIT,
        }
    }
}

/// Anything the history can hold.
pub trait HistoryEntry: Sized {
    /// Folds `next` into `self` if both form one logical edit. Must be pure.
    fn merge(&self, next: &Self, rules: &MergeRules) -> Option<Self>;

    fn label(&self) -> &'static str;
}

/// A reversible operation against some target `T`.
///
/// Commands carry everything they need to invert themselves; the stack only
/// orders them.
pub trait UndoCommand<T>: HistoryEntry {
    fn execute(&mut self, target: &mut T) -> Result<()>;

    fn undo(&mut self, target: &mut T);
}

/// Bounded undo/redo history.
///
/// Generic over the command type so independent histories (text edits,
/// structural edits owned by a host) can each have their own stack.
#[derive(Debug, Clone)]
pub struct CommandStack<C> {
    undo_stack: VecDeque<C>,
    redo_stack: Vec<C>,
    limit: usize,
    rules: MergeRules,
    merge_sealed: bool,
}

impl<C> CommandStack<C> {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_UNDO_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            rules: MergeRules::default(),
            merge_sealed: true,
        }
    }

    pub fn set_rules(&mut self, rules: MergeRules) {
        self.rules = rules;
    }

    pub fn rules(&self) -> MergeRules {
        self.rules
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        while self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Stops the next command from merging into the current top entry.
    pub fn seal(&mut self) {
        self.merge_sealed = true;
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.merge_sealed = true;
    }

    pub fn peek_undo(&self) -> Option<&C> {
        self.undo_stack.back()
    }

    fn push_bounded(&mut self, command: C) {
        self.undo_stack.push_back(command);
        if self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
            tracing::debug!(limit = self.limit, "undo history full, oldest entry dropped");
        }
    }
}

impl<C> Default for CommandStack<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandStack<C> {
    /// Runs `command` against `target` and records it.
    pub fn execute<T>(&mut self, mut command: C, target: &mut T) -> Result<()>
    where
        C: UndoCommand<T>,
    {
        command.execute(target)?;
        self.push(command);
        Ok(())
    }

    /// Records an already executed command, merging where allowed.
    pub fn push(&mut self, command: C)
    where
        C: HistoryEntry,
    {
        self.redo_stack.clear();
        if !self.merge_sealed {
            if let Some(top) = self.undo_stack.back() {
                if let Some(merged) = top.merge(&command, &self.rules) {
                    if let Some(slot) = self.undo_stack.back_mut() {
                        *slot = merged;
                    }
                    return;
                }
            }
        }
        tracing::trace!(label = command.label(), "command recorded");
        self.push_bounded(command);
        self.merge_sealed = false;
    }

    /// Reverts the newest entry. Returns false when there is nothing to undo.
    pub fn undo<T>(&mut self, target: &mut T) -> bool
    where
        C: UndoCommand<T>,
    {
        let Some(mut command) = self.undo_stack.pop_back() else {
            return false;
        };
        command.undo(target);
        tracing::debug!(label = command.label(), "undo");
        self.redo_stack.push(command);
        self.merge_sealed = true;
        true
    }

    /// Re-applies the most recently undone entry.
    pub fn redo<T>(&mut self, target: &mut T) -> Result<bool>
    where
        C: UndoCommand<T>,
    {
        let Some(mut command) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = command.execute(target) {
            self.redo_stack.push(command);
            return Err(err);
        }
        tracing::debug!(label = command.label(), "redo");
        self.push_bounded(command);
        self.merge_sealed = true;
        Ok(true)
    }
}
