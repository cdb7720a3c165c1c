use crate::document_model::FormatFlag;

/// Caret movements. Horizontal ones work on text offsets, vertical ones and
/// line ends go through the active layout's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Left,
    Right,
    Up,
    Down,
    WordLeft,
    WordRight,
    LineStart,
    LineEnd,
    DocumentStart,
    DocumentEnd,
    PageUp,
    PageDown,
}

impl Movement {
    /// Movements that keep the remembered horizontal position.
    pub fn is_vertical(&self) -> bool {
        matches!(self, Movement::Up | Movement::Down | Movement::PageUp | Movement::PageDown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    InsertChar(char),
    InsertNewline,
    InsertTab,
    Backspace,
    DeleteForward,
    Move { movement: Movement, extend: bool },
    SelectAll,
    ClearSelection,
    Undo,
    Redo,
    ToggleFormat(FormatFlag),
    Copy,
    Cut,
    Paste,
    FindNext,
    FindPrevious,
    NextViewMode,
    ZoomIn,
    ZoomOut,
    Quit,
}

impl EditorAction {
    pub fn moving(movement: Movement) -> Self {
        EditorAction::Move { movement, extend: false }
    }

    pub fn extending(movement: Movement) -> Self {
        EditorAction::Move { movement, extend: true }
    }

    /// Whether the action changes the text.
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            EditorAction::InsertChar(_)
                | EditorAction::InsertNewline
                | EditorAction::InsertTab
                | EditorAction::Backspace
                | EditorAction::DeleteForward
                | EditorAction::Undo
                | EditorAction::Redo
                | EditorAction::ToggleFormat(_)
                | EditorAction::Cut
                | EditorAction::Paste
        )
    }
}
