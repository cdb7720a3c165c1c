use crate::controller::action::{EditorAction, Movement};
use crate::document_model::FormatFlag;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

pub struct KeyHandler;

impl KeyHandler {
    pub fn parse_key(key_event: &KeyEvent) -> Option<EditorAction> {
        if key_event.kind == KeyEventKind::Release {
            return None;
        }
        let key = key_event.code;
        let modifiers = key_event.modifiers;
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        let shift = modifiers.contains(KeyModifiers::SHIFT);

        if ctrl {
            return Self::parse_control_key(key, shift);
        }
        if let Some(movement) = Self::navigation(key) {
            return Some(Self::movement(movement, shift));
        }

        match key {
            KeyCode::Enter => Some(EditorAction::InsertNewline),
            KeyCode::Tab => Some(EditorAction::InsertTab),
            KeyCode::Backspace => Some(EditorAction::Backspace),
            KeyCode::Delete => Some(EditorAction::DeleteForward),
            KeyCode::Esc => Some(EditorAction::ClearSelection),
            KeyCode::F(2) => Some(EditorAction::NextViewMode),
            KeyCode::F(3) if shift => Some(EditorAction::FindPrevious),
            KeyCode::F(3) => Some(EditorAction::FindNext),
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::ALT) => Some(EditorAction::InsertChar(c)),
            _ => None,
        }
    }

    fn parse_control_key(key: KeyCode, shift: bool) -> Option<EditorAction> {
        match key {
            // Control key movements first (more specific)
            KeyCode::Home => Some(Self::movement(Movement::DocumentStart, shift)),
            KeyCode::End => Some(Self::movement(Movement::DocumentEnd, shift)),
            KeyCode::Left => Some(Self::movement(Movement::WordLeft, shift)),
            KeyCode::Right => Some(Self::movement(Movement::WordRight, shift)),

            // Terminals report Ctrl+Shift+Z either as 'Z' or as 'z' with SHIFT
            KeyCode::Char('Z') => Some(EditorAction::Redo),
            KeyCode::Char('z') if shift => Some(EditorAction::Redo),
            KeyCode::Char(c) => match c.to_ascii_lowercase() {
                'z' => Some(EditorAction::Undo),
                'y' => Some(EditorAction::Redo),
                'a' => Some(EditorAction::SelectAll),
                'b' => Some(EditorAction::ToggleFormat(FormatFlag::Bold)),
                'i' => Some(EditorAction::ToggleFormat(FormatFlag::Italic)),
                'u' => Some(EditorAction::ToggleFormat(FormatFlag::Underline)),
                'c' => Some(EditorAction::Copy),
                'x' => Some(EditorAction::Cut),
                'v' => Some(EditorAction::Paste),
                'g' => Some(EditorAction::FindNext),
                '=' | '+' => Some(EditorAction::ZoomIn),
                '-' => Some(EditorAction::ZoomOut),
                'q' => Some(EditorAction::Quit),
                _ => None,
            },
            _ => None,
        }
    }

    fn navigation(key: KeyCode) -> Option<Movement> {
        match key {
            KeyCode::Left => Some(Movement::Left),
            KeyCode::Right => Some(Movement::Right),
            KeyCode::Up => Some(Movement::Up),
            KeyCode::Down => Some(Movement::Down),
            KeyCode::Home => Some(Movement::LineStart),
            KeyCode::End => Some(Movement::LineEnd),
            KeyCode::PageUp => Some(Movement::PageUp),
            KeyCode::PageDown => Some(Movement::PageDown),
            _ => None,
        }
    }

    fn movement(movement: Movement, extend: bool) -> EditorAction {
        if extend {
            EditorAction::extending(movement)
        } else {
            EditorAction::moving(movement)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_typing_keys() {
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(EditorAction::InsertChar('a'))
        );
        // Shifted characters arrive already upper-cased
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(EditorAction::InsertChar('A'))
        );
        assert_eq!(KeyHandler::parse_key(&key(KeyCode::Enter, KeyModifiers::NONE)), Some(EditorAction::InsertNewline));
        assert_eq!(KeyHandler::parse_key(&key(KeyCode::Tab, KeyModifiers::NONE)), Some(EditorAction::InsertTab));
        assert_eq!(KeyHandler::parse_key(&key(KeyCode::Backspace, KeyModifiers::NONE)), Some(EditorAction::Backspace));
        assert_eq!(KeyHandler::parse_key(&key(KeyCode::Delete, KeyModifiers::NONE)), Some(EditorAction::DeleteForward));
    }

    #[test]
    fn test_navigation_and_shift_selection() {
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::Left, KeyModifiers::NONE)),
            Some(EditorAction::moving(Movement::Left))
        );
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::End, KeyModifiers::SHIFT)),
            Some(EditorAction::extending(Movement::LineEnd))
        );
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::Right, KeyModifiers::CONTROL | KeyModifiers::SHIFT)),
            Some(EditorAction::extending(Movement::WordRight))
        );
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::Home, KeyModifiers::CONTROL)),
            Some(EditorAction::moving(Movement::DocumentStart))
        );
        assert_eq!(
            KeyHandler::parse_key(&key(KeyCode::PageDown, KeyModifiers::NONE)),
            Some(EditorAction::moving(Movement::PageDown))
        );
    }

    #[test]
    fn test_control_shortcuts() {
        let ctrl = |c| KeyHandler::parse_key(&key(KeyCode::Char(c), KeyModifiers::CONTROL));
        assert_eq!(ctrl('z'), Some(EditorAction::Undo));
        assert_eq!(ctrl('y'), Some(EditorAction::Redo));
        assert_eq!(ctrl('a'), Some(EditorAction::SelectAll));
        assert_eq!(ctrl('b'), Some(EditorAction::ToggleFormat(FormatFlag::Bold)));
        assert_eq!(ctrl('i'), Some(EditorAction::ToggleFormat(FormatFlag::Italic)));
        assert_eq!(ctrl('u'), Some(EditorAction::ToggleFormat(FormatFlag::Underline)));
        assert_eq!(ctrl('c'), Some(EditorAction::Copy));
        assert_eq!(ctrl('x'), Some(EditorAction::Cut));
        assert_eq!(ctrl('v'), Some(EditorAction::Paste));
        assert_eq!(ctrl('k'), None);

        let shifted = KeyModifiers::CONTROL | KeyModifiers::SHIFT;
        assert_eq!(KeyHandler::parse_key(&key(KeyCode::Char('z'), shifted)), Some(EditorAction::Redo));
        assert_eq!(KeyHandler::parse_key(&key(KeyCode::Char('Z'), shifted)), Some(EditorAction::Redo));
    }

    #[test]
    fn test_release_events_ignored() {
        let mut event = key(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(KeyHandler::parse_key(&event), None);
    }
}
