use crate::error::{EditorError, Result};
use arboard::Clipboard;

/// Where copy and cut put text and paste reads it from.
pub trait ClipboardProvider {
    fn get_text(&mut self) -> Result<String>;
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The desktop clipboard. The handle is opened on first use so headless
/// sessions only fail when they actually touch the clipboard.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Option<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut Clipboard> {
        if self.handle.is_none() {
            let clipboard = Clipboard::new().map_err(|e| EditorError::Clipboard(e.to_string()))?;
            self.handle = Some(clipboard);
        }
        self.handle
            .as_mut()
            .ok_or_else(|| EditorError::Clipboard("clipboard unavailable".to_string()))
    }
}

impl ClipboardProvider for SystemClipboard {
    fn get_text(&mut self) -> Result<String> {
        self.handle()?.get_text().map_err(|e| EditorError::Clipboard(e.to_string()))
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.handle()?
            .set_text(text.to_string())
            .map_err(|e| EditorError::Clipboard(e.to_string()))
    }
}

/// In-process clipboard for tests and sessions without a display.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    text: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn get_text(&mut self) -> Result<String> {
        self.text
            .clone()
            .ok_or_else(|| EditorError::Clipboard("clipboard is empty".to_string()))
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.text = Some(text.to_string());
        Ok(())
    }
}

/// Normalizes line endings and strips control characters other than tab
/// and newline.
pub fn sanitize_paste_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\r' { '\n' } else { c })
        .filter(|c| *c == '\t' || *c == '\n' || !c.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard() {
        let mut clipboard = MemoryClipboard::new();
        assert!(matches!(clipboard.get_text(), Err(EditorError::Clipboard(_))));
        clipboard.set_text("chapter one").unwrap();
        assert_eq!(clipboard.get_text().unwrap(), "chapter one");
    }

    #[test]
    fn test_sanitize_paste_text() {
        assert_eq!(sanitize_paste_text("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(sanitize_paste_text("tab\there\0\u{7}"), "tab\there");
        assert_eq!(sanitize_paste_text("caf\u{e9}\n"), "caf\u{e9}\n");
    }
}
