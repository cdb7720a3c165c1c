use crate::config::EditorConfig;
use crate::controller::clipboard::{ClipboardProvider, MemoryClipboard, SystemClipboard};
use crate::view::{MonospaceShaper, TextShaper};
use std::rc::Rc;

/// Services an editor needs, built once by the host and handed in.
pub struct EditorContext {
    pub config: EditorConfig,
    pub shaper: Rc<dyn TextShaper>,
    pub clipboard: Box<dyn ClipboardProvider>,
}

impl EditorContext {
    pub fn new(config: EditorConfig, shaper: Rc<dyn TextShaper>, clipboard: Box<dyn ClipboardProvider>) -> Self {
        Self { config, shaper, clipboard }
    }

    /// Monospace shaping and the desktop clipboard.
    pub fn system(config: EditorConfig) -> Self {
        Self::new(config, Rc::new(MonospaceShaper), Box::new(SystemClipboard::new()))
    }

    /// Monospace shaping and an in-memory clipboard.
    pub fn headless(config: EditorConfig) -> Self {
        Self::new(config, Rc::new(MonospaceShaper), Box::new(MemoryClipboard::new()))
    }
}
