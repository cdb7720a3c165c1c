/// Controller subsystem - Handles all user input and command execution
///
/// Key events are parsed into [`EditorAction`]s by the key handler and
/// executed by the [`EditorController`], which owns the document and the
/// active layout strategy.

pub mod action;
pub mod caret;
pub mod clipboard;
pub mod context;
pub mod editor;
pub mod key_handler;
pub mod pointer;

// Re-export public interface
pub use action::{EditorAction, Movement};
pub use caret::CaretBlink;
pub use clipboard::{ClipboardProvider, MemoryClipboard, SystemClipboard};
pub use context::EditorContext;
pub use editor::{EditorController, Transition};
pub use key_handler::KeyHandler;
pub use pointer::{PointerState, PointerTracker};
