/// Document model subsystem - text storage, formatting, annotations and history
///
/// Everything here is independent of presentation. `DocumentModel` is the
/// single mutation entry point; the other modules are its building blocks.

pub mod analysis;
pub mod annotations;
pub mod background;
pub mod command;
pub mod document;
pub mod edit;
pub mod format;
pub mod gap_buffer;
pub mod movement;
pub mod search_state;
pub mod selection;
pub mod state;
pub mod stats;
pub mod undo;

// Re-export main types for convenience
pub use analysis::{
    CloseRepetition, DetectedTag, FrequencyOptions, FrequencyReport, Language, TagKind, WordFrequency,
    WriterReport,
};
pub use annotations::{
    Anchor, AnchorConflict, Annotation, AnnotationId, AnnotationKind, AnnotationStore, Citation,
    Comment, Footnote, IndexEntry, NoteKind,
};
pub use background::{AnalysisResult, Diagnostic, DiagnosticKind, DocumentSnapshot, ResultInbox};
pub use command::{EditCommand, FormatOp};
pub use document::{Composition, DocumentChange, DocumentEvent, DocumentModel, Observer, ObserverId};
pub use edit::TextEdit;
pub use format::{FormatFlag, FormatModel, FormatRun, TextAttributes, VerticalAlign};
pub use gap_buffer::GapBuffer;
pub use search_state::{SearchEngine, SearchMatch, SearchOptions};
pub use selection::{Selection, SelectionEdge};
pub use state::OrphanPolicy;
pub use stats::DocumentStats;
pub use undo::{CommandStack, HistoryEntry, MergeRules, UndoCommand};
