/// Configuration subsystem - Editor settings and preferences
///
/// This module loads `.quirerc` files into an [`EditorConfig`], the one
/// place the history, view and caret settings are read from.

pub mod rc;

// Re-export public interface
pub use rc::{EditorConfig, RC_FILE_NAME, RcLoader};
