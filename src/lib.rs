//! quire - an editing engine for long-form documents
//!
//! The document model (text, formatting, annotations, history) is kept apart
//! from presentation; layout strategies read it through a view model and can
//! be swapped at runtime by the editor controller.

pub mod config;
pub mod controller;
pub mod document_model;
pub mod error;
pub mod logging;
pub mod view;

pub use config::{EditorConfig, RcLoader};
pub use controller::{EditorContext, EditorController};
pub use document_model::DocumentModel;
pub use error::{EditorError, Result};
pub use view::{LayoutEngine, ViewMode};
