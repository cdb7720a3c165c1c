//! View subsystem - layout strategies and drawing
//!
//! Everything here reads the document through the [`ViewModel`] trait and
//! draws through the [`Surface`] trait, so strategies can be swapped at
//! runtime without touching document state.

pub mod center_lock;
pub mod continuous;
pub mod engine;
pub mod flow;
pub mod geometry;
pub mod manuscript;
pub mod mode;
pub mod paginated;
pub mod paint;
pub mod renderer;
pub mod shaping;
pub mod surface;
pub mod view_model;

// Re-export public interface
pub use center_lock::{CenterLockLayout, DEFAULT_FOCUS, DEFAULT_SCROLL_DURATION};
pub use continuous::ContinuousLayout;
pub use engine::LayoutEngine;
pub use flow::{FlowLayout, LineBox, PlacedLine};
pub use geometry::{Point, Rect, Size};
pub use manuscript::ManuscriptLayout;
pub use mode::ViewMode;
pub use paginated::{Margins, Page, PageDecoration, PageSetup, PageSize, PaginatedLayout};
pub use paint::PaintOptions;
pub use renderer::{CELL_HEIGHT, CELL_WIDTH, TerminalSurface};
pub use shaping::{FontMetrics, MonospaceShaper, ShapedText, ShapingError, TextShaper};
pub use surface::{Color, DrawOp, RecordingSurface, Surface, TextStyle};
pub use view_model::{DocumentViewModel, ViewModel};
