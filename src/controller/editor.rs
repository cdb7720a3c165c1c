use crate::config::EditorConfig;
use crate::controller::action::{EditorAction, Movement};
use crate::controller::caret::CaretBlink;
use crate::controller::clipboard::sanitize_paste_text;
use crate::controller::context::EditorContext;
use crate::controller::key_handler::KeyHandler;
use crate::controller::pointer::PointerTracker;
use crate::document_model::analysis::spawn_writer_analysis;
use crate::document_model::{
    AnalysisResult, Diagnostic, DocumentChange, DocumentModel, DocumentStats, ResultInbox, SearchEngine,
    SearchMatch, SearchOptions, Selection, SelectionEdge, TextEdit, WriterReport,
};
use crate::error::Result;
use crate::view::{
    CELL_HEIGHT, CELL_WIDTH, CenterLockLayout, Color, ContinuousLayout, DocumentViewModel, LayoutEngine,
    ManuscriptLayout, PaginatedLayout, Rect, Size, Surface, TerminalSurface, TextStyle, ViewMode, ViewModel,
};
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture, Event, KeyEvent,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use std::io::stdout;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Poll timeout of the interactive loop; also the animation frame period.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// Lines scrolled per mouse wheel notch.
const SCROLL_LINES: f32 = 3.0;
const ZOOM_STEP: f32 = 1.1;
const CARET_WIDTH: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Quit,
}

/// Caret and selection before an action, to tell what it changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CaretState {
    cursor: usize,
    selection: Option<Selection>,
    revision: u64,
}

/// Owns one document and the active layout strategy, and turns input into
/// document operations.
pub struct EditorController {
    document: DocumentModel,
    layout: Box<dyn LayoutEngine>,
    context: EditorContext,
    search: SearchEngine,
    pointer: PointerTracker,
    caret: CaretBlink,
    analysis: ResultInbox<Diagnostic>,
    diagnostics: Vec<AnalysisResult<Diagnostic>>,
    writer: ResultInbox<WriterReport>,
    writer_report: Option<WriterReport>,
    /// Revision the last writer analysis was started for.
    analyzed_revision: Option<u64>,
    /// Revision the layout caches reflect.
    synced_revision: u64,
    /// Horizontal caret position kept across vertical moves.
    preferred_x: Option<f32>,
    /// Time of the last edit whose typing run is still open.
    last_edit: Option<Instant>,
    stats: DocumentStats,
    title: Option<String>,
    status_message: String,
}

impl EditorController {
    pub fn new(mut document: DocumentModel, context: EditorContext, viewport: Size) -> Self {
        let config = &context.config;
        document.set_history_limit(config.undo_levels);
        document.set_merge_rules(config.merge_rules());
        document.set_orphan_policy(config.orphan_policy);
        let stats = document.publish_stats();

        let now = Instant::now();
        let caret = CaretBlink::new(config.blink_interval, config.blink_resume, now);
        let layout = build_layout(config.view_mode, &context, viewport, None);
        let mut controller = Self {
            synced_revision: document.revision(),
            document,
            layout,
            context,
            search: SearchEngine::new(),
            pointer: PointerTracker::new(),
            caret,
            analysis: ResultInbox::new(),
            diagnostics: Vec::new(),
            writer: ResultInbox::new(),
            writer_report: None,
            analyzed_revision: None,
            preferred_x: None,
            last_edit: None,
            stats,
            title: None,
            status_message: String::new(),
        };
        controller.relayout();
        tracing::info!(mode = %controller.view_mode(), chars = controller.document.len(), "editor ready");
        controller
    }

    pub fn document(&self) -> &DocumentModel {
        &self.document
    }

    /// Direct access for host operations without a key binding. The layout
    /// catches up on the next controller call.
    pub fn document_mut(&mut self) -> &mut DocumentModel {
        &mut self.document
    }

    pub fn config(&self) -> &EditorConfig {
        &self.context.config
    }

    pub fn view_mode(&self) -> ViewMode {
        self.layout.kind()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Shown in running heads and the status line.
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
        self.set_view_mode(self.view_mode());
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn caret_visible(&self) -> bool {
        self.caret.is_visible()
    }

    /// Counts as of the last idle publish.
    pub fn stats(&self) -> DocumentStats {
        self.stats
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    /// Where background checkers send their results. Clone the sender out
    /// to worker threads.
    pub fn analysis_inbox(&self) -> &ResultInbox<Diagnostic> {
        &self.analysis
    }

    /// Background results that still match the current text.
    pub fn diagnostics(&self) -> &[AnalysisResult<Diagnostic>] {
        &self.diagnostics
    }

    /// Word frequency and tags of the latest analysed revision.
    pub fn writer_report(&self) -> Option<&WriterReport> {
        self.writer_report.as_ref()
    }

    /// Runs `f` against the up-to-date layout.
    pub fn with_layout<R>(&mut self, f: impl FnOnce(&mut dyn LayoutEngine, &dyn ViewModel) -> R) -> R {
        self.sync_layout();
        let view = DocumentViewModel::new(&self.document);
        f(self.layout.as_mut(), &view)
    }

    /// Swaps the layout strategy. Text, caret and selection are untouched.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        let viewport = self.layout.viewport_size();
        self.context.config.zoom = self.layout.zoom();
        self.layout = build_layout(mode, &self.context, viewport, self.title.as_deref());
        self.context.config.view_mode = mode;
        self.relayout();
        tracing::info!(%mode, "view mode changed");
    }

    /// Rebuilds the layout caches from scratch and scrolls to the caret.
    fn relayout(&mut self) {
        let view = DocumentViewModel::new(&self.document);
        self.layout.initialize(&view);
        self.layout.ensure_visible(&view, self.document.cursor());
        self.synced_revision = self.document.revision();
    }

    /// Feeds everything logged since the last sync to the layout as a single
    /// edit, or starts over when the log no longer reaches back.
    fn sync_layout(&mut self) {
        let revision = self.document.revision();
        if revision == self.synced_revision {
            return;
        }
        let view = DocumentViewModel::new(&self.document);
        match self.document.changes_since(self.synced_revision) {
            Some(changes) => {
                if let Some(folded) = fold_changes(&changes) {
                    match folded {
                        FoldedChange::Text(edit) => self.layout.on_edit(&view, &edit),
                        FoldedChange::Format { start, end } => self.layout.on_format_change(&view, start, end),
                    }
                }
            }
            None => {
                tracing::debug!(from = self.synced_revision, to = revision, "edit log exhausted, full relayout");
                self.layout.initialize(&view);
            }
        }
        self.synced_revision = revision;
    }

    // ---- input ---------------------------------------------------------

    pub fn handle_key(&mut self, key_event: &KeyEvent, now: Instant) -> Transition {
        let Some(action) = KeyHandler::parse_key(key_event) else {
            return Transition::Stay;
        };
        if action == EditorAction::Quit {
            return Transition::Quit;
        }
        self.status_message.clear();
        if let Err(err) = self.execute(action, now) {
            tracing::warn!(%err, "action failed");
            self.status_message = format!("Error: {err}");
        }
        Transition::Stay
    }

    pub fn execute(&mut self, action: EditorAction, now: Instant) -> Result<()> {
        self.sync_layout();
        let before = self.caret_state();
        let keep_x = matches!(action, EditorAction::Move { movement, .. } if movement.is_vertical());

        match action {
            EditorAction::InsertChar(c) => self.document.type_char(c, now)?,
            EditorAction::InsertNewline => self.document.type_char('\n', now)?,
            EditorAction::InsertTab => self.document.type_char('\t', now)?,
            EditorAction::Backspace => {
                self.document.backspace()?;
            }
            EditorAction::DeleteForward => {
                self.document.delete_forward()?;
            }
            EditorAction::Move { movement, extend } => self.move_caret(movement, extend)?,
            EditorAction::SelectAll => self.document.select_all(),
            EditorAction::ClearSelection => {
                self.document.clear_selection();
                self.search.clear();
            }
            EditorAction::Undo => {
                if !self.document.undo() {
                    self.status_message = "Already at oldest change".to_string();
                }
            }
            EditorAction::Redo => {
                if !self.document.redo() {
                    self.status_message = "Already at newest change".to_string();
                }
            }
            EditorAction::ToggleFormat(flag) => match self.document.selection() {
                Some(selection) => self.document.toggle_format(selection.start, selection.end, flag)?,
                None => self.status_message = "Select text to format".to_string(),
            },
            EditorAction::Copy => {
                self.copy();
            }
            EditorAction::Cut => {
                self.cut()?;
            }
            EditorAction::Paste => {
                self.paste()?;
            }
            EditorAction::FindNext => {
                self.find_next()?;
            }
            EditorAction::FindPrevious => {
                self.find_previous()?;
            }
            EditorAction::NextViewMode => self.set_view_mode(self.view_mode().next()),
            EditorAction::ZoomIn => self.zoom_by(ZOOM_STEP),
            EditorAction::ZoomOut => self.zoom_by(1.0 / ZOOM_STEP),
            EditorAction::Quit => {}
        }

        if !keep_x {
            self.preferred_x = None;
        }
        self.after_change(before, now);
        Ok(())
    }

    fn caret_state(&self) -> CaretState {
        CaretState {
            cursor: self.document.cursor(),
            selection: self.document.selection(),
            revision: self.document.revision(),
        }
    }

    /// Brings the layout up to date and follows the caret if it moved.
    fn after_change(&mut self, before: CaretState, now: Instant) {
        self.sync_layout();
        let after = self.caret_state();
        if after.revision != before.revision {
            self.last_edit = Some(now);
        }
        if after != before {
            self.caret.reset(now);
            let view = DocumentViewModel::new(&self.document);
            self.layout.on_cursor_moved(&view, after.cursor, now);
        }
    }

    fn move_caret(&mut self, movement: Movement, extend: bool) -> Result<()> {
        if !extend {
            if let Some(selection) = self.document.selection() {
                match movement {
                    Movement::Left => return self.document.set_cursor(selection.start),
                    Movement::Right => return self.document.set_cursor(selection.end),
                    _ => {}
                }
            }
        }
        let target = self.movement_target(movement, self.document.cursor());
        if extend {
            self.document.extend_selection_to(target)
        } else {
            self.document.set_cursor(target)
        }
    }

    fn movement_target(&mut self, movement: Movement, pos: usize) -> usize {
        let view = DocumentViewModel::new(&self.document);
        let screen = self.layout.lines_per_screen().max(1) as isize;
        let lines = match movement {
            Movement::Left => return pos.saturating_sub(1),
            Movement::Right => return (pos + 1).min(self.document.len()),
            Movement::WordLeft => return self.document.previous_word_boundary(pos),
            Movement::WordRight => return self.document.next_word_boundary(pos),
            Movement::LineStart => return self.layout.line_bounds(&view, pos).0,
            Movement::LineEnd => return self.layout.line_bounds(&view, pos).1,
            Movement::DocumentStart => return 0,
            Movement::DocumentEnd => return self.document.len(),
            Movement::Up => -1,
            Movement::Down => 1,
            Movement::PageUp => -screen,
            Movement::PageDown => screen,
        };
        let x = match self.preferred_x {
            Some(x) => x,
            None => {
                let x = self.layout.cursor_rect(&view, pos).x;
                self.preferred_x = Some(x);
                x
            }
        };
        self.layout.move_vertically(&view, pos, lines, x)
    }

    fn zoom_by(&mut self, factor: f32) {
        let zoom = self.layout.zoom() * factor;
        self.layout.set_zoom(zoom);
        self.context.config.zoom = self.layout.zoom();
        let view = DocumentViewModel::new(&self.document);
        self.layout.ensure_visible(&view, self.document.cursor());
        self.status_message = format!("Zoom {:.0}%", self.layout.zoom() * 100.0);
    }

    pub fn handle_mouse(&mut self, mouse: &MouseEvent, now: Instant) {
        let point = TerminalSurface::pixel_of(mouse.column, mouse.row);
        let shift = mouse.modifiers.contains(KeyModifiers::SHIFT);
        let line_height = self.context.config.metrics().line_height;
        let result = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.pointer_down(point.x, point.y, shift, now),
            MouseEventKind::Drag(MouseButton::Left) => self.pointer_drag(point.x, point.y, now),
            MouseEventKind::Up(MouseButton::Left) => {
                self.pointer_up();
                Ok(())
            }
            MouseEventKind::ScrollDown => {
                self.scroll(SCROLL_LINES * line_height);
                Ok(())
            }
            MouseEventKind::ScrollUp => {
                self.scroll(-SCROLL_LINES * line_height);
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "pointer action failed");
        }
    }

    /// Primary button down at viewport point `(x, y)`.
    pub fn pointer_down(&mut self, x: f32, y: f32, shift: bool, now: Instant) -> Result<()> {
        self.sync_layout();
        let before = self.caret_state();
        let pos = self.hit_test(x, y);
        self.pointer.press(&mut self.document, pos, shift, now)?;
        self.preferred_x = None;
        self.after_change(before, now);
        Ok(())
    }

    pub fn pointer_drag(&mut self, x: f32, y: f32, now: Instant) -> Result<()> {
        self.sync_layout();
        let before = self.caret_state();
        let pos = self.hit_test(x, y);
        self.pointer.drag(&mut self.document, pos)?;
        self.after_change(before, now);
        Ok(())
    }

    pub fn pointer_up(&mut self) {
        self.pointer.release();
    }

    fn hit_test(&mut self, x: f32, y: f32) -> usize {
        let view = DocumentViewModel::new(&self.document);
        self.layout.hit_test(&view, x, y)
    }

    pub fn scroll(&mut self, delta_y: f32) {
        self.layout.on_scroll(delta_y);
    }

    pub fn resize(&mut self, viewport: Size) {
        self.layout.on_resize(viewport);
        tracing::debug!(width = viewport.width, height = viewport.height, "viewport resized");
    }

    /// Time-driven work: seals idle typing runs, publishes stats, blinks the
    /// caret, takes in background results and advances animations. Returns
    /// true when the view needs repainting.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.sync_layout();
        let mut repaint = false;

        if let Some(at) = self.last_edit {
            if now.saturating_duration_since(at) >= self.context.config.merge_window {
                self.document.seal_typing_run();
                self.last_edit = None;
                if self.document.stats_stale() {
                    self.stats = self.document.publish_stats();
                    repaint = true;
                }
            }
        }

        if self.last_edit.is_none() {
            self.start_writer_analysis();
        }

        repaint |= self.caret.tick(now);
        repaint |= self.drain_analysis();
        repaint |= self.drain_writer_report();
        repaint |= self.layout.tick(now);
        repaint
    }

    fn drain_analysis(&mut self) -> bool {
        let document = &self.document;
        let revision = document.revision();
        let before = self.diagnostics.len();
        self.diagnostics.retain_mut(|result| {
            if result.revision == revision {
                return true;
            }
            match document.map_range_since(result.revision, result.start, result.end) {
                Some((start, end)) => {
                    result.start = start;
                    result.end = end;
                    result.revision = revision;
                    true
                }
                None => false,
            }
        });
        let changed = self.diagnostics.len() != before;
        let fresh = self.analysis.drain(document);
        if fresh.is_empty() {
            return changed;
        }
        tracing::debug!(count = fresh.len(), "background results received");
        self.diagnostics.extend(fresh);
        true
    }

    /// Starts a background writer analysis once per idle revision.
    fn start_writer_analysis(&mut self) {
        let revision = self.document.revision();
        if !self.context.config.analysis || self.analyzed_revision == Some(revision) {
            return;
        }
        self.analyzed_revision = Some(revision);
        tracing::debug!(revision, "writer analysis started");
        spawn_writer_analysis(self.document.snapshot(), self.context.config.frequency_options(), self.writer.sender());
    }

    /// Takes in a finished writer report if it still matches the document.
    /// Its tags and repetitions replace the previous ones in the diagnostics.
    fn drain_writer_report(&mut self) -> bool {
        let revision = self.document.revision();
        let Some(report) = self
            .writer
            .drain(&self.document)
            .into_iter()
            .map(|result| result.payload)
            .filter(|report| report.revision == revision)
            .next_back()
        else {
            return false;
        };
        tracing::debug!(
            revision,
            words = report.frequency.total_words,
            tags = report.tags.len(),
            "writer analysis received"
        );
        self.diagnostics.retain(|result| !result.payload.kind.is_writer());
        self.diagnostics.extend(report.diagnostics());
        self.writer_report = Some(report);
        true
    }

    // ---- search --------------------------------------------------------

    /// Sets the search pattern and selects the first match at or after the
    /// caret.
    pub fn find(&mut self, query: &str, options: SearchOptions) -> Result<Option<SearchMatch>> {
        self.search.set_pattern(query, options)?;
        let from = self.document.selection().map_or(self.document.cursor(), |s| s.start);
        let found = self.search.find_next(&self.document, from);
        self.show_match(found.as_ref())?;
        Ok(found)
    }

    pub fn find_next(&mut self) -> Result<Option<SearchMatch>> {
        let from = self.document.selection().map_or(self.document.cursor(), |s| s.end);
        let found = self.search.find_next(&self.document, from);
        self.show_match(found.as_ref())?;
        Ok(found)
    }

    pub fn find_previous(&mut self) -> Result<Option<SearchMatch>> {
        let from = self.document.selection().map_or(self.document.cursor(), |s| s.start);
        let found = self.search.find_previous(&self.document, from);
        self.show_match(found.as_ref())?;
        Ok(found)
    }

    /// Replaces the current match and selects the next one. Returns false
    /// when there was nothing to replace.
    pub fn replace_current(&mut self, replacement: &str) -> Result<bool> {
        let Some((_, end)) = self.search.replace_current(&mut self.document, replacement)? else {
            return Ok(false);
        };
        match self.search.current().cloned() {
            Some(next) => self.show_match(Some(&next))?,
            None => {
                let before = self.caret_state();
                self.document.set_cursor(end)?;
                self.after_change(before, Instant::now());
            }
        }
        Ok(true)
    }

    pub fn replace_all(&mut self, replacement: &str) -> Result<usize> {
        let before = self.caret_state();
        let count = self.search.replace_all(&mut self.document, replacement)?;
        self.status_message = format!("{count} replaced");
        self.after_change(before, Instant::now());
        Ok(count)
    }

    fn show_match(&mut self, found: Option<&SearchMatch>) -> Result<()> {
        let Some(found) = found else {
            if self.search.is_active() {
                self.status_message = format!("Pattern not found: {}", self.search.pattern());
            }
            return Ok(());
        };
        let before = self.caret_state();
        self.document.set_selection(found.start, found.end, SelectionEdge::End)?;
        self.after_change(before, Instant::now());
        Ok(())
    }

    // ---- clipboard -----------------------------------------------------

    /// Copies the selection. Returns false when nothing was copied.
    pub fn copy(&mut self) -> bool {
        let Some(text) = self.document.selected_text() else {
            return false;
        };
        match self.context.clipboard.set_text(&text) {
            Ok(()) => {
                self.status_message = format!("{} characters copied", text.chars().count());
                true
            }
            Err(err) => {
                tracing::warn!(%err, "copy failed");
                self.status_message = format!("Error: {err}");
                false
            }
        }
    }

    /// The selection is only removed once it is on the clipboard.
    pub fn cut(&mut self) -> Result<bool> {
        if !self.copy() {
            return Ok(false);
        }
        self.document.delete_selection()
    }

    pub fn paste(&mut self) -> Result<bool> {
        let text = match self.context.clipboard.get_text() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, "paste failed");
                self.status_message = format!("Error: {err}");
                return Ok(false);
            }
        };
        self.insert_pasted(&text)
    }

    /// Bracketed paste from the terminal.
    pub fn paste_text(&mut self, text: &str, now: Instant) -> Result<bool> {
        self.sync_layout();
        let before = self.caret_state();
        let pasted = self.insert_pasted(text)?;
        self.after_change(before, now);
        Ok(pasted)
    }

    fn insert_pasted(&mut self, text: &str) -> Result<bool> {
        let text = sanitize_paste_text(text);
        if text.is_empty() {
            self.status_message = "Nothing to paste".to_string();
            return Ok(false);
        }
        self.document.seal_typing_run();
        self.document.insert_at_cursor(&text)?;
        Ok(true)
    }

    // ---- drawing -------------------------------------------------------

    /// Draws the visible part of the document and the caret.
    pub fn render(&mut self, surface: &mut dyn Surface) {
        self.sync_layout();
        let view = DocumentViewModel::new(&self.document);
        let visible = Rect::from_size(self.layout.viewport_size());
        self.layout.render(&view, surface, visible);
        if self.caret.is_visible() && self.document.selection().is_none() {
            let rect = self.layout.cursor_rect(&view, self.document.cursor());
            surface.fill_rect(Rect::new(rect.x, rect.y, CARET_WIDTH, rect.height), Color::Caret);
        }
    }

    pub fn status_line(&mut self) -> String {
        let title = self.title.as_deref().unwrap_or("[untitled]");
        let mut line = format!(" {title}  {}", self.view_mode());
        if matches!(self.view_mode(), ViewMode::Page | ViewMode::Manuscript) {
            self.sync_layout();
            let view = DocumentViewModel::new(&self.document);
            let page = self.layout.page_at(&view, self.document.cursor()) + 1;
            let count = self.layout.page_count(&view);
            line.push_str(&format!("  page {page}/{count}"));
        }
        line.push_str(&format!("  {} words", self.stats.words));
        if let Some(report) = self.writer_report.as_ref().filter(|report| !report.tags.is_empty()) {
            line.push_str(&format!("  {} tags", report.tags.len()));
        }
        if !self.status_message.is_empty() {
            line.push_str("  ");
            line.push_str(&self.status_message);
        }
        line
    }

    /// Terminal cell of the caret while it is showing.
    fn caret_cell(&mut self, surface: &TerminalSurface) -> Option<(u16, u16)> {
        if !self.caret.is_visible() {
            return None;
        }
        let view = DocumentViewModel::new(&self.document);
        let rect = self.layout.cursor_rect(&view, self.document.cursor());
        let (col, row) = TerminalSurface::cell_of(rect.x + CELL_WIDTH / 2.0, rect.y + rect.height / 2.0);
        let col = u16::try_from(col).ok().filter(|c| *c < surface.cols())?;
        // The last row belongs to the status line
        let row = u16::try_from(row).ok().filter(|r| *r + 1 < surface.rows())?;
        Some((col, row))
    }

    fn draw_frame(&mut self, surface: &mut TerminalSurface) {
        surface.begin_frame();
        self.render(surface);
        let status = self.status_line();
        let y = f32::from(surface.rows().saturating_sub(1)) * CELL_HEIGHT;
        let width = surface.pixel_size().width;
        surface.set_clip(None);
        surface.fill_rect(Rect::new(0.0, y, width, CELL_HEIGHT), Color::Muted);
        surface.draw_text(0.0, y, &status, &TextStyle::with_color(Color::Background));
    }

    fn viewport_for(surface: &TerminalSurface) -> Size {
        let rows = surface.rows().saturating_sub(1).max(1);
        Size::new(f32::from(surface.cols()) * CELL_WIDTH, f32::from(rows) * CELL_HEIGHT)
    }

    // ---- terminal session ----------------------------------------------

    pub fn run(mut self) -> Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, EnableMouseCapture, EnableBracketedPaste)?;

        let result = self.run_loop();

        disable_raw_mode()?;
        execute!(stdout(), DisableBracketedPaste, DisableMouseCapture, LeaveAlternateScreen)?;

        result.map(|()| self)
    }

    fn run_loop(&mut self) -> Result<()> {
        let mut surface = TerminalSurface::from_terminal()?;
        self.resize(Self::viewport_for(&surface));
        let mut out = stdout();

        loop {
            self.draw_frame(&mut surface);
            let caret = self.caret_cell(&surface);
            surface.flush(&mut out, caret)?;

            if event::poll(FRAME_INTERVAL)? {
                let now = Instant::now();
                match event::read()? {
                    Event::Key(key_event) => {
                        if self.handle_key(&key_event, now) == Transition::Quit {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(&mouse, now),
                    Event::Paste(text) => {
                        if let Err(err) = self.paste_text(&text, now) {
                            tracing::warn!(%err, "paste failed");
                        }
                    }
                    Event::Resize(cols, rows) => {
                        surface.resize(cols, rows);
                        self.resize(Self::viewport_for(&surface));
                    }
                    _ => {}
                }
            }
            self.tick(Instant::now());
        }

        Ok(())
    }
}

/// The net effect of a batch of logged changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldedChange {
    Text(TextEdit),
    /// Only formatting changed, within `[start, end)`.
    Format { start: usize, end: usize },
}

/// Folds logged changes into one. Formatting changes count as replacing
/// text with itself once any text edit is involved.
fn fold_changes(changes: &[DocumentChange]) -> Option<FoldedChange> {
    let mut folded: Option<FoldedChange> = None;
    for change in changes {
        folded = Some(match (folded, *change) {
            (None, DocumentChange::Text(edit)) => FoldedChange::Text(edit),
            (None, DocumentChange::Format { start, end }) => FoldedChange::Format { start, end },
            (Some(FoldedChange::Format { start, end }), DocumentChange::Format { start: s, end: e }) => {
                FoldedChange::Format { start: start.min(s), end: end.max(e) }
            }
            (Some(previous), change) => {
                let previous = match previous {
                    FoldedChange::Text(edit) => edit,
                    FoldedChange::Format { start, end } => format_edit(start, end),
                };
                let next = match change {
                    DocumentChange::Text(edit) => edit,
                    DocumentChange::Format { start, end } => format_edit(start, end),
                };
                FoldedChange::Text(previous.compose(&next))
            }
        });
    }
    folded
}

fn format_edit(start: usize, end: usize) -> TextEdit {
    TextEdit { start, removed: end - start, inserted: end - start }
}

fn build_layout(mode: ViewMode, context: &EditorContext, viewport: Size, title: Option<&str>) -> Box<dyn LayoutEngine> {
    let config = &context.config;
    let shaper = Rc::clone(&context.shaper);
    let metrics = config.metrics();
    let title = title.map(str::to_string);
    let mut layout: Box<dyn LayoutEngine> = match mode {
        ViewMode::Continuous => Box::new(ContinuousLayout::new(shaper, metrics, viewport)),
        ViewMode::Page => {
            let mut pages = PaginatedLayout::new(shaper, metrics, config.page_setup(), viewport);
            pages.set_widows_orphans(config.widows, config.orphans);
            pages.set_title(title);
            Box::new(pages)
        }
        ViewMode::Typewriter => {
            let mut typewriter = CenterLockLayout::new(shaper, metrics, viewport)
                .with_focus(config.focus_position)
                .with_scroll_duration(config.scroll_duration);
            typewriter.set_smooth(config.smooth_scroll);
            Box::new(typewriter)
        }
        ViewMode::Manuscript => {
            let mut manuscript = ManuscriptLayout::new(shaper, viewport);
            manuscript.set_widows_orphans(config.widows, config.orphans);
            manuscript.set_title(title);
            Box::new(manuscript)
        }
    };
    layout.set_zoom(config.zoom);
    layout
}
