//! Terminal drawing surface.
//!
//! Layout works in pixels; the terminal grid is treated as cells of
//! [`CELL_WIDTH`] by [`CELL_HEIGHT`] pixels, which matches the default
//! monospace metrics one to one. Frames are drawn into a cell buffer and
//! only rows that changed since the previous flush are written out.

use super::geometry::{Point, Rect, Size};
use super::surface::{Color, Surface, TextStyle};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

pub const CELL_WIDTH: f32 = 8.0;
pub const CELL_HEIGHT: f32 = 16.0;

/// Marks the second column of a double-width character.
const CONTINUATION: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Text,
            bg: Color::Desk,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
        }
    }
}

fn terminal_color(color: Color) -> TermColor {
    match color {
        Color::Text => TermColor::Rgb { r: 24, g: 24, b: 24 },
        Color::Background => TermColor::Rgb { r: 250, g: 250, b: 244 },
        Color::Desk => TermColor::Rgb { r: 196, g: 196, b: 200 },
        Color::PageShadow => TermColor::Rgb { r: 150, g: 150, b: 156 },
        Color::Selection => TermColor::Rgb { r: 178, g: 204, b: 240 },
        Color::CommentHighlight => TermColor::Rgb { r: 255, g: 236, b: 150 },
        Color::ResolvedComment => TermColor::Rgb { r: 232, g: 230, b: 212 },
        Color::Marker => TermColor::Rgb { r: 30, g: 90, b: 200 },
        Color::Muted => TermColor::Rgb { r: 120, g: 120, b: 120 },
        Color::Caret => TermColor::Black,
        Color::Preedit => TermColor::Rgb { r: 150, g: 60, b: 160 },
    }
}

#[derive(Debug)]
pub struct TerminalSurface {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    previous: Vec<Cell>,
    clip: Option<Rect>,
    needs_full_redraw: bool,
}

impl TerminalSurface {
    pub fn new(cols: u16, rows: u16) -> Self {
        let count = cols as usize * rows as usize;
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); count],
            previous: Vec::new(),
            clip: None,
            needs_full_redraw: true,
        }
    }

    /// A surface the size of the current terminal.
    pub fn from_terminal() -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        Ok(Self::new(cols, rows))
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) != (self.cols, self.rows) {
            *self = Self::new(cols, rows);
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// The grid measured in layout pixels.
    pub fn pixel_size(&self) -> Size {
        Size::new(self.cols as f32 * CELL_WIDTH, self.rows as f32 * CELL_HEIGHT)
    }

    /// Cell holding pixel `(x, y)`.
    pub fn cell_of(x: f32, y: f32) -> (i32, i32) {
        ((x / CELL_WIDTH).floor() as i32, (y / CELL_HEIGHT).floor() as i32)
    }

    /// Pixel centre of cell `(col, row)`.
    pub fn pixel_of(col: u16, row: u16) -> Point {
        Point::new(
            (col as f32 + 0.5) * CELL_WIDTH,
            (row as f32 + 0.5) * CELL_HEIGHT,
        )
    }

    pub fn force_redraw(&mut self) {
        self.needs_full_redraw = true;
    }

    /// Resets every cell before a new frame is painted.
    pub fn begin_frame(&mut self) {
        self.cells.fill(Cell::default());
        self.clip = None;
    }

    pub fn row_text(&self, row: u16) -> String {
        self.row(row)
            .iter()
            .filter(|c| c.ch != CONTINUATION)
            .map(|c| c.ch)
            .collect()
    }

    pub fn background_at(&self, col: u16, row: u16) -> Option<Color> {
        self.index(col as i32, row as i32).map(|i| self.cells[i].bg)
    }

    fn row(&self, row: u16) -> &[Cell] {
        let start = row as usize * self.cols as usize;
        self.cells.get(start..start + self.cols as usize).unwrap_or(&[])
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col >= self.cols as i32 || row >= self.rows as i32 {
            return None;
        }
        Some(row as usize * self.cols as usize + col as usize)
    }

    fn clipped(&self, col: i32, row: i32) -> bool {
        let Some(clip) = self.clip else {
            return false;
        };
        let centre = Self::pixel_of(col.max(0) as u16, row.max(0) as u16);
        !clip.contains(centre.x, centre.y)
    }

    /// Writes the rows that changed since the last flush, then places the
    /// hardware cursor at `caret` (cell coordinates) or hides it.
    pub fn flush(&mut self, out: &mut impl Write, caret: Option<(u16, u16)>) -> io::Result<()> {
        queue!(out, Hide)?;
        if self.needs_full_redraw {
            queue!(out, ResetColor, Clear(ClearType::All))?;
        }
        let mut written = 0;
        for row in 0..self.rows {
            let start = row as usize * self.cols as usize;
            let range = start..start + self.cols as usize;
            if !self.needs_full_redraw && self.previous.get(range.clone()) == self.cells.get(range.clone()) {
                continue;
            }
            queue!(out, MoveTo(0, row))?;
            let mut last: Option<Cell> = None;
            for cell in &self.cells[range] {
                if cell.ch == CONTINUATION {
                    continue;
                }
                let style_changed = last.is_none_or(|l| {
                    (l.fg, l.bg, l.bold, l.italic, l.underline, l.strikethrough)
                        != (cell.fg, cell.bg, cell.bold, cell.italic, cell.underline, cell.strikethrough)
                });
                if style_changed {
                    queue!(
                        out,
                        SetAttribute(Attribute::Reset),
                        SetForegroundColor(terminal_color(cell.fg)),
                        SetBackgroundColor(terminal_color(cell.bg))
                    )?;
                    if cell.bold {
                        queue!(out, SetAttribute(Attribute::Bold))?;
                    }
                    if cell.italic {
                        queue!(out, SetAttribute(Attribute::Italic))?;
                    }
                    if cell.underline {
                        queue!(out, SetAttribute(Attribute::Underlined))?;
                    }
                    if cell.strikethrough {
                        queue!(out, SetAttribute(Attribute::CrossedOut))?;
                    }
                }
                queue!(out, Print(cell.ch))?;
                last = Some(*cell);
            }
            written += 1;
        }
        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        if let Some((col, row)) = caret {
            queue!(out, MoveTo(col, row), Show)?;
        }
        out.flush()?;
        if written > 0 {
            tracing::trace!(rows = written, "terminal rows flushed");
        }
        self.previous.clone_from(&self.cells);
        self.needs_full_redraw = false;
        Ok(())
    }
}

impl Surface for TerminalSurface {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let rect = match self.clip {
            Some(clip) => match rect.intersection(&clip) {
                Some(rect) => rect,
                None => return,
            },
            None => rect,
        };
        if rect.is_empty() {
            return;
        }
        let col0 = (rect.x / CELL_WIDTH).floor() as i32;
        let col1 = (rect.right() / CELL_WIDTH).ceil() as i32;
        let row0 = (rect.y / CELL_HEIGHT).floor() as i32;
        let row1 = (rect.bottom() / CELL_HEIGHT).ceil() as i32;
        for row in row0..row1 {
            for col in col0..col1 {
                if let Some(index) = self.index(col, row) {
                    self.cells[index].bg = color;
                }
            }
        }
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle) {
        let (mut col, row) = Self::cell_of(x + CELL_WIDTH / 2.0, y);
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0);
            if width == 0 {
                continue;
            }
            if !self.clipped(col, row) {
                if let Some(index) = self.index(col, row) {
                    let cell = &mut self.cells[index];
                    cell.ch = ch;
                    cell.fg = style.color;
                    cell.bold = style.bold;
                    cell.italic = style.italic;
                    cell.underline = style.underline;
                    cell.strikethrough = style.strikethrough;
                }
                if width == 2 {
                    if let Some(index) = self.index(col + 1, row) {
                        self.cells[index].ch = CONTINUATION;
                    }
                }
            }
            col += width as i32;
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, color: Color) {
        let (c0, r0) = Self::cell_of(from.x, from.y);
        let (c1, r1) = Self::cell_of(to.x, to.y);
        let glyph = if r0 == r1 { '─' } else { '│' };
        for row in r0.min(r1)..=r0.max(r1) {
            for col in c0.min(c1)..=c0.max(c1) {
                if self.clipped(col, row) {
                    continue;
                }
                if let Some(index) = self.index(col, row) {
                    self.cells[index].ch = glyph;
                    self.cells[index].fg = color;
                }
            }
        }
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.clip = clip;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lands_on_cells() {
        let mut surface = TerminalSurface::new(10, 2);
        surface.draw_text(16.0, 16.0, "hey", &TextStyle::plain());
        assert_eq!(surface.row_text(1), "  hey     ");
        assert_eq!(surface.row_text(0), " ".repeat(10));
    }

    #[test]
    fn test_fill_covers_partial_cells() {
        let mut surface = TerminalSurface::new(10, 2);
        surface.fill_rect(Rect::new(12.0, 0.0, 8.0, 16.0), Color::Selection);
        assert_eq!(surface.background_at(0, 0), Some(Color::Desk));
        assert_eq!(surface.background_at(1, 0), Some(Color::Selection));
        assert_eq!(surface.background_at(2, 0), Some(Color::Selection));
        assert_eq!(surface.background_at(3, 0), Some(Color::Desk));
        assert_eq!(surface.background_at(1, 1), Some(Color::Desk));
    }

    #[test]
    fn test_clip_limits_drawing() {
        let mut surface = TerminalSurface::new(10, 1);
        surface.set_clip(Some(Rect::new(0.0, 0.0, 24.0, 16.0)));
        surface.draw_text(0.0, 0.0, "abcdef", &TextStyle::plain());
        surface.fill_rect(Rect::new(0.0, 0.0, 80.0, 16.0), Color::Background);
        assert_eq!(surface.row_text(0), "abc       ");
        assert_eq!(surface.background_at(5, 0), Some(Color::Desk));
    }

    #[test]
    fn test_wide_chars_take_two_cells() {
        let mut surface = TerminalSurface::new(6, 1);
        surface.draw_text(0.0, 0.0, "日本", &TextStyle::plain());
        assert_eq!(surface.row_text(0), "日本  ");
    }

    #[test]
    fn test_flush_writes_only_changed_rows() {
        let mut surface = TerminalSurface::new(8, 3);
        surface.draw_text(0.0, 0.0, "first", &TextStyle::plain());
        let mut out = Vec::new();
        surface.flush(&mut out, Some((0, 0))).unwrap();
        let full = out.len();

        surface.draw_text(0.0, 32.0, "third", &TextStyle::plain());
        let mut out = Vec::new();
        surface.flush(&mut out, None).unwrap();
        assert!(out.len() < full);
        assert!(String::from_utf8_lossy(&out).contains("third"));
        assert!(!String::from_utf8_lossy(&out).contains("first"));
    }
}
