//! Lazy paragraph flow shared by every layout strategy.
//!
//! The document is split into paragraphs at `'\n'`. Each paragraph keeps its
//! start offset, its height and, only when it has been looked at, its line
//! boxes. Paragraphs that were never laid out carry an estimated height, so
//! the content height of a long manuscript is available without shaping
//! every line.

use super::geometry::Rect;
use super::shaping::{FontMetrics, MonospaceShaper, ShapedText, TextShaper};
use super::view_model::ViewModel;
use crate::document_model::{FormatRun, TextEdit};
use std::rc::Rc;

/// One visual line, relative to its paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBox {
    /// Offsets relative to the paragraph start.
    pub start: usize,
    pub end: usize,
    /// Top edge relative to the paragraph top.
    pub y: f32,
    pub height: f32,
    /// Caret x for every stop in `start..=end`.
    pub x_offsets: Vec<f32>,
}

/// A line resolved to document offsets and content coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub paragraph: usize,
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub last_in_paragraph: bool,
    pub y: f32,
    pub height: f32,
    pub x_offsets: Vec<f32>,
}

impl PlacedLine {
    /// The last caret stop on this line. On a wrapped line the end offset
    /// belongs to the next line.
    pub fn last_stop(&self) -> usize {
        if self.last_in_paragraph || self.end == self.start {
            self.end
        } else {
            self.end - 1
        }
    }

    /// End of the characters drawn on this line, counting the paragraph
    /// break on a last line.
    pub fn char_end(&self) -> usize {
        if self.last_in_paragraph {
            self.end + 1
        } else {
            self.end
        }
    }

    pub fn x_of(&self, pos: usize) -> f32 {
        let index = pos.saturating_sub(self.start).min(self.x_offsets.len().saturating_sub(1));
        self.x_offsets.get(index).copied().unwrap_or(0.0)
    }

    /// Floor hit test: the last stop whose x is at or left of `x`.
    pub fn stop_at_x(&self, x: f32) -> usize {
        let stops = self.last_stop() - self.start + 1;
        let count = self.x_offsets[..stops.min(self.x_offsets.len())].partition_point(|&ox| ox <= x);
        self.start + count.saturating_sub(1)
    }

    /// The caret cell at `pos`, with x relative to the text area and y
    /// relative to the line top.
    pub fn cell(&self, pos: usize, text_width: f32, min_width: f32) -> Rect {
        let pos = pos.clamp(self.start, self.last_stop());
        let x = self.x_of(pos);
        let right = if pos >= self.last_stop() {
            if x < text_width { text_width } else { x + min_width }
        } else {
            self.x_of(pos + 1)
        };
        Rect::new(x, 0.0, right - x, self.height)
    }

    /// Part of `[start, end)` on this line, y relative to the line top.
    pub fn selection_rect(&self, start: usize, end: usize, text_width: f32) -> Option<Rect> {
        if start >= self.char_end() || end <= self.start {
            return None;
        }
        let x1 = self.x_of(start.max(self.start));
        let x2 = if end >= self.char_end() { text_width.max(x1) } else { self.x_of(end) };
        (x2 > x1).then(|| Rect::new(x1, 0.0, x2 - x1, self.height))
    }
}

#[derive(Debug, Clone)]
struct Paragraph {
    start: usize,
    len: usize,
    y: f32,
    height: f32,
    /// True once `height` comes from real line boxes rather than an estimate.
    measured: bool,
    lines: Option<Vec<LineBox>>,
}

impl Paragraph {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug)]
pub struct FlowLayout {
    shaper: Rc<dyn TextShaper>,
    metrics: FontMetrics,
    width: f32,
    ignore_formats: bool,
    paragraphs: Vec<Paragraph>,
    /// Paragraphs from here on need their y recomputed.
    dirty_from: Option<usize>,
}

impl FlowLayout {
    pub fn new(shaper: Rc<dyn TextShaper>, metrics: FontMetrics, width: f32) -> Self {
        Self {
            shaper,
            metrics,
            width: width.max(1.0),
            ignore_formats: false,
            paragraphs: Vec::new(),
            dirty_from: None,
        }
    }

    /// Shapes plain text only, ignoring format runs.
    pub fn set_ignore_formats(&mut self, ignore: bool) {
        if ignore != self.ignore_formats {
            self.ignore_formats = ignore;
            self.invalidate_all();
        }
    }

    pub fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn set_width(&mut self, width: f32) {
        let width = width.max(1.0);
        if (width - self.width).abs() > f32::EPSILON {
            self.width = width;
            self.invalidate_all();
        }
    }

    pub fn set_metrics(&mut self, metrics: FontMetrics) {
        if metrics != self.metrics {
            self.metrics = metrics;
            self.invalidate_all();
        }
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Paragraphs that currently hold line boxes.
    pub fn realized_count(&self) -> usize {
        self.paragraphs.iter().filter(|p| p.lines.is_some()).count()
    }

    pub fn paragraph_range(&self, index: usize) -> Option<(usize, usize)> {
        self.paragraphs.get(index).map(|p| (p.start, p.end()))
    }

    /// Splits the whole document into paragraphs with estimated heights.
    pub fn rebuild(&mut self, doc: &dyn ViewModel) {
        self.paragraphs = self.scan(doc, 0, doc.len());
        self.dirty_from = Some(0);
        tracing::debug!(paragraphs = self.paragraphs.len(), chars = doc.len(), "flow rebuilt");
    }

    fn scan(&self, doc: &dyn ViewModel, from: usize, to: usize) -> Vec<Paragraph> {
        let mut paragraphs = Vec::new();
        let mut start = from;
        let mut len = 0;
        for ch in doc.chars_from(from).take(to - from) {
            if ch == '\n' {
                paragraphs.push(self.unmeasured(start, len));
                start += len + 1;
                len = 0;
            } else {
                len += 1;
            }
        }
        paragraphs.push(self.unmeasured(start, len));
        paragraphs
    }

    fn unmeasured(&self, start: usize, len: usize) -> Paragraph {
        Paragraph {
            start,
            len,
            y: 0.0,
            height: self.estimate(len),
            measured: false,
            lines: None,
        }
    }

    fn estimate(&self, len: usize) -> f32 {
        let per_line = (self.width / self.metrics.char_width).floor().max(1.0) as usize;
        let lines = len.div_ceil(per_line).max(1);
        lines as f32 * self.metrics.line_height
    }

    fn invalidate_all(&mut self) {
        for index in 0..self.paragraphs.len() {
            let height = self.estimate(self.paragraphs[index].len);
            let paragraph = &mut self.paragraphs[index];
            paragraph.lines = None;
            paragraph.measured = false;
            paragraph.height = height;
        }
        self.dirty_from = Some(0);
    }

    /// Re-splits the paragraphs touched by `edit`; `doc` is the post-edit
    /// text. Returns the index of the first paragraph that changed.
    pub fn apply_edit(&mut self, doc: &dyn ViewModel, edit: &TextEdit) -> usize {
        if self.paragraphs.is_empty() {
            self.rebuild(doc);
            return 0;
        }
        let first = self.paragraph_index_at_pos(edit.start);
        let last = self.paragraph_index_at_pos(edit.old_end());
        let region_start = self.paragraphs[first].start;
        let old_region_end = self.paragraphs[last].end().max(edit.old_end());
        let new_region_end = (old_region_end + edit.inserted - edit.removed).min(doc.len());

        let replacement = self.scan(doc, region_start, new_region_end);
        let added = replacement.len();
        for paragraph in &mut self.paragraphs[last + 1..] {
            paragraph.start = paragraph.start + edit.inserted - edit.removed;
        }
        self.paragraphs.splice(first..=last, replacement);
        self.mark_dirty(first);
        tracing::trace!(first, removed = last - first + 1, added, "paragraphs relaid");
        first
    }

    fn mark_dirty(&mut self, index: usize) {
        self.dirty_from = Some(self.dirty_from.map_or(index, |d| d.min(index)));
    }

    fn update_positions(&mut self) {
        let Some(from) = self.dirty_from.take() else {
            return;
        };
        let mut y = match from.checked_sub(1).and_then(|i| self.paragraphs.get(i)) {
            Some(previous) => previous.y + previous.height,
            None => 0.0,
        };
        let from = from.min(self.paragraphs.len());
        for paragraph in &mut self.paragraphs[from..] {
            paragraph.y = y;
            y += paragraph.height;
        }
    }

    pub fn content_height(&mut self) -> f32 {
        self.update_positions();
        self.paragraphs.last().map_or(0.0, |p| p.y + p.height)
    }

    /// Paragraph holding `pos`; a position on a paragraph break belongs to
    /// the paragraph it ends.
    pub fn paragraph_index_at_pos(&self, pos: usize) -> usize {
        let index = self.paragraphs.partition_point(|p| p.end() < pos);
        index.min(self.paragraphs.len().saturating_sub(1))
    }

    fn paragraph_index_at_y(&mut self, y: f32) -> usize {
        self.update_positions();
        let index = self.paragraphs.partition_point(|p| p.y + p.height <= y);
        index.min(self.paragraphs.len().saturating_sub(1))
    }

    /// Lays out paragraph `index` if it has no line boxes yet.
    fn realize(&mut self, doc: &dyn ViewModel, index: usize) {
        let Some(paragraph) = self.paragraphs.get(index) else {
            return;
        };
        if paragraph.lines.is_some() {
            return;
        }
        let (start, end) = (paragraph.start, paragraph.end());
        let lines = self.layout_paragraph(doc, index, start, end);
        let height = lines.iter().map(|l| l.height).sum::<f32>();

        let paragraph = &mut self.paragraphs[index];
        let changed = (paragraph.height - height).abs() > f32::EPSILON;
        paragraph.height = height;
        paragraph.measured = true;
        paragraph.lines = Some(lines);
        if changed {
            self.mark_dirty(index + 1);
        }
    }

    fn layout_paragraph(&self, doc: &dyn ViewModel, index: usize, start: usize, end: usize) -> Vec<LineBox> {
        let text = doc.text_range(start, end);
        let runs: Vec<FormatRun> = if self.ignore_formats {
            Vec::new()
        } else {
            doc.runs_in(start, end)
                .into_iter()
                .map(|r| FormatRun::new(r.start - start, r.end - start, r.attributes))
                .collect()
        };
        let char_count = end - start;
        let shaped = match self.shaper.shape(&text, &runs, &self.metrics) {
            Ok(shaped) if shaped.advances.len() == char_count && shaped.breaks.len() == char_count => shaped,
            Ok(_) => {
                tracing::warn!(paragraph = index, "shaper returned mismatched advances, using monospace fallback");
                self.fallback(&text)
            }
            Err(err) => {
                tracing::warn!(paragraph = index, %err, "shaping failed, using monospace fallback");
                self.fallback(&text)
            }
        };
        break_lines(&shaped, self.width, self.metrics.line_height)
    }

    fn fallback(&self, text: &str) -> ShapedText {
        MonospaceShaper.shape(text, &[], &self.metrics).unwrap_or_default()
    }

    fn placed(&self, index: usize, line_index: usize) -> Option<PlacedLine> {
        let paragraph = self.paragraphs.get(index)?;
        let lines = paragraph.lines.as_ref()?;
        let line = lines.get(line_index)?;
        Some(PlacedLine {
            paragraph: index,
            index: line_index,
            start: paragraph.start + line.start,
            end: paragraph.start + line.end,
            last_in_paragraph: line_index + 1 == lines.len(),
            y: paragraph.y + line.y,
            height: line.height,
            x_offsets: line.x_offsets.clone(),
        })
    }

    /// Every line of paragraph `index`, laying it out if needed.
    pub fn paragraph_lines(&mut self, doc: &dyn ViewModel, index: usize) -> Vec<PlacedLine> {
        self.realize(doc, index);
        self.update_positions();
        let count = self.paragraphs.get(index).and_then(|p| p.lines.as_ref()).map_or(0, |l| l.len());
        (0..count).filter_map(|line| self.placed(index, line)).collect()
    }

    /// The visual line holding caret position `pos`.
    pub fn line_at_pos(&mut self, doc: &dyn ViewModel, pos: usize) -> Option<PlacedLine> {
        let index = self.paragraph_index_at_pos(pos);
        self.realize(doc, index);
        self.update_positions();
        let paragraph = self.paragraphs.get(index)?;
        let relative = pos.saturating_sub(paragraph.start);
        let lines = paragraph.lines.as_ref()?;
        let line = lines.partition_point(|l| l.start <= relative).saturating_sub(1);
        self.placed(index, line)
    }

    /// The visual line at content height `y`, clamped to the first or last.
    pub fn line_at_y(&mut self, doc: &dyn ViewModel, y: f32) -> Option<PlacedLine> {
        let index = self.paragraph_index_at_y(y);
        self.realize(doc, index);
        self.update_positions();
        let paragraph = self.paragraphs.get(index)?;
        let lines = paragraph.lines.as_ref()?;
        let relative = y - paragraph.y;
        let line = lines
            .partition_point(|l| l.y + l.height <= relative)
            .min(lines.len().saturating_sub(1));
        self.placed(index, line)
    }

    /// The line `delta` visual lines away from the one at `pos`, clamped to
    /// the document.
    pub fn line_offset(&mut self, doc: &dyn ViewModel, pos: usize, delta: isize) -> Option<PlacedLine> {
        let mut line = self.line_at_pos(doc, pos)?;
        let mut remaining = delta;
        while remaining != 0 {
            let next = if remaining > 0 {
                if line.last_in_paragraph {
                    let index = line.paragraph + 1;
                    if index >= self.paragraphs.len() {
                        break;
                    }
                    self.realize(doc, index);
                    self.update_positions();
                    self.placed(index, 0)
                } else {
                    self.placed(line.paragraph, line.index + 1)
                }
            } else if line.index > 0 {
                self.placed(line.paragraph, line.index - 1)
            } else if line.paragraph > 0 {
                let index = line.paragraph - 1;
                self.realize(doc, index);
                self.update_positions();
                let count = self.paragraphs[index].lines.as_ref().map_or(1, |l| l.len());
                self.placed(index, count - 1)
            } else {
                break;
            };
            let Some(next) = next else {
                break;
            };
            line = next;
            remaining -= remaining.signum();
        }
        Some(line)
    }

    /// Lines overlapping content band `[top, bottom)`, laying out as needed.
    pub fn lines_in(&mut self, doc: &dyn ViewModel, top: f32, bottom: f32) -> Vec<PlacedLine> {
        let mut placed = Vec::new();
        if self.paragraphs.is_empty() {
            return placed;
        }
        let mut index = self.paragraph_index_at_y(top);
        while index < self.paragraphs.len() {
            self.realize(doc, index);
            self.update_positions();
            let paragraph = &self.paragraphs[index];
            if paragraph.y >= bottom && !placed.is_empty() {
                break;
            }
            let count = paragraph.lines.as_ref().map_or(0, |l| l.len());
            for line in 0..count {
                if let Some(line) = self.placed(index, line) {
                    if line.y + line.height > top && line.y < bottom {
                        placed.push(line);
                    }
                }
            }
            index += 1;
        }
        placed
    }

    /// Drops line boxes outside `[top, bottom)`; measured heights are kept.
    pub fn evict_outside(&mut self, top: f32, bottom: f32) {
        self.update_positions();
        let mut evicted = 0;
        for paragraph in &mut self.paragraphs {
            if paragraph.lines.is_some() && (paragraph.y + paragraph.height < top || paragraph.y > bottom) {
                paragraph.lines = None;
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::trace!(evicted, "line cache trimmed");
        }
    }
}

/// Greedy line breaking at the last break opportunity that fits.
fn break_lines(shaped: &ShapedText, width: f32, line_height: f32) -> Vec<LineBox> {
    let count = shaped.advances.len();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut y = 0.0;
    loop {
        let mut x = 0.0;
        let mut end = start;
        let mut last_break = None;
        while end < count {
            let advance = shaped.advances[end];
            if x + advance > width && end > start {
                break;
            }
            x += advance;
            if shaped.breaks[end] {
                last_break = Some(end);
            }
            end += 1;
        }
        let line_end = if end < count {
            last_break.map_or(end, |b| b + 1)
        } else {
            count
        };

        let mut x_offsets = Vec::with_capacity(line_end - start + 1);
        let mut x = 0.0;
        x_offsets.push(x);
        for advance in &shaped.advances[start..line_end] {
            x += advance;
            x_offsets.push(x);
        }
        lines.push(LineBox {
            start,
            end: line_end,
            y,
            height: line_height,
            x_offsets,
        });
        y += line_height;
        start = line_end;
        if start >= count {
            break;
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::{DocumentModel, TextAttributes};
    use crate::view::shaping::ShapingError;
    use crate::view::view_model::DocumentViewModel;

    fn flow(width: f32) -> FlowLayout {
        FlowLayout::new(Rc::new(MonospaceShaper), FontMetrics::new(16.0, 1.0), width)
    }

    #[test]
    fn test_break_lines_at_spaces() {
        let shaped = MonospaceShaper.shape("the quick brown", &[], &FontMetrics::new(16.0, 1.0)).unwrap();
        // Ten cells per line.
        let lines = break_lines(&shaped, 80.0, 16.0);
        let spans: Vec<(usize, usize)> = lines.iter().map(|l| (l.start, l.end)).collect();
        assert_eq!(spans, vec![(0, 10), (10, 15)]);
        assert_eq!(lines[1].y, 16.0);
        assert_eq!(lines[0].x_offsets.len(), 11);
    }

    #[test]
    fn test_long_word_breaks_hard() {
        let shaped = MonospaceShaper.shape("abcdefghijkl", &[], &FontMetrics::new(16.0, 1.0)).unwrap();
        let lines = break_lines(&shaped, 40.0, 16.0);
        let spans: Vec<(usize, usize)> = lines.iter().map(|l| (l.start, l.end)).collect();
        assert_eq!(spans, vec![(0, 5), (5, 10), (10, 12)]);
    }

    #[test]
    fn test_empty_paragraph_has_one_line() {
        let lines = break_lines(&ShapedText::default(), 80.0, 16.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].x_offsets, vec![0.0]);
    }

    #[test]
    fn test_layout_is_lazy() {
        let text = vec!["A paragraph of some length."; 500].join("\n");
        let doc = DocumentModel::with_text(&text);
        let view = DocumentViewModel::new(&doc);
        let mut flow = flow(800.0);
        flow.rebuild(&view);
        assert_eq!(flow.paragraph_count(), 500);
        assert_eq!(flow.realized_count(), 0);

        let lines = flow.lines_in(&view, 0.0, 160.0);
        assert_eq!(lines.len(), 10);
        assert!(flow.realized_count() <= 11);
        assert_eq!(flow.content_height(), 500.0 * 16.0);
    }

    #[test]
    fn test_edit_splits_and_merges_paragraphs() {
        let mut doc = DocumentModel::with_text("one\ntwo\nthree");
        let mut flow = flow(800.0);
        flow.rebuild(&DocumentViewModel::new(&doc));

        doc.insert_text(5, "\nX").unwrap();
        flow.apply_edit(&DocumentViewModel::new(&doc), &TextEdit::insertion(5, 2));
        assert_eq!(flow.paragraph_count(), 4);
        assert_eq!(flow.paragraph_range(1), Some((4, 5)));
        assert_eq!(flow.paragraph_range(2), Some((6, 9)));
        assert_eq!(flow.paragraph_range(3), Some((10, 15)));

        doc.delete_text(3, 1).unwrap();
        flow.apply_edit(&DocumentViewModel::new(&doc), &TextEdit::deletion(3, 1));
        assert_eq!(flow.paragraph_count(), 3);
        assert_eq!(flow.paragraph_range(0), Some((0, 4)));
        assert_eq!(flow.paragraph_range(2), Some((9, 14)));
    }

    #[test]
    fn test_cell_and_stop_agree() {
        let doc = DocumentModel::with_text("the quick brown fox");
        let view = DocumentViewModel::new(&doc);
        let mut flow = flow(80.0);
        flow.rebuild(&view);
        let line = flow.line_at_pos(&view, 3).unwrap();
        assert_eq!((line.start, line.end, line.last_stop()), (0, 10, 9));
        for pos in line.start..=line.last_stop() {
            let cell = line.cell(pos, 80.0, 8.0);
            assert_eq!(line.stop_at_x(cell.x), pos);
        }
        // The wrap offset belongs to the next line.
        assert_eq!(flow.line_at_pos(&view, 10).unwrap().index, 1);
    }

    /// Fails the way a font backend can.
    #[derive(Debug)]
    enum BrokenShaper {
        Unavailable,
        MissingGlyph,
        ShortAdvances,
    }

    impl TextShaper for BrokenShaper {
        fn shape(&self, text: &str, _: &[FormatRun], _: &FontMetrics) -> Result<ShapedText, ShapingError> {
            match self {
                BrokenShaper::Unavailable => Err(ShapingError::Unavailable("no font loaded".into())),
                BrokenShaper::MissingGlyph => Err(ShapingError::MissingGlyph('q')),
                BrokenShaper::ShortAdvances => Ok(ShapedText {
                    advances: vec![3.0; text.chars().count() / 2],
                    breaks: vec![false; text.chars().count() / 2],
                }),
            }
        }
    }

    fn spans_and_cells(flow: &mut FlowLayout, view: &DocumentViewModel) -> Vec<(usize, usize, Rect)> {
        let mut out = Vec::new();
        for pos in 0..=view.len() {
            if let Some(line) = flow.line_at_pos(view, pos) {
                out.push((line.start, line.end, line.cell(pos, 80.0, 8.0)));
            }
        }
        out
    }

    #[test]
    fn test_shaping_failure_falls_back_to_monospace() {
        let mut doc = DocumentModel::with_text("the quick brown fox
jumps over");
        doc.apply_format(4, 9, TextAttributes::bold()).unwrap();
        let view = DocumentViewModel::new(&doc);
        let mut expected_flow = flow(80.0);
        expected_flow.rebuild(&view);
        let expected = spans_and_cells(&mut expected_flow, &view);

        for broken in [BrokenShaper::Unavailable, BrokenShaper::MissingGlyph, BrokenShaper::ShortAdvances] {
            let mut flow = FlowLayout::new(Rc::new(broken), FontMetrics::new(16.0, 1.0), 80.0);
            flow.rebuild(&view);
            assert_eq!(spans_and_cells(&mut flow, &view), expected);
            assert_eq!(flow.content_height(), expected_flow.content_height());
        }
    }

    #[test]
    fn test_line_offset_crosses_paragraphs() {
        let doc = DocumentModel::with_text("the quick brown\nfox");
        let view = DocumentViewModel::new(&doc);
        let mut flow = flow(80.0);
        flow.rebuild(&view);
        let below = flow.line_offset(&view, 2, 2).unwrap();
        assert_eq!((below.paragraph, below.start), (1, 16));
        let above = flow.line_offset(&view, 17, -1).unwrap();
        assert_eq!(above.start, 10);
        let clamped = flow.line_offset(&view, 17, 5).unwrap();
        assert_eq!(clamped.start, 16);
    }
}
