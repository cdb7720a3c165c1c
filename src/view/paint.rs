//! Drawing helpers shared by the flow-based strategies.

use super::flow::PlacedLine;
use super::geometry::{Point, Rect};
use super::surface::{Color, Surface, TextStyle};
use super::view_model::ViewModel;
use crate::document_model::{Anchor, AnnotationKind, TextAttributes, VerticalAlign};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintOptions {
    /// Draw format runs; when false everything is plain.
    pub formats: bool,
    /// Draw comment highlights and note markers.
    pub annotations: bool,
}

impl Default for PaintOptions {
    fn default() -> Self {
        Self { formats: true, annotations: true }
    }
}

/// Paints one line with its top-left text-area corner at `origin`.
pub fn paint_line(
    doc: &dyn ViewModel,
    surface: &mut dyn Surface,
    line: &PlacedLine,
    origin: Point,
    text_width: f32,
    options: PaintOptions,
) {
    if let Some(selection) = doc.selection() {
        if let Some(rect) = line.selection_rect(selection.start, selection.end, text_width) {
            surface.fill_rect(rect.translated(origin.x, origin.y), Color::Selection);
        }
    }

    let annotations = if options.annotations {
        doc.annotations_in(line.start, line.char_end())
    } else {
        Vec::new()
    };
    for annotation in &annotations {
        let (Anchor::Range { start, end }, AnnotationKind::Comment(comment)) = (&annotation.anchor, &annotation.kind)
        else {
            continue;
        };
        let color = if comment.resolved { Color::ResolvedComment } else { Color::CommentHighlight };
        let x1 = line.x_of((*start).max(line.start));
        let x2 = line.x_of((*end).min(line.end));
        if x2 > x1 {
            surface.fill_rect(Rect::new(origin.x + x1, origin.y, x2 - x1, line.height), color);
        }
    }

    paint_text(doc, surface, line, origin, options.formats);

    for annotation in &annotations {
        let (Anchor::Point(at), AnnotationKind::Footnote(note)) = (&annotation.anchor, &annotation.kind) else {
            continue;
        };
        if *at < line.start || *at > line.last_stop() {
            continue;
        }
        let style = TextStyle {
            vertical: VerticalAlign::Superscript,
            ..TextStyle::with_color(Color::Marker)
        };
        let marker = note.number.to_string();
        surface.draw_text(origin.x + line.x_of(*at), origin.y, &marker, &style);
    }
}

/// Draws the line's characters split at format run boundaries.
fn paint_text(doc: &dyn ViewModel, surface: &mut dyn Surface, line: &PlacedLine, origin: Point, formats: bool) {
    if line.end == line.start {
        return;
    }
    let chars: Vec<char> = doc.text_range(line.start, line.end).chars().collect();
    let runs = if formats { doc.runs_in(line.start, line.end) } else { Vec::new() };

    let mut segments: Vec<(usize, usize, TextAttributes)> = Vec::new();
    let mut at = line.start;
    for run in &runs {
        if run.start > at {
            segments.push((at, run.start, TextAttributes::plain()));
        }
        segments.push((run.start, run.end, run.attributes));
        at = run.end;
    }
    if at < line.end {
        segments.push((at, line.end, TextAttributes::plain()));
    }

    for (start, end, attrs) in segments {
        let text: String = chars[start - line.start..end - line.start]
            .iter()
            .map(|c| if *c == '\t' { ' ' } else { *c })
            .collect();
        let trimmed = text.trim_end_matches('\n');
        if trimmed.is_empty() {
            continue;
        }
        let style = TextStyle::from_attributes(&attrs);
        surface.draw_text(origin.x + line.x_of(start), origin.y, trimmed, &style);
    }
}

/// Draws provisional IME text over the caret cell, underlined.
pub fn paint_preedit(doc: &dyn ViewModel, surface: &mut dyn Surface, caret: Rect) {
    let Some(composition) = doc.composition() else {
        return;
    };
    let style = TextStyle {
        underline: true,
        ..TextStyle::with_color(Color::Preedit)
    };
    surface.draw_text(caret.x, caret.y, &composition.text, &style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::{Comment, DocumentModel, NoteKind, TextAttributes};
    use crate::view::flow::FlowLayout;
    use crate::view::shaping::{FontMetrics, MonospaceShaper};
    use crate::view::surface::RecordingSurface;
    use crate::view::view_model::DocumentViewModel;
    use std::rc::Rc;
    use std::time::SystemTime;

    fn first_line(doc: &DocumentModel) -> PlacedLine {
        let mut flow = FlowLayout::new(Rc::new(MonospaceShaper), FontMetrics::new(16.0, 1.0), 800.0);
        let view = DocumentViewModel::new(doc);
        flow.rebuild(&view);
        flow.line_at_pos(&view, 0).unwrap()
    }

    #[test]
    fn test_runs_become_styled_segments() {
        let mut doc = DocumentModel::with_text("plain bold plain");
        doc.apply_format(6, 10, TextAttributes::bold()).unwrap();
        let line = first_line(&doc);
        let mut surface = RecordingSurface::new();
        paint_line(&DocumentViewModel::new(&doc), &mut surface, &line, Point::default(), 800.0, PaintOptions::default());

        let texts: Vec<(&str, bool)> = surface.texts().into_iter().map(|(t, s)| (t, s.bold)).collect();
        assert_eq!(texts, vec![("plain ", false), ("bold", true), (" plain", false)]);
    }

    #[test]
    fn test_plain_option_ignores_runs() {
        let mut doc = DocumentModel::with_text("plain bold plain");
        doc.apply_format(6, 10, TextAttributes::bold()).unwrap();
        let line = first_line(&doc);
        let mut surface = RecordingSurface::new();
        let options = PaintOptions { formats: false, annotations: false };
        paint_line(&DocumentViewModel::new(&doc), &mut surface, &line, Point::default(), 800.0, options);
        assert_eq!(surface.texts().len(), 1);
        assert!(!surface.texts()[0].1.bold);
    }

    #[test]
    fn test_comments_and_markers() {
        let mut doc = DocumentModel::with_text("a remark here");
        let comment = Comment {
            text: "?".into(),
            author: "me".into(),
            created_at: SystemTime::UNIX_EPOCH,
            resolved: false,
        };
        doc.add_comment(2, 8, comment).unwrap();
        doc.add_footnote(8, NoteKind::Footnote, "source").unwrap();
        let line = first_line(&doc);
        let mut surface = RecordingSurface::new();
        paint_line(&DocumentViewModel::new(&doc), &mut surface, &line, Point::default(), 800.0, PaintOptions::default());

        assert_eq!(surface.rects(Color::CommentHighlight), vec![Rect::new(16.0, 0.0, 48.0, 16.0)]);
        assert!(surface.texts().iter().any(|(t, s)| *t == "1" && s.color == Color::Marker));
    }
}
