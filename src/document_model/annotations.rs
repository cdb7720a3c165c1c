use super::edit::TextEdit;
use crate::error::{EditorError, Result};
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u64);

impl AnnotationId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an annotation is attached in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Point(usize),
    Range { start: usize, end: usize },
}

impl Anchor {
    pub fn range(start: usize, end: usize) -> Self {
        Anchor::Range { start: start.min(end), end: start.max(end) }
    }

    pub fn start(&self) -> usize {
        match self {
            Anchor::Point(p) => *p,
            Anchor::Range { start, .. } => *start,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            Anchor::Point(p) => *p,
            Anchor::Range { end, .. } => *end,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start() == self.end()
    }

    fn mapped(&self, edit: &TextEdit) -> Anchor {
        match self {
            Anchor::Point(p) => Anchor::Point(edit.map_point(*p)),
            Anchor::Range { start, end } => {
                let start = edit.map_point(*start);
                let end = edit.map_range_end(*end).max(start);
                Anchor::Range { start, end }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Footnote,
    Endnote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub author: String,
    pub created_at: SystemTime,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footnote {
    pub kind: NoteKind,
    /// Display number, assigned by renumbering.
    pub number: u32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub key: String,
    pub locator: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub term: String,
    pub subterm: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    Comment(Comment),
    Footnote(Footnote),
    Citation(Citation),
    IndexEntry(IndexEntry),
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Comment(_) => "comment",
            AnnotationKind::Footnote(_) => "footnote",
            AnnotationKind::Citation(_) => "citation",
            AnnotationKind::IndexEntry(_) => "index entry",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub anchor: Anchor,
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn as_comment(&self) -> Option<&Comment> {
        match &self.kind {
            AnnotationKind::Comment(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_footnote(&self) -> Option<&Footnote> {
        match &self.kind {
            AnnotationKind::Footnote(f) => Some(f),
            _ => None,
        }
    }
}

/// A range anchor whose whole text was deleted. The store cannot pick the
/// right answer for these, so they are handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorConflict {
    pub id: AnnotationId,
    /// Anchor as it was before the deleting edit.
    pub original: Anchor,
    /// Where the anchor collapsed to.
    pub collapsed_at: usize,
}

/// What happened to the annotations during one edit, enough to undo it.
#[derive(Debug, Clone, Default)]
pub struct AnchorChanges {
    pub previous: Vec<(AnnotationId, Anchor)>,
    pub conflicts: Vec<AnchorConflict>,
}

impl AnchorChanges {
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty() && self.conflicts.is_empty()
    }
}

/// Id-indexed annotations plus an ordered position index.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    annotations: HashMap<AnnotationId, Annotation>,
    order: Vec<AnnotationId>,
    next_id: u64,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            annotations: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.order.clear();
    }

    pub fn insert(&mut self, anchor: Anchor, kind: AnnotationKind) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.annotations.insert(id, Annotation { id, anchor, kind });
        self.reindex();
        id
    }

    /// Puts back an annotation removed earlier, keeping its id.
    pub fn restore(&mut self, annotation: Annotation) {
        self.next_id = self.next_id.max(annotation.id.0 + 1);
        self.annotations.insert(annotation.id, annotation);
        self.reindex();
    }

    pub fn get(&self, id: AnnotationId) -> Result<&Annotation> {
        self.annotations.get(&id).ok_or(EditorError::NotFound(id))
    }

    pub fn kind_mut(&mut self, id: AnnotationId) -> Result<&mut AnnotationKind> {
        self.annotations
            .get_mut(&id)
            .map(|a| &mut a.kind)
            .ok_or(EditorError::NotFound(id))
    }

    pub fn set_anchor(&mut self, id: AnnotationId, anchor: Anchor) -> Result<()> {
        let annotation = self.annotations.get_mut(&id).ok_or(EditorError::NotFound(id))?;
        annotation.anchor = anchor;
        self.reindex();
        Ok(())
    }

    pub fn remove(&mut self, id: AnnotationId) -> Result<Annotation> {
        let removed = self.annotations.remove(&id).ok_or(EditorError::NotFound(id))?;
        self.order.retain(|other| *other != id);
        Ok(removed)
    }

    /// Annotations ordered by anchor start.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.order.iter().filter_map(|id| self.annotations.get(id))
    }

    /// Annotations whose anchor intersects `[start, end)`; point anchors
    /// count when they fall inside the span or exactly on `start`.
    pub fn in_range(&self, start: usize, end: usize) -> Vec<&Annotation> {
        self.iter()
            .take_while(|a| a.anchor.start() <= end)
            .filter(|a| {
                let (s, e) = (a.anchor.start(), a.anchor.end());
                if s == e {
                    s >= start && (s < end || s == start)
                } else {
                    s < end && e > start
                }
            })
            .collect()
    }

    pub fn comments(&self) -> Vec<&Annotation> {
        self.iter().filter(|a| a.as_comment().is_some()).collect()
    }

    pub fn footnotes(&self, kind: NoteKind) -> Vec<&Annotation> {
        self.iter()
            .filter(|a| matches!(&a.kind, AnnotationKind::Footnote(f) if f.kind == kind))
            .collect()
    }

    pub fn anchors(&self) -> Vec<(AnnotationId, Anchor)> {
        self.iter().map(|a| (a.id, a.anchor)).collect()
    }

    /// Moves every anchor through `edit`.
    ///
    /// Ranges entirely inside a deleted span collapse to the edit start and
    /// are reported as conflicts rather than resolved here.
    pub fn adjust(&mut self, edit: &TextEdit) -> AnchorChanges {
        let mut changes = AnchorChanges::default();
        for annotation in self.annotations.values_mut() {
            let before = annotation.anchor;
            let after = before.mapped(edit);
            if after == before {
                continue;
            }
            if let Anchor::Range { start, end } = before {
                if edit.swallows(start, end) {
                    changes.conflicts.push(AnchorConflict {
                        id: annotation.id,
                        original: before,
                        collapsed_at: edit.start,
                    });
                }
            }
            changes.previous.push((annotation.id, before));
            annotation.anchor = after;
        }
        if !changes.previous.is_empty() {
            self.reindex();
        }
        changes.conflicts.sort_by_key(|c| c.id);
        changes
    }

    /// Numbers footnotes and endnotes `1..=k` independently, ordered by
    /// reference position. Returns true when any number changed.
    pub fn renumber_footnotes(&mut self) -> bool {
        let mut changed = false;
        for kind in [NoteKind::Footnote, NoteKind::Endnote] {
            let mut notes: Vec<(usize, AnnotationId)> = self
                .annotations
                .values()
                .filter(|a| matches!(&a.kind, AnnotationKind::Footnote(f) if f.kind == kind))
                .map(|a| (a.anchor.start(), a.id))
                .collect();
            notes.sort();

            for (index, (_, id)) in notes.into_iter().enumerate() {
                let number = index as u32 + 1;
                if let Some(Annotation { kind: AnnotationKind::Footnote(note), .. }) =
                    self.annotations.get_mut(&id)
                {
                    if note.number != number {
                        note.number = number;
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    fn reindex(&mut self) {
        let mut order: Vec<(usize, usize, AnnotationId)> = self
            .annotations
            .values()
            .map(|a| (a.anchor.start(), a.anchor.end(), a.id))
            .collect();
        order.sort();
        self.order = order.into_iter().map(|(_, _, id)| id).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(text: &str) -> AnnotationKind {
        AnnotationKind::Comment(Comment {
            text: text.to_string(),
            author: "tester".to_string(),
            created_at: SystemTime::UNIX_EPOCH,
            resolved: false,
        })
    }

    fn note(kind: NoteKind) -> AnnotationKind {
        AnnotationKind::Footnote(Footnote { kind, number: 0, content: String::new() })
    }

    fn number_of(store: &AnnotationStore, id: AnnotationId) -> u32 {
        store.get(id).unwrap().as_footnote().unwrap().number
    }

    #[test]
    fn test_default_store_starts_ids_at_one() {
        let mut store = AnnotationStore::default();
        let first = store.insert(Anchor::Point(0), comment("a"));
        assert_eq!(first.value(), 1);
        assert_eq!(store.insert(Anchor::Point(1), comment("b")).value(), 2);
    }

    #[test]
    fn test_point_anchor_rules() {
        let mut store = AnnotationStore::new();
        let before = store.insert(Anchor::Point(2), note(NoteKind::Footnote));
        let inside = store.insert(Anchor::Point(6), note(NoteKind::Footnote));
        let after = store.insert(Anchor::Point(12), note(NoteKind::Footnote));

        store.adjust(&TextEdit::deletion(4, 5));

        assert_eq!(store.get(before).unwrap().anchor, Anchor::Point(2));
        assert_eq!(store.get(inside).unwrap().anchor, Anchor::Point(4));
        assert_eq!(store.get(after).unwrap().anchor, Anchor::Point(7));
    }

    #[test]
    fn test_range_partially_deleted_is_trimmed() {
        let mut store = AnnotationStore::new();
        let id = store.insert(Anchor::range(5, 15), comment("trim me"));
        let changes = store.adjust(&TextEdit::deletion(0, 8));
        assert!(changes.conflicts.is_empty());
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(0, 7));

        store.adjust(&TextEdit::deletion(4, 10));
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(0, 4));
    }

    #[test]
    fn test_range_fully_deleted_is_reported() {
        let mut store = AnnotationStore::new();
        let id = store.insert(Anchor::range(5, 10), comment("gone"));
        let changes = store.adjust(&TextEdit::deletion(3, 10));
        assert_eq!(
            changes.conflicts,
            vec![AnchorConflict { id, original: Anchor::range(5, 10), collapsed_at: 3 }]
        );
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(3, 3));
        assert_eq!(changes.previous, vec![(id, Anchor::range(5, 10))]);
    }

    #[test]
    fn test_insertion_grows_range_only_inside() {
        let mut store = AnnotationStore::new();
        let id = store.insert(Anchor::range(5, 10), comment("grow"));
        store.adjust(&TextEdit::insertion(10, 3));
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(5, 10));
        store.adjust(&TextEdit::insertion(7, 2));
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(5, 12));
        store.adjust(&TextEdit::insertion(5, 1));
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(6, 13));
    }

    #[test]
    fn test_renumber_footnotes_per_kind() {
        let mut store = AnnotationStore::new();
        let f_late = store.insert(Anchor::Point(40), note(NoteKind::Footnote));
        let e_early = store.insert(Anchor::Point(5), note(NoteKind::Endnote));
        let f_early = store.insert(Anchor::Point(10), note(NoteKind::Footnote));
        let e_late = store.insert(Anchor::Point(50), note(NoteKind::Endnote));
        let f_mid = store.insert(Anchor::Point(20), note(NoteKind::Footnote));

        assert!(store.renumber_footnotes());
        assert_eq!(number_of(&store, f_early), 1);
        assert_eq!(number_of(&store, f_mid), 2);
        assert_eq!(number_of(&store, f_late), 3);
        assert_eq!(number_of(&store, e_early), 1);
        assert_eq!(number_of(&store, e_late), 2);
        assert!(!store.renumber_footnotes());
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let mut store = AnnotationStore::new();
        let id = store.insert(Anchor::Point(0), note(NoteKind::Footnote));
        store.remove(id).unwrap();
        assert!(matches!(store.get(id), Err(EditorError::NotFound(missing)) if missing == id));
        assert!(matches!(store.remove(id), Err(EditorError::NotFound(_))));
    }

    #[test]
    fn test_iteration_follows_position() {
        let mut store = AnnotationStore::new();
        let late = store.insert(Anchor::Point(30), note(NoteKind::Footnote));
        let early = store.insert(Anchor::range(1, 4), comment("a"));
        let ids: Vec<AnnotationId> = store.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![early, late]);
        assert_eq!(store.in_range(0, 10).len(), 1);
        assert_eq!(store.in_range(30, 31).len(), 1);
    }

    #[test]
    fn test_restore_keeps_id() {
        let mut store = AnnotationStore::new();
        let id = store.insert(Anchor::range(2, 6), comment("keep"));
        let removed = store.remove(id).unwrap();
        store.restore(removed);
        assert_eq!(store.get(id).unwrap().anchor, Anchor::range(2, 6));
        let next = store.insert(Anchor::Point(0), note(NoteKind::Endnote));
        assert!(next > id);
    }
}
