//! Character formatting kept as sorted, non-overlapping runs.
//!
//! Plain text has no run at all; a run exists only where at least one
//! attribute is set.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAlign {
    #[default]
    Normal,
    Superscript,
    Subscript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextAttributes {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub vertical: VerticalAlign,
}

/// A single toggleable attribute, used by keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFlag {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Superscript,
    Subscript,
}

impl TextAttributes {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn bold() -> Self {
        Self { bold: true, ..Self::default() }
    }

    pub fn italic() -> Self {
        Self { italic: true, ..Self::default() }
    }

    pub fn underline() -> Self {
        Self { underline: true, ..Self::default() }
    }

    pub fn from_flag(flag: FormatFlag) -> Self {
        let mut attrs = Self::default();
        attrs.set(flag, true);
        attrs
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    pub fn has(&self, flag: FormatFlag) -> bool {
        match flag {
            FormatFlag::Bold => self.bold,
            FormatFlag::Italic => self.italic,
            FormatFlag::Underline => self.underline,
            FormatFlag::Strikethrough => self.strikethrough,
            FormatFlag::Superscript => self.vertical == VerticalAlign::Superscript,
            FormatFlag::Subscript => self.vertical == VerticalAlign::Subscript,
        }
    }

    pub fn set(&mut self, flag: FormatFlag, on: bool) {
        match flag {
            FormatFlag::Bold => self.bold = on,
            FormatFlag::Italic => self.italic = on,
            FormatFlag::Underline => self.underline = on,
            FormatFlag::Strikethrough => self.strikethrough = on,
            FormatFlag::Superscript | FormatFlag::Subscript => {
                let target = if flag == FormatFlag::Superscript {
                    VerticalAlign::Superscript
                } else {
                    VerticalAlign::Subscript
                };
                if on {
                    self.vertical = target;
                } else if self.vertical == target {
                    self.vertical = VerticalAlign::Normal;
                }
            }
        }
    }

    /// Union of both attribute sets; `other`'s vertical alignment wins unless it is normal.
    pub fn merge(&self, other: &TextAttributes) -> TextAttributes {
        TextAttributes {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
            strikethrough: self.strikethrough || other.strikethrough,
            vertical: if other.vertical != VerticalAlign::Normal {
                other.vertical
            } else {
                self.vertical
            },
        }
    }

    /// Removes every attribute set in `other`.
    pub fn subtract(&self, other: &TextAttributes) -> TextAttributes {
        TextAttributes {
            bold: self.bold && !other.bold,
            italic: self.italic && !other.italic,
            underline: self.underline && !other.underline,
            strikethrough: self.strikethrough && !other.strikethrough,
            vertical: if other.vertical != VerticalAlign::Normal && other.vertical == self.vertical {
                VerticalAlign::Normal
            } else {
                self.vertical
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRun {
    pub start: usize,
    pub end: usize,
    pub attributes: TextAttributes,
}

impl FormatRun {
    pub fn new(start: usize, end: usize, attributes: TextAttributes) -> Self {
        Self { start, end, attributes }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && self.end > start
    }
}

#[derive(Debug, Clone, Default)]
pub struct FormatModel {
    runs: Vec<FormatRun>,
}

impl FormatModel {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn runs(&self) -> &[FormatRun] {
        &self.runs
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }

    /// Attributes in effect at `pos` (plain when no run covers it).
    pub fn format_at(&self, pos: usize) -> TextAttributes {
        let idx = self.runs.partition_point(|run| run.end <= pos);
        match self.runs.get(idx) {
            Some(run) if run.contains(pos) => run.attributes,
            _ => TextAttributes::plain(),
        }
    }

    /// Copies of the runs overlapping `[start, end)`, clipped to that range.
    pub fn runs_in(&self, start: usize, end: usize) -> Vec<FormatRun> {
        let first = self.runs.partition_point(|run| run.end <= start);
        self.runs[first..]
            .iter()
            .take_while(|run| run.start < end)
            .map(|run| FormatRun::new(run.start.max(start), run.end.min(end), run.attributes))
            .filter(|run| !run.is_empty())
            .collect()
    }

    /// Layers `attrs` over everything in `[start, end)`, clamped to `doc_len`.
    pub fn apply_format(&mut self, start: usize, end: usize, attrs: TextAttributes, doc_len: usize) {
        self.transform_range(start, end, doc_len, |existing| existing.merge(&attrs));
    }

    pub fn remove_format(&mut self, start: usize, end: usize, attrs: TextAttributes, doc_len: usize) {
        self.transform_range(start, end, doc_len, |existing| existing.subtract(&attrs));
    }

    pub fn clear_format(&mut self, start: usize, end: usize, doc_len: usize) {
        self.transform_range(start, end, doc_len, |_| TextAttributes::plain());
    }

    /// Replaces everything inside `[start, end)` with `runs` (used to undo formatting).
    pub fn restore_range(&mut self, start: usize, end: usize, runs: &[FormatRun]) {
        if start >= end {
            return;
        }
        self.split_at(start);
        self.split_at(end);
        self.runs.retain(|run| run.end <= start || run.start >= end);
        let at = self.runs.partition_point(|run| run.start < start);
        let restored: Vec<FormatRun> = runs
            .iter()
            .filter(|run| !run.is_empty() && !run.attributes.is_plain())
            .cloned()
            .collect();
        self.runs.splice(at..at, restored);
        self.coalesce();
    }

    /// Whether every character in `[start, end)` carries `flag`.
    pub fn range_has(&self, start: usize, end: usize, flag: FormatFlag) -> bool {
        if start >= end {
            return self.format_at(start.saturating_sub(1)).has(flag);
        }
        let mut covered = start;
        for run in self.runs_in(start, end) {
            if run.start != covered || !run.attributes.has(flag) {
                return false;
            }
            covered = run.end;
        }
        covered >= end
    }

    /// Text of length `len` was inserted at `pos`.
    pub fn on_insert(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        for run in &mut self.runs {
            if run.start >= pos {
                run.start += len;
                run.end += len;
            } else if run.end >= pos {
                // Inserted text inherits the formatting of the preceding character.
                run.end += len;
            }
        }
        self.coalesce();
    }

    /// `len` characters were removed starting at `start`.
    pub fn on_delete(&mut self, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let end = start + len;
        let map = |p: usize| {
            if p <= start {
                p
            } else if p <= end {
                start
            } else {
                p - len
            }
        };
        for run in &mut self.runs {
            run.start = map(run.start);
            run.end = map(run.end);
        }
        self.runs.retain(|run| !run.is_empty());
        self.coalesce();
    }

    fn transform_range<F>(&mut self, start: usize, end: usize, doc_len: usize, f: F)
    where
        F: Fn(&TextAttributes) -> TextAttributes,
    {
        let start = start.min(doc_len);
        let end = end.min(doc_len);
        if start >= end {
            return;
        }

        self.split_at(start);
        self.split_at(end);

        // Rebuild the covered span including the unformatted gaps between runs.
        let first = self.runs.partition_point(|run| run.end <= start);
        let last = self.runs.partition_point(|run| run.start < end);
        let mut rebuilt = Vec::with_capacity(last - first + 1);
        let mut cursor = start;
        for run in &self.runs[first..last] {
            if run.start > cursor {
                rebuilt.push(FormatRun::new(cursor, run.start, f(&TextAttributes::plain())));
            }
            rebuilt.push(FormatRun::new(run.start, run.end, f(&run.attributes)));
            cursor = run.end;
        }
        if cursor < end {
            rebuilt.push(FormatRun::new(cursor, end, f(&TextAttributes::plain())));
        }
        rebuilt.retain(|run| !run.attributes.is_plain());

        self.runs.splice(first..last, rebuilt);
        self.coalesce();
    }

    fn split_at(&mut self, pos: usize) {
        let idx = self.runs.partition_point(|run| run.end <= pos);
        if let Some(run) = self.runs.get(idx) {
            if run.start < pos && pos < run.end {
                let tail = FormatRun::new(pos, run.end, run.attributes);
                self.runs[idx].end = pos;
                self.runs.insert(idx + 1, tail);
            }
        }
    }

    fn coalesce(&mut self) {
        let mut merged: Vec<FormatRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.drain(..) {
            if run.is_empty() || run.attributes.is_plain() {
                continue;
            }
            match merged.last_mut() {
                Some(prev) if prev.end == run.start && prev.attributes == run.attributes => {
                    prev.end = run.end;
                }
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}
