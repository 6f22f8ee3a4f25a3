//! Turns editor selection marks into a normalized text payload.

/// Column sentinel meaning "end of line" regardless of line length.
pub const COL_EOL: usize = usize::MAX;

/// Position of one end of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mark {
    /// 1-based line; 0 means the mark is unset.
    pub line: usize,
    /// 0-based character column; [`COL_EOL`] selects to the end of the line.
    pub col: usize,
}

impl Mark {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    pub fn is_unset(&self) -> bool {
        self.line == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Character,
    Line,
    Block,
}

/// Host indentation settings relevant to extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabPolicy {
    /// Whether the host expands tabs to spaces.
    pub expand: bool,
    /// Spaces per tab when expanding.
    pub width: usize,
}

impl Default for TabPolicy {
    fn default() -> Self {
        Self {
            expand: false,
            width: 4,
        }
    }
}

/// A selection resolved against a buffer. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// Computes the selected text for `kind` between `start` and `end`.
///
/// Marks may be given backwards; they are normalized so start <= end.
/// Returns `None` for unset marks or when the assembled text is empty.
pub fn extract(
    kind: SelectionKind,
    start: Mark,
    end: Mark,
    lines: &[String],
    tabs: TabPolicy,
) -> Option<Selection> {
    if start.is_unset() && end.is_unset() {
        return None;
    }
    let (start, end) = normalize(start, end);
    if start.line == 0 || start.line > lines.len() {
        return None;
    }
    let end_line = end.line.min(lines.len());
    let range = &lines[start.line - 1..end_line];
    let text = match kind {
        SelectionKind::Line => range.join("\n"),
        SelectionKind::Block => {
            let lo = start.col.min(end.col);
            let hi = start.col.max(end.col);
            range
                .iter()
                .map(|line| slice_cols(line, lo, hi))
                .collect::<Vec<_>>()
                .join("\n")
        }
        SelectionKind::Character => {
            if range.len() == 1 {
                slice_cols(&range[0], start.col, end.col)
            } else {
                let mut parts = Vec::with_capacity(range.len());
                parts.push(slice_cols(&range[0], start.col, COL_EOL));
                for line in &range[1..range.len() - 1] {
                    parts.push(line.clone());
                }
                parts.push(slice_cols(&range[range.len() - 1], 0, end.col));
                parts.join("\n")
            }
        }
    };
    let text = if tabs.expand {
        text.replace('\t', &" ".repeat(tabs.width))
    } else {
        text
    };
    if text.is_empty() {
        return None;
    }
    Some(Selection {
        start_line: start.line,
        end_line,
        text,
    })
}

fn normalize(a: Mark, b: Mark) -> (Mark, Mark) {
    if b.line < a.line || (b.line == a.line && b.col < a.col) {
        (b, a)
    } else {
        (a, b)
    }
}

/// Inclusive character span `[lo, hi]` clamped to the line. A column at or
/// past the end of the line (the [`COL_EOL`] sentinel included) resolves to
/// the line length.
fn slice_cols(line: &str, lo: usize, hi: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    let start = lo.min(chars.len());
    let end = if hi >= chars.len() {
        chars.len()
    } else {
        hi + 1
    };
    chars
        .get(start..end)
        .map(|span| span.iter().collect())
        .unwrap_or_default()
}
