//! Rope-backed document text.
//!
//! [`Document`] is an immutable-by-convention view of the buffer: edits produce a new document
//! (cloning a [`Rope`] is cheap, nodes are shared). All offsets are **character offsets**
//! (Unicode scalar values) and lines are looked up **1-based**, matching the way the language
//! client resolves server positions (`doc.line(position.line + 1)`).
//!
//! Only `\n`, `\r\n` and `\r` break lines. Form feeds, vertical tabs, NEL and the Unicode line and
//! paragraph separators are ordinary characters.

use ropey::{Rope, RopeSlice};
use std::fmt;

fn trailing_break_len(line: RopeSlice<'_>) -> usize {
    let len = line.len_chars();
    if len == 0 {
        return 0;
    }

    match line.char(len - 1) {
        '\n' => {
            if len >= 2 && line.char(len - 2) == '\r' {
                2
            } else {
                1
            }
        }
        '\r' => 1,
        _ => 0,
    }
}

/// A single line of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based line number.
    pub number: usize,
    /// Character offset of the first character of the line.
    pub from: usize,
    /// Character offset just before the line break (or the end of the document).
    pub to: usize,
    /// Line text without its line break.
    pub text: String,
}

impl Line {
    /// Length of the line in characters (line break excluded).
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    /// Returns `true` if the line has no content.
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// Document text.
#[derive(Clone, Default)]
pub struct Document {
    rope: Rope,
}

impl Document {
    /// Create an empty document (one empty line).
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Build a document from text.
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Total length in characters.
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    /// Returns `true` if the document holds no text.
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Number of lines (an empty document has one line).
    pub fn lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Look up a line by its **1-based** number.
    ///
    /// Numbers outside `1..=lines()` clamp to the nearest valid line.
    pub fn line(&self, number: usize) -> Line {
        let number = number.clamp(1, self.lines());
        let index = number - 1;

        let from = self.rope.line_to_char(index);
        let slice = self.rope.line(index);
        let to = from + slice.len_chars() - trailing_break_len(slice);

        Line {
            number,
            from,
            to,
            text: self.rope.slice(from..to).to_string(),
        }
    }

    /// The line containing `offset` (clamped to `[0, len]`).
    pub fn line_at(&self, offset: usize) -> Line {
        let offset = offset.min(self.len());
        // An offset inside a line break belongs to the line it terminates.
        self.line(self.rope.char_to_line(offset) + 1)
    }

    /// Text between two character offsets (clamped and ordered).
    pub fn slice_to_string(&self, from: usize, to: usize) -> String {
        let len = self.len();
        let (from, to) = (from.min(to).min(len), from.max(to).min(len));
        self.rope.slice(from..to).to_string()
    }

    /// Character at `offset`, if any.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        if offset < self.len() {
            Some(self.rope.char(offset))
        } else {
            None
        }
    }

    /// Return a new document with `from..to` replaced by `text`.
    pub fn replace(&self, from: usize, to: usize, text: &str) -> Document {
        let len = self.len();
        let (from, to) = (from.min(to).min(len), from.max(to).min(len));

        let mut rope = self.rope.clone();
        if from < to {
            rope.remove(from..to);
        }
        if !text.is_empty() {
            rope.insert(from, text);
        }
        Document { rope }
    }

    /// Borrow the underlying rope.
    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    pub(crate) fn from_rope(rope: Rope) -> Self {
        Self { rope }
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.rope == other.rope
    }
}

impl Eq for Document {}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.len())
            .field("lines", &self.lines())
            .finish()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}
