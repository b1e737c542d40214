//! Primary selection.

use crate::changes::{Assoc, ChangeSet};

/// A selection range in character offsets.
///
/// `anchor` is the fixed end and `head` the moving end; `anchor == head` is a plain cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Fixed end of the selection.
    pub anchor: usize,
    /// Moving end of the selection (the cursor).
    pub head: usize,
}

impl Selection {
    /// A collapsed selection at `pos`.
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    /// A selection from `anchor` to `head`.
    pub fn range(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Lower bound of the selection.
    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Upper bound of the selection.
    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Returns `true` for a collapsed selection.
    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Clamp both ends to `[0, len]`.
    pub fn clamp(self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }

    /// Map the selection through a change set.
    ///
    /// A cursor sitting exactly where text is inserted moves past the insertion.
    pub fn map(self, changes: &ChangeSet) -> Self {
        Self {
            anchor: changes.map_pos(self.anchor, Assoc::After),
            head: changes.map_pos(self.head, Assoc::After),
        }
    }
}
