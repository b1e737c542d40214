//! Foldable regions.

use crate::changes::{Assoc, ChangeSet};

/// A foldable region in character offsets.
///
/// `from` is the start of the first line and `to` the end of the last line of the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldRange {
    /// Start offset of the region.
    pub from: usize,
    /// End offset of the region.
    pub to: usize,
    /// Optional region kind (`"comment"`, `"imports"`, `"region"`).
    pub kind: Option<String>,
}

impl FoldRange {
    /// Create a fold range without a kind.
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            kind: None,
        }
    }

    pub(crate) fn map(&self, changes: &ChangeSet) -> Self {
        let from = changes.map_pos(self.from, Assoc::Before);
        Self {
            from,
            to: changes.map_pos(self.to, Assoc::Before).max(from),
            kind: self.kind.clone(),
        }
    }
}
