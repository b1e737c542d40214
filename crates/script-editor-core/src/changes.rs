//! Structured document changes.
//!
//! A [`ChangeSet`] describes one transaction's edits against a *start* document. Its regions are
//! sorted, non-overlapping and expressed in two coordinate systems at once:
//!
//! - `from_a..to_a`: the replaced range in the start document
//! - `from_b..to_b`: the inserted text's range in the resulting document
//!
//! Incremental consumers (LSP `didChange`, decoration mapping) walk [`ChangeSet::iter_changes`]
//! in document order.

use crate::document::Document;
use thiserror::Error;

/// A single requested edit in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSpec {
    /// Start of the replaced range.
    pub from: usize,
    /// End of the replaced range (exclusive).
    pub to: usize,
    /// Replacement text (may be empty).
    pub insert: String,
}

impl ChangeSpec {
    /// Insert `text` at `at`.
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            from: at,
            to: at,
            insert: text.into(),
        }
    }

    /// Replace `from..to` with `text`.
    pub fn replace(from: usize, to: usize, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            insert: text.into(),
        }
    }

    /// Delete `from..to`.
    pub fn delete(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            insert: String::new(),
        }
    }

    /// Length of `insert` in characters.
    pub fn inserted_len(&self) -> usize {
        self.insert.chars().count()
    }

    fn is_noop(&self) -> bool {
        self.from == self.to && self.insert.is_empty()
    }
}

/// One region of a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRegion {
    /// Start of the replaced range in the start document.
    pub from_a: usize,
    /// End of the replaced range in the start document.
    pub to_a: usize,
    /// Start of the inserted text in the resulting document.
    pub from_b: usize,
    /// End of the inserted text in the resulting document.
    pub to_b: usize,
    /// Inserted text.
    pub inserted: String,
}

impl ChangeRegion {
    /// Number of characters removed from the start document.
    pub fn deleted_len(&self) -> usize {
        self.to_a - self.from_a
    }

    /// Number of characters inserted.
    pub fn inserted_len(&self) -> usize {
        self.to_b - self.from_b
    }
}

/// Errors produced while building a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
    /// A change does not fit the document it is applied to.
    #[error("change {from}..{to} is out of range for a document of length {len}")]
    OutOfRange {
        /// Requested start.
        from: usize,
        /// Requested end.
        to: usize,
        /// Document length at that point.
        len: usize,
    },
    /// Two simultaneous changes touch the same characters.
    #[error("change starting at {at} overlaps a previous change")]
    Overlapping {
        /// Start of the offending change.
        at: usize,
    },
}

/// How a mapped position associates with text inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// Stay before inserted text.
    Before,
    /// Move past inserted text.
    After,
}

/// The full set of edits made by one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    len_before: usize,
    len_after: usize,
    regions: Vec<ChangeRegion>,
}

impl ChangeSet {
    /// A change set that leaves a document of length `len` untouched.
    pub fn empty(len: usize) -> Self {
        Self {
            len_before: len,
            len_after: len,
            regions: Vec::new(),
        }
    }

    /// Build a change set from *simultaneous* specs, all expressed against the start document.
    ///
    /// Specs may be given in any order. Insertions at the same offset keep their given order.
    pub fn of(
        len_before: usize,
        specs: impl IntoIterator<Item = ChangeSpec>,
    ) -> Result<Self, ChangeError> {
        let mut specs = specs
            .into_iter()
            .filter(|spec| !spec.is_noop())
            .collect::<Vec<_>>();

        for spec in &specs {
            if spec.from > spec.to || spec.to > len_before {
                return Err(ChangeError::OutOfRange {
                    from: spec.from,
                    to: spec.to,
                    len: len_before,
                });
            }
        }

        specs.sort_by_key(|spec| (spec.from, spec.to));

        let mut regions = Vec::with_capacity(specs.len());
        let mut delta: isize = 0;
        let mut prev_end: Option<usize> = None;

        for spec in specs {
            if let Some(end) = prev_end
                && spec.from < end
            {
                return Err(ChangeError::Overlapping { at: spec.from });
            }

            let inserted_len = spec.inserted_len();
            let from_b = (spec.from as isize + delta) as usize;
            delta += inserted_len as isize - (spec.to - spec.from) as isize;
            prev_end = Some(spec.to);

            regions.push(ChangeRegion {
                from_a: spec.from,
                to_a: spec.to,
                from_b,
                to_b: from_b + inserted_len,
                inserted: spec.insert,
            });
        }

        Ok(Self {
            len_before,
            len_after: (len_before as isize + delta) as usize,
            regions,
        })
    }

    /// Build a change set from *sequential* specs: each spec is expressed against the document
    /// produced by the specs before it.
    ///
    /// Ordered, non-overlapping sequences are converted region by region. Anything else collapses
    /// into a single region covering the text that actually differs.
    pub fn from_sequential(doc: &Document, edits: &[ChangeSpec]) -> Result<Self, ChangeError> {
        let mut running_len = doc.len();
        let mut delta: isize = 0;
        let mut prev_end_b: Option<usize> = None;
        let mut ordered = true;
        let mut simultaneous = Vec::with_capacity(edits.len());

        for edit in edits {
            if edit.from > edit.to || edit.to > running_len {
                return Err(ChangeError::OutOfRange {
                    from: edit.from,
                    to: edit.to,
                    len: running_len,
                });
            }

            if let Some(end) = prev_end_b
                && edit.from < end
            {
                ordered = false;
            }

            if ordered {
                simultaneous.push(ChangeSpec {
                    from: (edit.from as isize - delta) as usize,
                    to: (edit.to as isize - delta) as usize,
                    insert: edit.insert.clone(),
                });
            }

            let step = edit.inserted_len() as isize - (edit.to - edit.from) as isize;
            prev_end_b = Some(edit.from + edit.inserted_len());
            delta += step;
            running_len = (running_len as isize + step) as usize;
        }

        if ordered {
            return Self::of(doc.len(), simultaneous);
        }

        let mut running = doc.clone();
        for edit in edits {
            running = running.replace(edit.from, edit.to, &edit.insert);
        }

        let before = doc.to_string().chars().collect::<Vec<_>>();
        let after = running.to_string().chars().collect::<Vec<_>>();

        let prefix = before
            .iter()
            .zip(after.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let max_suffix = before.len().min(after.len()) - prefix;
        let suffix = before
            .iter()
            .rev()
            .zip(after.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        Self::of(
            doc.len(),
            [ChangeSpec {
                from: prefix,
                to: before.len() - suffix,
                insert: after[prefix..after.len() - suffix].iter().collect(),
            }],
        )
    }

    /// Returns `true` if this change set does not modify the document.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Document length before the changes.
    pub fn len_before(&self) -> usize {
        self.len_before
    }

    /// Document length after the changes.
    pub fn len_after(&self) -> usize {
        self.len_after
    }

    /// Changed regions, in document order.
    pub fn regions(&self) -> &[ChangeRegion] {
        &self.regions
    }

    /// Iterate changed regions in document order.
    pub fn iter_changes(&self) -> impl Iterator<Item = &ChangeRegion> {
        self.regions.iter()
    }

    /// The regions as simultaneous specs against the start document.
    pub fn to_specs(&self) -> Vec<ChangeSpec> {
        self.regions
            .iter()
            .map(|r| ChangeSpec::replace(r.from_a, r.to_a, r.inserted.clone()))
            .collect()
    }

    /// Apply the changes to the start document.
    pub fn apply(&self, doc: &Document) -> Document {
        if self.regions.is_empty() {
            return doc.clone();
        }

        let mut rope = doc.rope().clone();
        for region in self.regions.iter().rev() {
            if region.from_a < region.to_a {
                rope.remove(region.from_a..region.to_a);
            }
            if !region.inserted.is_empty() {
                rope.insert(region.from_a, &region.inserted);
            }
        }
        Document::from_rope(rope)
    }

    /// Map a start-document offset into the resulting document.
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        let mut delta: isize = 0;

        for region in &self.regions {
            if region.from_a == region.to_a {
                if pos < region.from_a || (pos == region.from_a && assoc == Assoc::Before) {
                    break;
                }
            } else {
                if pos <= region.from_a {
                    break;
                }
                if pos < region.to_a {
                    return match assoc {
                        Assoc::Before => region.from_b,
                        Assoc::After => region.to_b,
                    };
                }
            }
            delta += region.inserted_len() as isize - region.deleted_len() as isize;
        }

        ((pos as isize + delta).max(0) as usize).min(self.len_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_are_sorted_and_shifted() {
        let changes = ChangeSet::of(
            11,
            [
                ChangeSpec::replace(6, 11, "Rust"),
                ChangeSpec::insert(0, ">> "),
            ],
        )
        .unwrap();

        let regions = changes.regions();
        assert_eq!(regions.len(), 2);
        assert_eq!((regions[0].from_a, regions[0].from_b), (0, 0));
        assert_eq!((regions[1].from_a, regions[1].to_a), (6, 11));
        assert_eq!((regions[1].from_b, regions[1].to_b), (9, 13));
        assert_eq!(changes.len_after(), 14);
    }

    #[test]
    fn test_apply() {
        let doc = Document::from_text("Hello World");
        let changes = ChangeSet::of(
            doc.len(),
            [
                ChangeSpec::insert(0, ">> "),
                ChangeSpec::replace(6, 11, "Rust"),
            ],
        )
        .unwrap();

        assert_eq!(changes.apply(&doc).to_string(), ">> Hello Rust");
    }

    #[test]
    fn test_overlapping_changes_are_rejected() {
        let err = ChangeSet::of(
            10,
            [ChangeSpec::delete(2, 6), ChangeSpec::replace(4, 8, "x")],
        )
        .unwrap_err();
        assert_eq!(err, ChangeError::Overlapping { at: 4 });
    }

    #[test]
    fn test_out_of_range_changes_are_rejected() {
        let err = ChangeSet::of(3, [ChangeSpec::delete(1, 5)]).unwrap_err();
        assert!(matches!(err, ChangeError::OutOfRange { len: 3, .. }));
    }

    #[test]
    fn test_noop_specs_are_dropped() {
        let changes = ChangeSet::of(3, [ChangeSpec::insert(1, "")]).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_map_pos() {
        let changes = ChangeSet::of(
            10,
            [ChangeSpec::insert(2, "abc"), ChangeSpec::delete(5, 8)],
        )
        .unwrap();

        assert_eq!(changes.map_pos(1, Assoc::After), 1);
        assert_eq!(changes.map_pos(2, Assoc::Before), 2);
        assert_eq!(changes.map_pos(2, Assoc::After), 5);
        assert_eq!(changes.map_pos(6, Assoc::Before), 8);
        assert_eq!(changes.map_pos(9, Assoc::Before), 9);
        assert_eq!(changes.map_pos(10, Assoc::Before), 10);
    }

    #[test]
    fn test_from_sequential_ordered() {
        let doc = Document::from_text("one two three");
        // Second edit is positioned against the document after the first edit.
        let edits = [ChangeSpec::replace(0, 3, "1"), ChangeSpec::replace(2, 5, "2")];

        let changes = ChangeSet::from_sequential(&doc, &edits).unwrap();
        assert_eq!(changes.regions().len(), 2);
        assert_eq!(changes.apply(&doc).to_string(), "1 2 three");
    }

    #[test]
    fn test_from_sequential_unordered_falls_back_to_single_region() {
        let doc = Document::from_text("abcdef");
        let edits = [ChangeSpec::replace(4, 5, "X"), ChangeSpec::insert(1, "Y")];

        let changes = ChangeSet::from_sequential(&doc, &edits).unwrap();
        assert_eq!(changes.regions().len(), 1);
        assert_eq!(changes.apply(&doc).to_string(), "aYbcdXf");
    }
}
