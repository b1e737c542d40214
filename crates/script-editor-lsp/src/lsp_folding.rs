//! Folding support.
//!
//! Server folding ranges are line-based; the surface stores character-offset [`FoldRange`]s
//! from the start of the first line to the end of the last line.

use script_editor_core::processing::ProcessingEdit;
use script_editor_core::{EditorState, Extension, FoldRange, TransactionSpec};
use serde_json::Value;

/// A server `FoldingRange` (0-based, inclusive lines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LspFoldingRange {
    /// First folded line.
    pub start_line: u32,
    /// Last folded line.
    pub end_line: u32,
    /// `comment`, `imports`, `region`, ...
    pub kind: Option<String>,
}

impl LspFoldingRange {
    /// A range without a kind.
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
            kind: None,
        }
    }

    /// Parse a `FoldingRange`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            start_line: u32::try_from(value.get("startLine")?.as_u64()?).unwrap_or(u32::MAX),
            end_line: u32::try_from(value.get("endLine")?.as_u64()?).unwrap_or(u32::MAX),
            kind: value
                .get("kind")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Parse a `textDocument/foldingRange` response (`null` is an empty list).
pub fn folding_ranges_from_value(value: &Value) -> Vec<LspFoldingRange> {
    value
        .as_array()
        .map(|ranges| {
            ranges
                .iter()
                .filter_map(LspFoldingRange::from_value)
                .collect()
        })
        .unwrap_or_default()
}

/// Folding integration for one surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldingSupport;

impl FoldingSupport {
    /// A folding integration.
    pub fn new() -> Self {
        Self
    }

    /// The state slots this integration needs.
    pub fn load(&self) -> Vec<Extension> {
        vec![Extension::FoldRanges]
    }

    /// Replace the surface's fold ranges with `ranges`.
    ///
    /// Lines are looked up 1-based (`startLine + 1`, `endLine + 1`) and clamp to the document.
    /// Ranges that end up empty or inverted (`startLine > endLine`) are dropped.
    pub fn set_foldables(&self, state: &EditorState, ranges: &[LspFoldingRange]) -> TransactionSpec {
        let doc = state.doc();
        let ranges = ranges
            .iter()
            .map(|range| {
                let first = doc.line(range.start_line as usize + 1);
                let last = doc.line(range.end_line as usize + 1);
                FoldRange {
                    from: first.from,
                    to: last.to,
                    kind: range.kind.clone(),
                }
            })
            .filter(|range| range.from < range.to)
            .collect();

        TransactionSpec::effects([ProcessingEdit::ReplaceFoldRanges { ranges }])
    }

    /// The foldable region starting on the line `line_start..line_end`.
    ///
    /// Returns the range to hide: from the end of that line to the end of the region.
    pub fn foldable(&self, state: &EditorState, line_start: usize, line_end: usize) -> Option<FoldRange> {
        let doc = state.doc();
        state.fold_ranges().iter().find_map(|range| {
            let start_line = doc.line_at(range.from);
            (start_line.from == line_start && range.to > line_end).then(|| FoldRange {
                from: line_end,
                to: range.to,
                kind: range.kind.clone(),
            })
        })
    }
}
