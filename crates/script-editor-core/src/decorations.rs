//! Decorations (widgets and marks anchored to document offsets).
//!
//! Decorations never modify the document text. They are grouped in layers so each producer can
//! replace its own set without touching the others.

use crate::changes::{Assoc, ChangeSet};

/// A source/layer identifier for decorations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecorationLayerId(pub u32);

impl DecorationLayerId {
    /// Inline color swatches produced from `textDocument/documentColor`.
    pub const DOCUMENT_COLORS: Self = Self(1);
    /// Range highlights (hover targets, matches).
    pub const HIGHLIGHTS: Self = Self(2);
    /// Token classes produced by a local highlighter.
    pub const SYNTAX: Self = Self(3);

    /// Create a new layer id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// A half-open character-offset range (`from..to`).
///
/// Point-anchored widgets use `from == to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationRange {
    /// Range start offset (inclusive).
    pub from: usize,
    /// Range end offset (exclusive).
    pub to: usize,
}

impl DecorationRange {
    /// Create a new decoration range.
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// A zero-width range at `pos`.
    pub fn point(pos: usize) -> Self {
        Self { from: pos, to: pos }
    }
}

/// Where to render a decoration relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationPlacement {
    /// Render before the anchor.
    Before,
    /// Render after the anchor.
    After,
}

/// A coarse decoration kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DecorationKind {
    /// Inline color swatch; the decoration text holds a CSS color.
    ColorSwatch,
    /// Range highlight.
    Highlight,
    /// A custom, integration-defined kind.
    Custom(u32),
}

/// A single decoration item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    /// Anchor range in character offsets.
    pub range: DecorationRange,
    /// Relative placement.
    pub placement: DecorationPlacement,
    /// A coarse decoration kind.
    pub kind: DecorationKind,
    /// Optional widget text (a CSS color for swatches).
    pub text: Option<String>,
    /// Optional tooltip payload.
    pub tooltip: Option<String>,
    /// Optional integration-specific payload (JSON text).
    pub data_json: Option<String>,
}

impl Decoration {
    pub(crate) fn map(&self, changes: &ChangeSet) -> Self {
        let assoc = match self.placement {
            DecorationPlacement::Before => Assoc::After,
            DecorationPlacement::After => Assoc::Before,
        };
        let from = changes.map_pos(self.range.from, assoc);
        let to = changes.map_pos(self.range.to, assoc).max(from);
        Self {
            range: DecorationRange::new(from, to),
            ..self.clone()
        }
    }
}
