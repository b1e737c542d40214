//! Derived-state edits.
//!
//! Language integrations never mutate surface state directly. They describe a wholesale
//! replacement as a [`ProcessingEdit`] and attach it to a
//! [`TransactionSpec`](crate::TransactionSpec) as an effect.

use crate::decorations::{Decoration, DecorationLayerId};
use crate::diagnostics::Diagnostic;
use crate::folding::FoldRange;

/// A change to derived editor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingEdit {
    /// Replace the diagnostic set.
    ReplaceDiagnostics {
        /// The complete diagnostic set (char offsets).
        diagnostics: Vec<Diagnostic>,
    },
    /// Clear all diagnostics.
    ClearDiagnostics,
    /// Replace the foldable regions.
    ReplaceFoldRanges {
        /// The complete set of foldable regions.
        ranges: Vec<FoldRange>,
    },
    /// Clear all foldable regions.
    ClearFoldRanges,
    /// Replace an entire decoration layer.
    ReplaceDecorations {
        /// The layer being replaced.
        layer: DecorationLayerId,
        /// The full set of decorations for the layer.
        decorations: Vec<Decoration>,
    },
    /// Clear a decoration layer.
    ClearDecorations {
        /// The layer being cleared.
        layer: DecorationLayerId,
    },
}
