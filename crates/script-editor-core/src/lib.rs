#![warn(missing_docs)]
//! Script Editor Core - headless editing surface
//!
//! # Overview
//!
//! `script-editor-core` holds the state a language client synchronizes against: a rope-backed
//! [`Document`], structured [`ChangeSet`]s, and an immutable [`EditorState`] updated only through
//! transactions. It does not render anything.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  EditorSurface (dispatch, subscribers)      │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  EditorState / Transaction (versioned)      │  ← State transitions
//! ├─────────────────────────────────────────────┤
//! │  Derived state (diagnostics, folds, decos)  │  ← ProcessingEdit targets
//! ├─────────────────────────────────────────────┤
//! │  ChangeSet (simultaneous regions)           │  ← Edits
//! ├─────────────────────────────────────────────┤
//! │  Document (Rope, 1-based line lookup)       │  ← Text storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use script_editor_core::{ChangeSpec, EditorState, TransactionSpec, UserEvent};
//!
//! let state = EditorState::new("fn main() {}\n");
//! let tr = state
//!     .update(
//!         TransactionSpec::new()
//!             .with_changes([ChangeSpec::insert(11, "\n")])
//!             .with_user_event(UserEvent::Input),
//!     )
//!     .unwrap();
//!
//! assert!(tr.doc_changed());
//! assert_eq!(tr.state().document_version(), 1);
//! assert_eq!(tr.state().doc().lines(), 3);
//! ```
//!
//! # Module Description
//!
//! - [`document`] - rope-backed text with 1-based line lookup
//! - [`changes`] - change specs, change sets and position mapping
//! - [`state`] - editor state, transactions and the editing surface
//! - [`diagnostics`], [`folding`], [`decorations`] - derived-state data model
//! - [`processing`] - wholesale derived-state replacements
//!
//! # Unicode Support
//!
//! All offsets count Unicode scalar values (`char`). UTF-16 conversion for protocol
//! integrations lives in `script-editor-lsp`.

pub mod changes;
pub mod decorations;
pub mod diagnostics;
pub mod document;
pub mod folding;
pub mod processing;
pub mod selection;
pub mod state;

pub use changes::{Assoc, ChangeError, ChangeRegion, ChangeSet, ChangeSpec};
pub use decorations::{
    Decoration, DecorationKind, DecorationLayerId, DecorationPlacement, DecorationRange,
};
pub use diagnostics::{Diagnostic, DiagnosticAction, DiagnosticRange, DiagnosticSeverity};
pub use document::{Document, Line};
pub use folding::FoldRange;
pub use processing::ProcessingEdit;
pub use selection::Selection;
pub use state::{
    EditorState, EditorSurface, Extension, Transaction, TransactionCallback, TransactionSpec,
    UserEvent,
};
