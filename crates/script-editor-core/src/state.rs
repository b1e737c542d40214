//! Editor state and transactions.
//!
//! # Overview
//!
//! [`EditorState`] is an immutable snapshot: the document, the primary selection, the document
//! version and the derived-state slots (diagnostics, foldable regions, decoration layers).
//! A new state is only ever produced by [`EditorState::update`], which applies a
//! [`TransactionSpec`] and returns a [`Transaction`] holding both the start and the resulting
//! state.
//!
//! [`EditorSurface`] is the mutable container around the current state. It dispatches
//! transactions, notifies subscribers and broadcasts the document version on a
//! [`tokio::sync::watch`] channel so pending asynchronous work can notice edits.
//!
//! # Example
//!
//! ```rust
//! use script_editor_core::{ChangeSpec, EditorState, EditorSurface, TransactionSpec};
//!
//! let state = EditorState::new("Hello").with_document_version(3);
//! let mut surface = EditorSurface::new(state);
//!
//! surface
//!     .dispatch(TransactionSpec::new().with_changes([ChangeSpec::insert(5, "!")]))
//!     .unwrap();
//!
//! assert_eq!(surface.state().doc().to_string(), "Hello!");
//! assert_eq!(surface.state().document_version(), 4);
//! ```

use crate::changes::{ChangeError, ChangeSet, ChangeSpec};
use crate::decorations::{Decoration, DecorationLayerId};
use crate::diagnostics::Diagnostic;
use crate::document::Document;
use crate::folding::FoldRange;
use crate::processing::ProcessingEdit;
use crate::selection::Selection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// A derived-state slot a feature integration asks the state to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// The diagnostic set.
    Diagnostics,
    /// Foldable regions.
    FoldRanges,
    /// A decoration layer.
    DecorationLayer(DecorationLayerId),
}

/// The user action that produced a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// Typing or pasting text.
    Input,
    /// Deleting text.
    Delete,
    /// Undo.
    Undo,
    /// Redo.
    Redo,
    /// Selection-only change.
    Select,
    /// Any other, integration-defined event.
    Other(String),
}

impl UserEvent {
    /// Returns `true` for text insertion events.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input)
    }
}

/// Describes a state transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSpec {
    /// Simultaneous document changes against the start document.
    pub changes: Vec<ChangeSpec>,
    /// New selection in resulting-document offsets (mapped from the old one if absent).
    pub selection: Option<Selection>,
    /// Derived-state replacements applied after the document changes.
    pub effects: Vec<ProcessingEdit>,
    /// The user action behind this transaction.
    pub user_event: Option<UserEvent>,
}

impl TransactionSpec {
    /// An empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// A spec carrying only derived-state effects.
    pub fn effects(effects: impl IntoIterator<Item = ProcessingEdit>) -> Self {
        Self {
            effects: effects.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A spec built from *sequential* changes (each relative to the result of the previous one).
    pub fn sequential(doc: &Document, changes: &[ChangeSpec]) -> Result<Self, ChangeError> {
        Ok(Self {
            changes: ChangeSet::from_sequential(doc, changes)?.to_specs(),
            ..Self::default()
        })
    }

    /// Set the document changes.
    pub fn with_changes(mut self, changes: impl IntoIterator<Item = ChangeSpec>) -> Self {
        self.changes = changes.into_iter().collect();
        self
    }

    /// Set the resulting selection.
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Append a derived-state effect.
    pub fn with_effect(mut self, effect: ProcessingEdit) -> Self {
        self.effects.push(effect);
        self
    }

    /// Tag the transaction with a user event.
    pub fn with_user_event(mut self, event: UserEvent) -> Self {
        self.user_event = Some(event);
        self
    }
}

/// Immutable editor state snapshot.
#[derive(Debug, Clone)]
pub struct EditorState {
    doc: Document,
    selection: Selection,
    version: i32,
    last_user_event: Option<UserEvent>,
    extensions: Arc<[Extension]>,
    diagnostics: Arc<Vec<Diagnostic>>,
    fold_ranges: Arc<Vec<FoldRange>>,
    decorations: Arc<BTreeMap<DecorationLayerId, Arc<Vec<Decoration>>>>,
}

impl EditorState {
    /// Create a state for `doc` with the cursor at the start, version 0 and no extensions.
    pub fn new(doc: impl Into<Document>) -> Self {
        Self {
            doc: doc.into(),
            selection: Selection::default(),
            version: 0,
            last_user_event: None,
            extensions: Arc::from(Vec::new()),
            diagnostics: Arc::new(Vec::new()),
            fold_ranges: Arc::new(Vec::new()),
            decorations: Arc::new(BTreeMap::new()),
        }
    }

    /// Add derived-state slots. Duplicates are ignored.
    pub fn with_extensions(mut self, extensions: impl IntoIterator<Item = Extension>) -> Self {
        let mut all = self.extensions.to_vec();
        for extension in extensions {
            if !all.contains(&extension) {
                all.push(extension);
            }
        }
        self.extensions = Arc::from(all);
        self
    }

    /// Set the starting document version.
    pub fn with_document_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Set the selection (clamped to the document).
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection.clamp(self.doc.len());
        self
    }

    /// The document.
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// The primary selection.
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The document version: the starting version plus one per document-changing transaction.
    pub fn document_version(&self) -> i32 {
        self.version
    }

    /// The user event of the most recent transaction that carried one or changed the document.
    pub fn last_user_event(&self) -> Option<&UserEvent> {
        self.last_user_event.as_ref()
    }

    /// Returns `true` if the slot was loaded.
    pub fn has_extension(&self, extension: Extension) -> bool {
        self.extensions.contains(&extension)
    }

    /// Current diagnostics, sorted by start offset.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Current foldable regions.
    pub fn fold_ranges(&self) -> &[FoldRange] {
        &self.fold_ranges
    }

    /// Decorations of a layer (empty if the layer holds nothing).
    pub fn decorations(&self, layer: DecorationLayerId) -> &[Decoration] {
        self.decorations
            .get(&layer)
            .map(|decorations| decorations.as_slice())
            .unwrap_or(&[])
    }

    /// Apply a spec and return the resulting transaction.
    ///
    /// The start state is left untouched. The version increases by one exactly when the
    /// document changes.
    pub fn update(&self, spec: TransactionSpec) -> Result<Transaction, ChangeError> {
        let changes = ChangeSet::of(self.doc.len(), spec.changes)?;
        let mut next = self.clone();

        if !changes.is_empty() {
            next.doc = changes.apply(&self.doc);
            next.version = self.version.wrapping_add(1);
            next.selection = self.selection.map(&changes);
            next.map_derived(&changes);
        }

        if let Some(selection) = spec.selection {
            next.selection = selection.clamp(next.doc.len());
        }

        if spec.user_event.is_some() || !changes.is_empty() {
            next.last_user_event = spec.user_event.clone();
        }

        for effect in spec.effects {
            next.apply_effect(effect);
        }

        Ok(Transaction {
            start_state: self.clone(),
            state: next,
            changes,
            user_event: spec.user_event,
        })
    }

    fn map_derived(&mut self, changes: &ChangeSet) {
        if !self.diagnostics.is_empty() {
            self.diagnostics = Arc::new(self.diagnostics.iter().map(|d| d.map(changes)).collect());
        }
        if !self.fold_ranges.is_empty() {
            self.fold_ranges = Arc::new(
                self.fold_ranges
                    .iter()
                    .map(|range| range.map(changes))
                    .filter(|range| range.from < range.to)
                    .collect(),
            );
        }
        if !self.decorations.is_empty() {
            self.decorations = Arc::new(
                self.decorations
                    .iter()
                    .map(|(layer, decorations)| {
                        let mapped = decorations.iter().map(|d| d.map(changes)).collect();
                        (*layer, Arc::new(mapped))
                    })
                    .collect(),
            );
        }
    }

    fn apply_effect(&mut self, effect: ProcessingEdit) {
        match effect {
            ProcessingEdit::ReplaceDiagnostics { mut diagnostics } => {
                if self.require(Extension::Diagnostics) {
                    diagnostics.sort_by_key(|d| (d.range.from, d.range.to));
                    self.diagnostics = Arc::new(diagnostics);
                }
            }
            ProcessingEdit::ClearDiagnostics => {
                if self.require(Extension::Diagnostics) {
                    self.diagnostics = Arc::new(Vec::new());
                }
            }
            ProcessingEdit::ReplaceFoldRanges { ranges } => {
                if self.require(Extension::FoldRanges) {
                    self.fold_ranges = Arc::new(ranges);
                }
            }
            ProcessingEdit::ClearFoldRanges => {
                if self.require(Extension::FoldRanges) {
                    self.fold_ranges = Arc::new(Vec::new());
                }
            }
            ProcessingEdit::ReplaceDecorations {
                layer,
                mut decorations,
            } => {
                if self.require(Extension::DecorationLayer(layer)) {
                    decorations.sort_by_key(|d| (d.range.from, d.range.to));
                    Arc::make_mut(&mut self.decorations).insert(layer, Arc::new(decorations));
                }
            }
            ProcessingEdit::ClearDecorations { layer } => {
                if self.require(Extension::DecorationLayer(layer)) {
                    Arc::make_mut(&mut self.decorations).remove(&layer);
                }
            }
        }
    }

    fn require(&self, extension: Extension) -> bool {
        let loaded = self.has_extension(extension);
        if !loaded {
            debug!(?extension, "ignoring effect for a slot that was never loaded");
        }
        loaded
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

/// The result of [`EditorState::update`].
#[derive(Debug, Clone)]
pub struct Transaction {
    start_state: EditorState,
    state: EditorState,
    changes: ChangeSet,
    user_event: Option<UserEvent>,
}

impl Transaction {
    /// The state the transaction was applied to.
    pub fn start_state(&self) -> &EditorState {
        &self.start_state
    }

    /// The resulting state.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Document changes, relative to the start document.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Returns `true` if the document changed.
    pub fn doc_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    /// The user event the transaction was tagged with.
    pub fn user_event(&self) -> Option<&UserEvent> {
        self.user_event.as_ref()
    }
}

/// Transaction callback function type.
pub type TransactionCallback = Box<dyn FnMut(&Transaction) + Send>;

/// Mutable container holding the current [`EditorState`].
///
/// - **Dispatch**: every state change goes through [`EditorSurface::dispatch`]
/// - **Change Notifications**: subscribers see each transaction after it is applied
/// - **Version Broadcast**: [`EditorSurface::version_receiver`] observes the document version
pub struct EditorSurface {
    state: EditorState,
    version_tx: watch::Sender<i32>,
    callbacks: Vec<TransactionCallback>,
}

impl EditorSurface {
    /// Wrap a state.
    pub fn new(state: EditorState) -> Self {
        let (version_tx, _) = watch::channel(state.document_version());
        Self {
            state,
            version_tx,
            callbacks: Vec::new(),
        }
    }

    /// The current state.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Apply a spec to the current state, then notify subscribers.
    pub fn dispatch(&mut self, spec: TransactionSpec) -> Result<Transaction, ChangeError> {
        let transaction = self.state.update(spec)?;
        self.state = transaction.state().clone();

        if transaction.doc_changed() {
            trace!(
                version = self.state.document_version(),
                regions = transaction.changes().regions().len(),
                "document changed"
            );
            self.version_tx.send_replace(self.state.document_version());
        }

        for callback in &mut self.callbacks {
            callback(&transaction);
        }
        Ok(transaction)
    }

    /// Apply derived-state edits in one transaction.
    pub fn apply_processing_edits<I>(&mut self, edits: I) -> Result<Transaction, ChangeError>
    where
        I: IntoIterator<Item = ProcessingEdit>,
    {
        self.dispatch(TransactionSpec::effects(edits))
    }

    /// Subscribe to transactions.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&Transaction) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// A receiver that observes the document version.
    pub fn version_receiver(&self) -> watch::Receiver<i32> {
        self.version_tx.subscribe()
    }
}

impl std::fmt::Debug for EditorSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSurface")
            .field("state", &self.state)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticRange, DiagnosticSeverity};
    use std::sync::Mutex;

    #[test]
    fn test_version_increments_only_on_doc_change() {
        let state = EditorState::new("abc").with_document_version(7);

        let tr = state
            .update(TransactionSpec::new().with_selection(Selection::cursor(2)))
            .unwrap();
        assert!(!tr.doc_changed());
        assert_eq!(tr.state().document_version(), 7);

        let tr = tr
            .state()
            .update(TransactionSpec::new().with_changes([ChangeSpec::delete(0, 1)]))
            .unwrap();
        assert_eq!(tr.state().document_version(), 8);
        assert_eq!(tr.start_state().document_version(), 7);
    }

    #[test]
    fn test_effects_require_loaded_slot() {
        let diagnostic = Diagnostic::new(
            DiagnosticRange::new(0, 1),
            DiagnosticSeverity::Error,
            "boom",
        );
        let effect = ProcessingEdit::ReplaceDiagnostics {
            diagnostics: vec![diagnostic],
        };

        let bare = EditorState::new("abc");
        let tr = bare.update(TransactionSpec::effects([effect.clone()])).unwrap();
        assert!(tr.state().diagnostics().is_empty());

        let loaded = EditorState::new("abc").with_extensions([Extension::Diagnostics]);
        let tr = loaded.update(TransactionSpec::effects([effect])).unwrap();
        assert_eq!(tr.state().diagnostics().len(), 1);
    }

    #[test]
    fn test_diagnostics_follow_edits() {
        let state = EditorState::new("let x = 1;")
            .with_extensions([Extension::Diagnostics])
            .update(TransactionSpec::effects([ProcessingEdit::ReplaceDiagnostics {
                diagnostics: vec![Diagnostic::new(
                    DiagnosticRange::new(4, 5),
                    DiagnosticSeverity::Warning,
                    "unused",
                )],
            }]))
            .unwrap()
            .state()
            .clone();

        let tr = state
            .update(TransactionSpec::new().with_changes([ChangeSpec::insert(0, "  ")]))
            .unwrap();
        assert_eq!(tr.state().diagnostics()[0].range, DiagnosticRange::new(6, 7));
    }

    #[test]
    fn test_surface_notifies_and_broadcasts_version() {
        let mut surface = EditorSurface::new(EditorState::new("x"));
        let rx = surface.version_receiver();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        surface.subscribe(move |tr| {
            seen_clone
                .lock()
                .unwrap()
                .push(tr.state().document_version());
        });

        surface
            .dispatch(
                TransactionSpec::new()
                    .with_changes([ChangeSpec::insert(1, "y")])
                    .with_user_event(UserEvent::Input),
            )
            .unwrap();

        assert_eq!(*rx.borrow(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(
            surface.state().last_user_event(),
            Some(&UserEvent::Input)
        );
    }
}
