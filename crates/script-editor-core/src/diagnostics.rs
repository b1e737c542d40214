//! Diagnostics data model.
//!
//! Diagnostics are derived state: integrations replace the whole set at once (see
//! [`ProcessingEdit::ReplaceDiagnostics`](crate::ProcessingEdit::ReplaceDiagnostics)), and
//! document edits made in between only shift the stored ranges.

use crate::changes::{Assoc, ChangeSet, ChangeSpec};

/// A half-open character-offset range (`from..to`) in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticRange {
    /// Range start offset (inclusive).
    pub from: usize,
    /// Range end offset (exclusive).
    pub to: usize,
}

impl DiagnosticRange {
    /// Create a new diagnostic range.
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

/// Diagnostic severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    /// Error diagnostics.
    Error,
    /// Warning diagnostics.
    Warning,
    /// Informational diagnostics.
    Info,
    /// Hint diagnostics.
    Hint,
}

impl DiagnosticSeverity {
    /// Lowercase severity name (`"error"`, `"warning"`, `"info"`, `"hint"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }
}

/// A quick fix attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticAction {
    /// Label shown to the user.
    pub name: String,
    /// Simultaneous edits against the current document.
    pub changes: Vec<ChangeSpec>,
}

/// A single diagnostic item for the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Diagnostic range in character offsets.
    pub range: DiagnosticRange,
    /// Diagnostic severity.
    pub severity: DiagnosticSeverity,
    /// Optional diagnostic code (stringified).
    pub code: Option<String>,
    /// Optional diagnostic source (e.g. the server name).
    pub source: Option<String>,
    /// Diagnostic message.
    pub message: String,
    /// Quick fixes offered for this diagnostic.
    pub actions: Vec<DiagnosticAction>,
    /// Optional extra data payload, encoded as JSON text.
    pub data_json: Option<String>,
}

impl Diagnostic {
    /// Create a diagnostic with no code, source, actions or data.
    pub fn new(
        range: DiagnosticRange,
        severity: DiagnosticSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            range,
            severity,
            code: None,
            source: None,
            message: message.into(),
            actions: Vec::new(),
            data_json: None,
        }
    }

    pub(crate) fn map(&self, changes: &ChangeSet) -> Self {
        let from = changes.map_pos(self.range.from, Assoc::After);
        let to = changes.map_pos(self.range.to, Assoc::Before).max(from);

        let actions = self
            .actions
            .iter()
            .map(|action| DiagnosticAction {
                name: action.name.clone(),
                changes: action
                    .changes
                    .iter()
                    .map(|spec| {
                        let from = changes.map_pos(spec.from, Assoc::Before);
                        let to = changes.map_pos(spec.to, Assoc::After).max(from);
                        ChangeSpec::replace(from, to, spec.insert.clone())
                    })
                    .collect(),
            })
            .collect();

        Self {
            range: DiagnosticRange::new(from, to),
            actions,
            ..self.clone()
        }
    }
}
