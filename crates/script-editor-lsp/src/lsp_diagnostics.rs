//! Diagnostics synchronizer (`textDocument/publishDiagnostics`).
//!
//! Each push replaces the whole diagnostic set of the active document. Entries whose range maps
//! to `from > to` are dropped.

use crate::lsp_sync::{LspRange, range_to_offsets};
use crate::lsp_text_edits::{text_edits_to_changes, workspace_edit_text_edits_for_uri};
use script_editor_core::processing::ProcessingEdit;
use script_editor_core::{
    Diagnostic, DiagnosticAction, DiagnosticRange, DiagnosticSeverity, Document, EditorState,
    Extension, TransactionSpec,
};
use serde_json::Value;
use tracing::{debug, trace};

/// One diagnostic as sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct LspDiagnostic {
    /// Range.
    pub range: LspRange,
    /// Severity (`None` if the server omitted it).
    pub severity: Option<DiagnosticSeverity>,
    /// Code (numbers are stringified).
    pub code: Option<String>,
    /// Source.
    pub source: Option<String>,
    /// Message.
    pub message: String,
    /// Opaque `data` payload.
    pub data: Option<Value>,
}

impl LspDiagnostic {
    /// Parse a `Diagnostic`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            range: LspRange::from_value(value.get("range")?)?,
            severity: value.get("severity").and_then(severity_from_value),
            code: value.get("code").and_then(|code| match code {
                Value::String(code) => Some(code.clone()),
                Value::Number(code) => Some(code.to_string()),
                _ => None,
            }),
            source: value
                .get("source")
                .and_then(Value::as_str)
                .map(str::to_string),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            data: value.get("data").filter(|data| !data.is_null()).cloned(),
        })
    }
}

/// `PublishDiagnosticsParams`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishDiagnosticsParams {
    /// Document the diagnostics belong to.
    pub uri: String,
    /// Document version the diagnostics were computed for, if reported.
    pub version: Option<i32>,
    /// The full diagnostic set.
    pub diagnostics: Vec<LspDiagnostic>,
}

impl PublishDiagnosticsParams {
    /// Parse notification params. Malformed entries are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            uri: value.get("uri")?.as_str()?.to_string(),
            version: value
                .get("version")
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok()),
            diagnostics: value
                .get("diagnostics")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(LspDiagnostic::from_value).collect())
                .unwrap_or_default(),
        })
    }
}

/// Map an LSP severity: `1..=4` or `"error" | "warning" | "info" | "hint"`.
pub fn severity_from_value(value: &Value) -> Option<DiagnosticSeverity> {
    match value {
        Value::Number(n) => match n.as_u64()? {
            1 => Some(DiagnosticSeverity::Error),
            2 => Some(DiagnosticSeverity::Warning),
            3 => Some(DiagnosticSeverity::Info),
            4 => Some(DiagnosticSeverity::Hint),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "error" => Some(DiagnosticSeverity::Error),
            "warning" => Some(DiagnosticSeverity::Warning),
            "info" | "information" => Some(DiagnosticSeverity::Info),
            "hint" => Some(DiagnosticSeverity::Hint),
            _ => None,
        },
        _ => None,
    }
}

/// Quick fixes declared in `data.codeActions[]`, restricted to edits on `uri`.
fn quick_fixes(doc: &Document, uri: &str, data: Option<&Value>) -> Vec<DiagnosticAction> {
    let Some(actions) = data
        .and_then(|data| data.get("codeActions"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    actions
        .iter()
        .filter_map(|action| {
            let name = action.get("title").and_then(Value::as_str)?;
            let edits = workspace_edit_text_edits_for_uri(action.get("edit")?, uri);
            if edits.is_empty() {
                return None;
            }
            Some(DiagnosticAction {
                name: name.to_string(),
                changes: text_edits_to_changes(doc, &edits),
            })
        })
        .collect()
}

/// Diagnostics integration for one surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticsSupport;

impl DiagnosticsSupport {
    /// A diagnostics integration.
    pub fn new() -> Self {
        Self
    }

    /// The state slots this integration needs.
    pub fn load(&self) -> Vec<Extension> {
        vec![Extension::Diagnostics]
    }

    /// Convert server diagnostics into surface diagnostics, sorted by `from`.
    pub fn convert(&self, doc: &Document, uri: &str, diagnostics: &[LspDiagnostic]) -> Vec<Diagnostic> {
        let mut out = diagnostics
            .iter()
            .filter_map(|diagnostic| {
                let (from, to) = range_to_offsets(doc, &diagnostic.range);
                if from > to {
                    trace!(from, to, message = %diagnostic.message, "dropping inverted diagnostic");
                    return None;
                }
                Some(Diagnostic {
                    range: DiagnosticRange::new(from, to),
                    severity: diagnostic.severity.unwrap_or(DiagnosticSeverity::Error),
                    code: diagnostic.code.clone(),
                    source: diagnostic.source.clone(),
                    message: diagnostic.message.clone(),
                    actions: quick_fixes(doc, uri, diagnostic.data.as_ref()),
                    data_json: diagnostic.data.as_ref().map(Value::to_string),
                })
            })
            .collect::<Vec<_>>();
        out.sort_by_key(|diagnostic| diagnostic.range.from);
        out
    }

    /// The transaction replacing the diagnostic set, or `None` if `params` is for another
    /// document.
    pub fn transaction(
        &self,
        state: &EditorState,
        active_uri: &str,
        params: &PublishDiagnosticsParams,
    ) -> Option<TransactionSpec> {
        if params.uri != active_uri {
            debug!(uri = %params.uri, active = %active_uri, "ignoring diagnostics for another document");
            return None;
        }
        let diagnostics = self.convert(state.doc(), active_uri, &params.diagnostics);
        Some(TransactionSpec::effects([
            ProcessingEdit::ReplaceDiagnostics { diagnostics },
        ]))
    }
}
