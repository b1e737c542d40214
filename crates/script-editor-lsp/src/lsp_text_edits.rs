//! Helpers for LSP `TextEdit` / `WorkspaceEdit` structures.
//!
//! Only the subset needed for quick fixes (`WorkspaceEdit`s attached to diagnostics) and
//! completion `additionalTextEdits` is parsed.

use crate::lsp_sync::{LspRange, range_to_offsets};
use script_editor_core::{ChangeSpec, Document};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A minimal representation of an LSP `TextEdit`.
pub struct LspTextEdit {
    /// The range to replace (UTF-16 based line/character positions).
    pub range: LspRange,
    /// Replacement text (may contain newlines).
    pub new_text: String,
}

impl LspTextEdit {
    /// Parse a `TextEdit`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let range = LspRange::from_value(value.get("range")?)?;
        let new_text = value
            .get("newText")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        Some(Self { range, new_text })
    }
}

/// Parse a JSON array of `TextEdit` values.
pub fn text_edits_from_value(value: &Value) -> Vec<LspTextEdit> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(LspTextEdit::from_value)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

/// Extract all `TextEdit`s in a `WorkspaceEdit` for the given `uri`.
///
/// Handles both:
/// - `workspaceEdit.changes[uri]`
/// - `workspaceEdit.documentChanges[]` containing `TextDocumentEdit`
pub fn workspace_edit_text_edits_for_uri(workspace_edit: &Value, uri: &str) -> Vec<LspTextEdit> {
    let mut out = Vec::<LspTextEdit>::new();

    if let Some(changes) = workspace_edit.get("changes").and_then(Value::as_object)
        && let Some(edits) = changes.get(uri)
    {
        out.extend(text_edits_from_value(edits));
    }

    if let Some(document_changes) = workspace_edit
        .get("documentChanges")
        .and_then(Value::as_array)
    {
        for change in document_changes {
            // Resource operations (create/rename/delete) carry `kind` and no `textDocument`.
            let Some(change_uri) = change
                .get("textDocument")
                .and_then(|doc| doc.get("uri"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if change_uri != uri {
                continue;
            }

            if let Some(edits) = change.get("edits") {
                out.extend(text_edits_from_value(edits));
            }
        }
    }

    out
}

/// Convert text edits into simultaneous changes against `doc`.
///
/// LSP text edits in one batch all refer to the same original document, so no running snapshot
/// is needed. Inverted ranges are reordered.
pub fn text_edits_to_changes(doc: &Document, edits: &[LspTextEdit]) -> Vec<ChangeSpec> {
    edits
        .iter()
        .map(|edit| {
            let (start, end) = range_to_offsets(doc, &edit.range);
            ChangeSpec::replace(start.min(end), start.max(end), edit.new_text.clone())
        })
        .collect()
}
