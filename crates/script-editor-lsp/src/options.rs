//! Client configuration and the server capability subset the client relies on.

use crate::error::LspError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Configuration of a [`LanguageClient`](crate::LanguageClient).
///
/// Hosts usually load this from JSON; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageClientOptions {
    /// `languageId` announced in `textDocument/didOpen`; also selects which fenced code blocks the
    /// markup renderer highlights.
    pub language_id: String,
    /// Delay before a completion request is sent.
    pub completion_debounce_ms: u64,
    /// Optional per-request timeout.
    pub request_timeout_ms: Option<u64>,
    /// Re-request folding ranges and document colors after each diagnostics push.
    pub refresh_after_diagnostics: bool,
    /// Optional workspace root sent in `initialize`.
    pub root_uri: Option<String>,
}

impl Default for LanguageClientOptions {
    fn default() -> Self {
        Self {
            language_id: "javascript".to_string(),
            completion_debounce_ms: 100,
            request_timeout_ms: None,
            refresh_after_diagnostics: true,
            root_uri: None,
        }
    }
}

impl LanguageClientOptions {
    /// Parse options from JSON text.
    pub fn from_json(text: &str) -> Result<Self, LspError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Completion debounce as a [`Duration`].
    pub fn completion_debounce(&self) -> Duration {
        Duration::from_millis(self.completion_debounce_ms)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// How the server wants document changes delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDocumentSyncKind {
    /// No change notifications.
    None,
    /// Full text on every change.
    Full,
    /// Incremental `contentChanges`.
    Incremental,
}

impl TextDocumentSyncKind {
    fn from_u64(value: u64) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Full,
            _ => Self::Incremental,
        }
    }
}

/// The capabilities the client consults.
///
/// [`ServerCapabilities::default`] is permissive (every feature on, incremental sync) for hosts
/// that hand over an already initialized connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCapabilities {
    /// Document sync mode.
    pub text_document_sync: TextDocumentSyncKind,
    /// `completionProvider` present.
    pub completion_provider: bool,
    /// `completionProvider.triggerCharacters`.
    pub completion_trigger_characters: Vec<String>,
    /// `hoverProvider` enabled.
    pub hover_provider: bool,
    /// `foldingRangeProvider` enabled.
    pub folding_range_provider: bool,
    /// `colorProvider` enabled.
    pub color_provider: bool,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            text_document_sync: TextDocumentSyncKind::Incremental,
            completion_provider: true,
            completion_trigger_characters: Vec::new(),
            hover_provider: true,
            folding_range_provider: true,
            color_provider: true,
        }
    }
}

fn provider_enabled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => true,
    }
}

impl ServerCapabilities {
    /// Parse the `capabilities` object of an `InitializeResult`.
    pub fn from_value(capabilities: &Value) -> Self {
        let text_document_sync = match capabilities.get("textDocumentSync") {
            Some(Value::Number(kind)) => {
                TextDocumentSyncKind::from_u64(kind.as_u64().unwrap_or(0))
            }
            Some(options @ Value::Object(_)) => options
                .get("change")
                .and_then(Value::as_u64)
                .map(TextDocumentSyncKind::from_u64)
                .unwrap_or(TextDocumentSyncKind::None),
            _ => TextDocumentSyncKind::None,
        };

        let completion = capabilities.get("completionProvider");
        let completion_trigger_characters = completion
            .and_then(|c| c.get("triggerCharacters"))
            .and_then(Value::as_array)
            .map(|chars| {
                chars
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            text_document_sync,
            completion_provider: provider_enabled(completion),
            completion_trigger_characters,
            hover_provider: provider_enabled(capabilities.get("hoverProvider")),
            folding_range_provider: provider_enabled(capabilities.get("foldingRangeProvider")),
            color_provider: provider_enabled(capabilities.get("colorProvider")),
        }
    }
}
