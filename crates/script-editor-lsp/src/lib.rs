#![warn(missing_docs)]
//! `script-editor-lsp` - language-client synchronization core for the script editor.
//!
//! This crate keeps a `script_editor_core` editing surface and a language server's view of the
//! same document in sync:
//!
//! - UTF-16 position conversion and change translation in both directions ([`lsp_sync`])
//! - version stamps that keep stale asynchronous results off the surface ([`lsp_version`])
//! - feature integrations: completion, hover, folding, document colors, diagnostics
//! - a markup renderer for hover and completion documentation ([`lsp_markup`])
//! - a [`Connection`] abstraction with a stdio implementation, and the [`LanguageClient`]
//!   orchestrator on top of it
//!
//! # Example
//!
//! ```rust
//! use script_editor_core::{ChangeSpec, EditorState, TransactionSpec};
//! use script_editor_lsp::{LspPosition, offset_to_position, server_changes};
//!
//! let state = EditorState::new("let a = 1;\n");
//! let tr = state
//!     .update(TransactionSpec::new().with_changes([ChangeSpec::insert(11, "a++;")]))
//!     .unwrap();
//!
//! let records = server_changes(tr.start_state().doc(), tr.changes());
//! assert_eq!(records[0].range.unwrap().start, LspPosition::new(1, 0));
//! assert_eq!(offset_to_position(tr.state().doc(), 15), LspPosition::new(1, 4));
//! ```

pub mod error;
pub mod language_client;
pub mod lsp_color;
pub mod lsp_completion;
pub mod lsp_connection;
pub mod lsp_diagnostics;
pub mod lsp_folding;
pub mod lsp_hover;
pub mod lsp_markup;
pub mod lsp_stdio;
pub mod lsp_sync;
pub mod lsp_text_edits;
pub mod lsp_transport;
pub mod lsp_version;
pub mod options;

pub use error::LspError;
pub use language_client::{DrainedPushes, LanguageClient};
pub use lsp_color::{
    ColorInformation, DocumentColorSupport, LspColor, color_information_from_value, css_color,
};
pub use lsp_completion::{
    CompletionApplication, CompletionContext, CompletionOption, CompletionResult,
    CompletionSource, CompletionSupport, CompletionTrigger, CompletionTriggerKind,
    LspCompletionSource, ValidFor, completion_kind_name, completion_result_from_value,
    completion_trigger, snippet_to_plain_text,
};
pub use lsp_connection::{
    Connection, NotificationHandler, NotificationRouter, SourceId, Subscription, TimeoutConnection,
};
pub use lsp_diagnostics::{
    DiagnosticsSupport, LspDiagnostic, PublishDiagnosticsParams, severity_from_value,
};
pub use lsp_folding::{FoldingSupport, LspFoldingRange, folding_ranges_from_value};
pub use lsp_hover::{HoverResult, HoverSource, HoverSupport, LspHoverSource, hover_from_value};
pub use lsp_markup::{
    FileReferenceResolver, MarkupContent, MarkupKind, MarkupRenderer, SchemeResolver, escape_html,
};
pub use lsp_stdio::StdioConnection;
pub use lsp_sync::{
    ContentChange, LspCoordinateConverter, LspPosition, LspRange, apply_content_changes,
    client_changes, offset_to_position, offsets_to_range, position_to_offset, range_to_offsets,
    server_changes,
};
pub use lsp_text_edits::{
    LspTextEdit, text_edits_from_value, text_edits_to_changes, workspace_edit_text_edits_for_uri,
};
pub use lsp_transport::{read_message, write_message};
pub use lsp_version::{DocumentIdentity, VersionStamp, Versioned, document_version};
pub use options::{LanguageClientOptions, ServerCapabilities, TextDocumentSyncKind};
