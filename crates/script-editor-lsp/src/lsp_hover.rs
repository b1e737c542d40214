//! Hover support.

use crate::error::LspError;
use crate::lsp_connection::{Connection, SourceId};
use crate::lsp_markup::MarkupContent;
use crate::lsp_sync::{LspRange, offset_to_position, range_to_offsets};
use async_trait::async_trait;
use script_editor_core::{Document, EditorState};
use serde_json::{Value, json};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// A resolved hover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverResult {
    /// Start of the hovered range.
    pub from: usize,
    /// End of the hovered range.
    pub to: usize,
    /// Hover contents.
    pub contents: MarkupContent,
}

/// A hover provider.
#[async_trait]
pub trait HoverSource: Send + Sync {
    /// Hover information at `pos`. `Ok(None)` means "nothing here".
    async fn hover(&self, state: &EditorState, pos: usize) -> Result<Option<HoverResult>, LspError>;
}

/// Map a `textDocument/hover` response. A missing `range` anchors the hover at `pos`.
pub fn hover_from_value(doc: &Document, value: &Value, pos: usize) -> Option<HoverResult> {
    if value.is_null() {
        return None;
    }
    let contents = MarkupContent::from_value(value.get("contents")?)?;
    if contents.is_empty() {
        return None;
    }

    let (from, to) = match value.get("range").and_then(LspRange::from_value) {
        Some(range) => {
            let (start, end) = range_to_offsets(doc, &range);
            (start.min(end), start.max(end))
        }
        None => (pos, pos),
    };

    Some(HoverResult { from, to, contents })
}

/// The surface's ordered hover providers. The first non-empty result wins.
///
/// Clones share the list.
#[derive(Clone, Default)]
pub struct HoverSupport {
    sources: Arc<Mutex<Vec<(SourceId, Arc<dyn HoverSource>)>>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for HoverSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoverSupport")
            .field("sources", &self.len())
            .finish()
    }
}

impl HoverSupport {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `source`.
    pub fn register(&self, source: Arc<dyn HoverSource>) -> SourceId {
        let id = SourceId::next(&self.next_id);
        if let Ok(mut sources) = self.sources.lock() {
            sources.push((id, source));
        }
        id
    }

    /// Remove the source registered as `id`. Returns `false` if it is not registered.
    pub fn unregister(&self, id: SourceId) -> bool {
        let Ok(mut sources) = self.sources.lock() else {
            return false;
        };
        let before = sources.len();
        sources.retain(|(source_id, _)| *source_id != id);
        sources.len() != before
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Returns `true` if no source is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ask sources in registration order; failing sources are skipped.
    pub async fn get_result(&self, state: &EditorState, pos: usize) -> Option<HoverResult> {
        let sources = self
            .sources
            .lock()
            .map(|sources| {
                sources
                    .iter()
                    .map(|(_, source)| source.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        for source in sources {
            match source.hover(state, pos).await {
                Ok(Some(result)) => return Some(result),
                Ok(None) => {}
                Err(err) => warn!(%err, pos, "hover request failed"),
            }
        }
        None
    }
}

/// The protocol-backed hover provider.
pub struct LspHoverSource {
    connection: Arc<dyn Connection>,
    uri: String,
}

impl fmt::Debug for LspHoverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LspHoverSource")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

impl LspHoverSource {
    /// A provider for the document `uri`.
    pub fn new(connection: Arc<dyn Connection>, uri: impl Into<String>) -> Self {
        Self {
            connection,
            uri: uri.into(),
        }
    }
}

#[async_trait]
impl HoverSource for LspHoverSource {
    async fn hover(&self, state: &EditorState, pos: usize) -> Result<Option<HoverResult>, LspError> {
        let params = json!({
            "textDocument": { "uri": self.uri },
            "position": offset_to_position(state.doc(), pos),
        });
        let response = self
            .connection
            .send_request("textDocument/hover", params)
            .await?;
        Ok(hover_from_value(state.doc(), &response, pos))
    }
}
