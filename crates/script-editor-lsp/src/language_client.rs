//! The language client: binds one document of an editing surface to a language server.
//!
//! Lifecycle: `Unbound → Bound → Unbound`.
//!
//! - [`LanguageClient::bind`] subscribes to `textDocument/publishDiagnostics` and installs the
//!   protocol-backed completion/hover providers into the surface's registries.
//! - [`LanguageClient::unbind`] undoes both; calling it again is a no-op.
//!
//! The client never owns the surface. Hosts hand it transactions ([`LanguageClient::did_change`])
//! and let it apply queued server pushes ([`LanguageClient::drain_notifications`]). The follow-up
//! refresh runs on a snapshot, so the surface stays editable while it is in flight:
//!
//! ```ignore
//! let drained = client.drain_notifications(&mut surface)?;
//! if let Some(state) = drained.refresh {
//!     let updates = client.refresh(&state).await;
//!     client.apply_updates(&mut surface, updates)?;
//! }
//! ```
//!
//! [`LanguageClientOptions::request_timeout_ms`] wraps the connection in a
//! [`TimeoutConnection`], so every request the client and its providers send is bounded.

use crate::error::LspError;
use crate::lsp_color::{DocumentColorSupport, color_information_from_value};
use crate::lsp_completion::{CompletionSupport, LspCompletionSource};
use crate::lsp_connection::{Connection, SourceId, Subscription, TimeoutConnection};
use crate::lsp_diagnostics::{DiagnosticsSupport, PublishDiagnosticsParams};
use crate::lsp_folding::{FoldingSupport, folding_ranges_from_value};
use crate::lsp_hover::{HoverSupport, LspHoverSource};
use crate::lsp_markup::MarkupRenderer;
use crate::lsp_sync::{ContentChange, server_changes};
use crate::lsp_version::{DocumentIdentity, Versioned};
use crate::options::{LanguageClientOptions, ServerCapabilities, TextDocumentSyncKind};
use script_editor_core::{EditorState, EditorSurface, Extension, Transaction, TransactionSpec};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";

struct Binding {
    subscription: Subscription,
    completion: CompletionSupport,
    completion_id: Option<SourceId>,
    hover: HoverSupport,
    hover_id: Option<SourceId>,
}

/// A language client for one document.
pub struct LanguageClient {
    connection: Arc<dyn Connection>,
    options: LanguageClientOptions,
    capabilities: ServerCapabilities,
    identity: DocumentIdentity,
    renderer: Arc<MarkupRenderer>,
    diagnostics: DiagnosticsSupport,
    folding: FoldingSupport,
    colors: DocumentColorSupport,
    pushes_tx: mpsc::UnboundedSender<PublishDiagnosticsParams>,
    pushes_rx: mpsc::UnboundedReceiver<PublishDiagnosticsParams>,
    binding: Option<Binding>,
}

impl fmt::Debug for LanguageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageClient")
            .field("identity", &self.identity)
            .field("capabilities", &self.capabilities)
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}

impl LanguageClient {
    /// A client for the document `uri`, assuming [`ServerCapabilities::default`].
    ///
    /// With a request timeout configured, `connection` is wrapped in a [`TimeoutConnection`].
    pub fn new(
        connection: Arc<dyn Connection>,
        uri: impl Into<String>,
        options: LanguageClientOptions,
    ) -> Self {
        let (pushes_tx, pushes_rx) = mpsc::unbounded_channel();
        let connection: Arc<dyn Connection> = match options.request_timeout() {
            Some(timeout) => Arc::new(TimeoutConnection::new(connection, timeout)),
            None => connection,
        };
        let renderer = Arc::new(MarkupRenderer::new(options.language_id.clone()));
        Self {
            connection,
            capabilities: ServerCapabilities::default(),
            identity: DocumentIdentity::new(uri, 0),
            renderer,
            diagnostics: DiagnosticsSupport::new(),
            folding: FoldingSupport::new(),
            colors: DocumentColorSupport::new(),
            pushes_tx,
            pushes_rx,
            binding: None,
            options,
        }
    }

    /// Use already negotiated capabilities instead of calling [`LanguageClient::initialize`].
    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Render hover/completion markup with `renderer`.
    pub fn with_renderer(mut self, renderer: MarkupRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// The synchronization target.
    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    /// Negotiated server capabilities.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Client options.
    pub fn options(&self) -> &LanguageClientOptions {
        &self.options
    }

    /// The markup renderer shared with the providers.
    pub fn renderer(&self) -> &Arc<MarkupRenderer> {
        &self.renderer
    }

    /// The state slots the client's integrations need (diagnostics, folds, color swatches).
    pub fn extensions(&self) -> Vec<Extension> {
        let mut extensions = self.diagnostics.load();
        extensions.extend(self.folding.load());
        extensions.extend(self.colors.load());
        extensions
    }

    /// `initialize` handshake, then `initialized`.
    pub async fn initialize(&mut self) -> Result<&ServerCapabilities, LspError> {
        let params = json!({
            "processId": Value::Null,
            "rootUri": self.options.root_uri,
            "capabilities": {
                "textDocument": {
                    "synchronization": { "dynamicRegistration": false, "didSave": false },
                    "completion": {
                        "contextSupport": true,
                        "completionItem": {
                            "snippetSupport": false,
                            "documentationFormat": ["markdown", "plaintext"],
                            "labelDetailsSupport": true,
                        },
                    },
                    "hover": { "contentFormat": ["markdown", "plaintext"] },
                    "foldingRange": { "lineFoldingOnly": true },
                    "colorProvider": {},
                    "publishDiagnostics": { "versionSupport": true },
                },
            },
        });

        let result = self.connection.send_request("initialize", params).await?;
        let capabilities = result
            .get("capabilities")
            .ok_or_else(|| LspError::InvalidMessage("initialize result without capabilities".to_string()))?;
        self.capabilities = ServerCapabilities::from_value(capabilities);
        debug!(capabilities = ?self.capabilities, "language server initialized");

        self.connection.send_notification("initialized", json!({}))?;
        Ok(&self.capabilities)
    }

    /// Returns `true` while bound.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Subscribe to diagnostics pushes and install this client's providers.
    ///
    /// Binding again first unbinds.
    pub fn bind(&mut self, completion: &CompletionSupport, hover: &HoverSupport) {
        self.unbind();

        let pushes = self.pushes_tx.clone();
        let subscription = self.connection.on_notification(
            PUBLISH_DIAGNOSTICS,
            Arc::new(move |params: &Value| match PublishDiagnosticsParams::from_value(params) {
                Some(params) => {
                    if pushes.send(params).is_err() {
                        trace!("client dropped; ignoring diagnostics push");
                    }
                }
                None => warn!("malformed publishDiagnostics params"),
            }),
        );

        let completion_id = self.capabilities.completion_provider.then(|| {
            completion.register(Arc::new(LspCompletionSource::new(
                self.connection.clone(),
                self.identity.uri.clone(),
                self.capabilities.completion_trigger_characters.clone(),
                self.renderer.clone(),
            )))
        });
        let hover_id = self.capabilities.hover_provider.then(|| {
            hover.register(Arc::new(LspHoverSource::new(
                self.connection.clone(),
                self.identity.uri.clone(),
            )))
        });

        debug!(uri = %self.identity.uri, "language client bound");
        self.binding = Some(Binding {
            subscription,
            completion: completion.clone(),
            completion_id,
            hover: hover.clone(),
            hover_id,
        });
    }

    /// Dispose the diagnostics subscription and remove this client's providers.
    pub fn unbind(&mut self) {
        let Some(mut binding) = self.binding.take() else {
            return;
        };
        binding.subscription.dispose();
        if let Some(id) = binding.completion_id {
            binding.completion.unregister(id);
        }
        if let Some(id) = binding.hover_id {
            binding.hover.unregister(id);
        }
        debug!(uri = %self.identity.uri, "language client unbound");
    }

    /// `textDocument/didOpen` with the state's text and version.
    pub fn did_open(&mut self, state: &EditorState) -> Result<(), LspError> {
        self.identity.version = state.document_version();
        self.connection.send_notification(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": self.identity.uri,
                    "languageId": self.options.language_id,
                    "version": self.identity.version,
                    "text": state.doc().to_string(),
                },
            }),
        )
    }

    /// `textDocument/didChange` for a transaction. Transactions without document changes are
    /// ignored.
    pub fn did_change(&mut self, transaction: &Transaction) -> Result<(), LspError> {
        if !transaction.doc_changed() {
            return Ok(());
        }
        self.identity.version = transaction.state().document_version();

        let content_changes = match self.capabilities.text_document_sync {
            TextDocumentSyncKind::None => return Ok(()),
            TextDocumentSyncKind::Full => {
                vec![ContentChange::full(transaction.state().doc().to_string())]
            }
            TextDocumentSyncKind::Incremental => {
                server_changes(transaction.start_state().doc(), transaction.changes())
            }
        };

        trace!(
            uri = %self.identity.uri,
            version = self.identity.version,
            records = content_changes.len(),
            "didChange"
        );
        self.connection.send_notification(
            "textDocument/didChange",
            json!({
                "textDocument": self.identity.versioned_text_document(),
                "contentChanges": content_changes,
            }),
        )
    }

    /// `textDocument/didClose`.
    pub fn did_close(&mut self) -> Result<(), LspError> {
        self.connection.send_notification(
            "textDocument/didClose",
            json!({ "textDocument": self.identity.text_document() }),
        )
    }

    fn fetcher(&self) -> FeatureFetcher {
        FeatureFetcher {
            connection: self.connection.clone(),
            uri: self.identity.uri.clone(),
            folding_enabled: self.capabilities.folding_range_provider,
            colors_enabled: self.capabilities.color_provider,
            folding: self.folding,
            colors: self.colors,
        }
    }

    /// Request folding ranges for `state`. Failures degrade to `None`.
    pub async fn fetch_folding(&self, state: &EditorState) -> Option<Versioned<TransactionSpec>> {
        self.fetcher().folding(state).await
    }

    /// Request document colors for `state`. Failures degrade to `None`.
    pub async fn fetch_colors(&self, state: &EditorState) -> Option<Versioned<TransactionSpec>> {
        self.fetcher().colors(state).await
    }

    /// Re-request folding ranges and document colors for a snapshot of `state`.
    ///
    /// The returned future borrows neither the client nor the surface, so edits and
    /// `didChange` notifications can go through while it is pending. Pass the result to
    /// [`LanguageClient::apply_updates`], which drops it if the document moved on.
    pub fn refresh(
        &self,
        state: &EditorState,
    ) -> impl Future<Output = Vec<Versioned<TransactionSpec>>> + Send + use<> {
        let fetcher = self.fetcher();
        let state = state.clone();
        async move {
            let (folding, colors) = tokio::join!(fetcher.folding(&state), fetcher.colors(&state));
            folding.into_iter().chain(colors).collect()
        }
    }

    /// Dispatch the updates that are still current; stale ones are dropped.
    ///
    /// Returns the number of updates applied.
    pub fn apply_updates(
        &self,
        surface: &mut EditorSurface,
        updates: Vec<Versioned<TransactionSpec>>,
    ) -> Result<usize, LspError> {
        let mut applied = 0;
        for update in updates {
            if let Some(spec) = update.into_current(surface.state()) {
                surface.dispatch(spec)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Replace the surface's diagnostics with a push. Returns `false` for other documents.
    pub fn handle_publish_diagnostics(
        &self,
        surface: &mut EditorSurface,
        params: &PublishDiagnosticsParams,
    ) -> Result<bool, LspError> {
        let Some(spec) = self
            .diagnostics
            .transaction(surface.state(), &self.identity.uri, params)
        else {
            return Ok(false);
        };
        surface.dispatch(spec)?;
        debug!(
            uri = %params.uri,
            count = surface.state().diagnostics().len(),
            "diagnostics replaced"
        );
        Ok(true)
    }

    /// Apply queued diagnostics pushes.
    ///
    /// When at least one push was applied and refreshing is enabled, the result carries the
    /// snapshot to hand to [`LanguageClient::refresh`].
    pub fn drain_notifications(
        &mut self,
        surface: &mut EditorSurface,
    ) -> Result<DrainedPushes, LspError> {
        let mut applied = 0;
        while let Ok(params) = self.pushes_rx.try_recv() {
            if self.handle_publish_diagnostics(surface, &params)? {
                applied += 1;
            }
        }

        let refresh = (applied > 0 && self.options.refresh_after_diagnostics)
            .then(|| surface.state().clone());
        Ok(DrainedPushes { applied, refresh })
    }
}

/// The outcome of [`LanguageClient::drain_notifications`].
#[derive(Debug, Clone)]
pub struct DrainedPushes {
    /// Number of diagnostics pushes applied to the surface.
    pub applied: usize,
    /// The state to re-request folding ranges and colors for, if a refresh is due.
    pub refresh: Option<EditorState>,
}

#[derive(Clone)]
struct FeatureFetcher {
    connection: Arc<dyn Connection>,
    uri: String,
    folding_enabled: bool,
    colors_enabled: bool,
    folding: FoldingSupport,
    colors: DocumentColorSupport,
}

impl FeatureFetcher {
    async fn folding(&self, state: &EditorState) -> Option<Versioned<TransactionSpec>> {
        if !self.folding_enabled {
            return None;
        }
        let issued = Versioned::new(state, ());
        let response = self
            .connection
            .send_request(
                "textDocument/foldingRange",
                json!({ "textDocument": { "uri": self.uri } }),
            )
            .await;

        match response {
            Ok(value) => {
                let ranges = folding_ranges_from_value(&value);
                Some(issued.map(|()| self.folding.set_foldables(state, &ranges)))
            }
            Err(err) => {
                warn!(%err, uri = %self.uri, "folding range request failed");
                None
            }
        }
    }

    async fn colors(&self, state: &EditorState) -> Option<Versioned<TransactionSpec>> {
        if !self.colors_enabled {
            return None;
        }
        let issued = Versioned::new(state, ());
        let response = self
            .connection
            .send_request(
                "textDocument/documentColor",
                json!({ "textDocument": { "uri": self.uri } }),
            )
            .await;

        match response {
            Ok(value) => {
                let infos = color_information_from_value(&value);
                Some(issued.map(|()| self.colors.set_colors(state, &infos)))
            }
            Err(err) => {
                warn!(%err, uri = %self.uri, "document color request failed");
                None
            }
        }
    }
}

impl Drop for LanguageClient {
    fn drop(&mut self) {
        self.unbind();
    }
}
