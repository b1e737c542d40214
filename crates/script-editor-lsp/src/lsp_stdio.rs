//! JSON-RPC/LSP connection over a pair of byte streams (usually a server's stdio).
//!
//! Two background threads own the streams:
//!
//! - the writer drains an outbound queue and frames each message
//! - the reader routes responses to their pending requests, notifications to the
//!   [`NotificationRouter`], and answers server-to-client requests with safe defaults
//!
//! Callers only see the async [`Connection`] API.

use crate::error::LspError;
use crate::lsp_connection::{Connection, NotificationHandler, NotificationRouter, Subscription};
use crate::lsp_transport::{
    json_rpc_error_response, json_rpc_notification, json_rpc_request, json_rpc_response,
    read_message, response_result, write_message,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, LspError>>>>>;

/// A [`Connection`] backed by framed byte streams.
pub struct StdioConnection {
    child: Mutex<Option<Child>>,
    outbound: mpsc::Sender<Value>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    router: NotificationRouter,
    next_id: AtomicU64,
    request_timeout: Option<Duration>,
}

impl StdioConnection {
    /// Spawn a language server process and connect via its stdio.
    ///
    /// Notes:
    /// - This overrides `stdin` / `stdout` to be piped.
    /// - Callers may configure `stderr` before passing `cmd`.
    pub fn spawn(mut cmd: ProcessCommand, workspace_folders: Vec<Value>) -> Result<Self, LspError> {
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        let child = cmd.spawn()?;
        Self::from_child(child, workspace_folders)
    }

    /// Create a connection from an already-spawned process child.
    pub fn from_child(mut child: Child, workspace_folders: Vec<Value>) -> Result<Self, LspError> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("failed to open server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to open server stdout"))?;

        let connection = Self::from_streams(stdout, stdin, workspace_folders);
        if let Ok(mut slot) = connection.child.lock() {
            *slot = Some(child);
        }
        Ok(connection)
    }

    /// Create a connection over arbitrary streams: `reader` carries server output, `writer`
    /// server input.
    pub fn from_streams<R, W>(reader: R, writer: W, workspace_folders: Vec<Value>) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel::<Value>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let router = NotificationRouter::new();

        thread::spawn(move || write_loop(writer, outbound_rx));
        {
            let reader_state = ReaderState {
                pending: pending.clone(),
                closed: closed.clone(),
                router: router.clone(),
                outbound: outbound.clone(),
                workspace_folders,
            };
            thread::spawn(move || read_loop(reader, reader_state));
        }

        Self {
            child: Mutex::new(None),
            outbound,
            pending,
            closed,
            router,
            next_id: AtomicU64::new(1),
            request_timeout: None,
        }
    }

    /// Fail requests that get no response within `timeout`.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns `true` once the server's output stream ended.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Orderly shutdown: `shutdown` request, then the `exit` notification.
    pub async fn shutdown(&self) -> Result<(), LspError> {
        self.send_request("shutdown", Value::Null).await?;
        self.send_notification("exit", Value::Null)?;

        let child = self.child.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut child) = child {
            // The server exits on its own after `exit`; reap it without blocking if it has.
            match child.try_wait() {
                Ok(Some(status)) => debug!(%status, "language server exited"),
                Ok(None) => debug!("language server still running after exit"),
                Err(err) => warn!(%err, "failed to query language server status"),
            }
        }
        Ok(())
    }

    fn send_message(&self, message: Value) -> Result<(), LspError> {
        self.outbound
            .send(message)
            .map_err(|_| LspError::ConnectionClosed)
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

#[async_trait]
impl Connection for StdioConnection {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, LspError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        self.pending
            .lock()
            .map_err(|_| LspError::ConnectionClosed)?
            .insert(id, tx);
        if self.is_closed() {
            self.forget(id);
            return Err(LspError::ConnectionClosed);
        }

        trace!(id, method, "sending request");
        if let Err(err) = self.send_message(json_rpc_request(id, method, params)) {
            self.forget(id);
            return Err(err);
        }

        let response = match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(response) => response,
                Err(_) => {
                    self.forget(id);
                    return Err(LspError::Timeout {
                        method: method.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => rx.await,
        };

        response.map_err(|_| LspError::ConnectionClosed)?
    }

    fn send_notification(&self, method: &str, params: Value) -> Result<(), LspError> {
        trace!(method, "sending notification");
        self.send_message(json_rpc_notification(method, params))
    }

    fn on_notification(&self, method: &str, handler: NotificationHandler) -> Subscription {
        self.router.subscribe(method, handler)
    }
}

impl std::fmt::Debug for StdioConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioConnection")
            .field("closed", &self.is_closed())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

struct ReaderState {
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    router: NotificationRouter,
    outbound: mpsc::Sender<Value>,
    workspace_folders: Vec<Value>,
}

impl ReaderState {
    fn route(&self, msg: Value) {
        let method = msg.get("method").and_then(Value::as_str);
        let id = msg.get("id");

        match (method, id) {
            (Some(method), Some(id)) => {
                let reply = server_request_reply(method, &msg, id.clone(), &self.workspace_folders);
                if self.outbound.send(reply).is_err() {
                    debug!(method, "writer stopped; dropping reply");
                }
            }
            (Some(method), None) => {
                let params = msg.get("params").cloned().unwrap_or(Value::Null);
                if self.router.dispatch(method, &params) == 0 {
                    trace!(method, "unhandled notification");
                }
            }
            (None, Some(id)) => {
                let Some(id) = id.as_u64() else {
                    warn!(%id, "response with a non-numeric id");
                    return;
                };
                let sender = self
                    .pending
                    .lock()
                    .ok()
                    .and_then(|mut pending| pending.remove(&id));
                match sender {
                    Some(sender) => {
                        let _ = sender.send(response_result(&msg));
                    }
                    None => debug!(id, "response for an unknown or abandoned request"),
                }
            }
            (None, None) => warn!("message without method or id"),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained = self
            .pending
            .lock()
            .map(|mut pending| pending.drain().collect::<Vec<_>>())
            .unwrap_or_default();
        for (id, sender) in drained {
            trace!(id, "failing pending request");
            let _ = sender.send(Err(LspError::ConnectionClosed));
        }
    }
}

/// Respond to common server-to-client requests with safe defaults.
fn server_request_reply(method: &str, msg: &Value, id: Value, workspace_folders: &[Value]) -> Value {
    let result = match method {
        "workspace/configuration" => {
            let item_count = msg
                .get("params")
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);

            Value::Array(std::iter::repeat_n(Value::Null, item_count).collect())
        }
        "workspace/workspaceFolders" => Value::Array(workspace_folders.to_vec()),
        "client/registerCapability"
        | "client/unregisterCapability"
        | "window/workDoneProgress/create"
        | "window/showMessageRequest"
        | "workspace/semanticTokens/refresh"
        | "workspace/inlayHint/refresh"
        | "workspace/codeLens/refresh"
        | "workspace/diagnostic/refresh" => Value::Null,
        "workspace/applyEdit" => json!({
            "applied": false,
            "failureReason": "edits are applied by the host through diagnostics actions",
        }),
        _ => {
            debug!(method, "unsupported server request");
            return json_rpc_error_response(id, -32601, "method not found");
        }
    };

    json_rpc_response(id, result)
}

fn write_loop<W: Write>(writer: W, rx: mpsc::Receiver<Value>) {
    let mut writer = BufWriter::new(writer);
    for msg in rx {
        if let Err(err) = write_message(&mut writer, &msg) {
            warn!(%err, "language server input closed");
            break;
        }
    }
}

fn read_loop<R: Read>(reader: R, state: ReaderState) {
    let mut reader = BufReader::new(reader);
    loop {
        match read_message(&mut reader) {
            Ok(Some(value)) => state.route(value),
            Ok(None) => {
                debug!("language server output ended");
                break;
            }
            Err(err) => {
                warn!(%err, "failed to read from language server");
                break;
            }
        }
    }
    state.close();
}
