//! The connection seen by the language client.
//!
//! A [`Connection`] is an opaque bidirectional request/notification channel. The stdio
//! implementation lives in [`crate::lsp_stdio`]; tests use in-memory fakes.

use crate::error::LspError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Identifies a provider registered with a completion or hover registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn next(counter: &AtomicU64) -> Self {
        Self(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Handler for a server notification's `params`.
pub type NotificationHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Request/notification channel to a language server.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send a request and wait for its result.
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, LspError>;

    /// Send a notification.
    fn send_notification(&self, method: &str, params: Value) -> Result<(), LspError>;

    /// Register a handler for server notifications of `method`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is disposed or dropped.
    fn on_notification(&self, method: &str, handler: NotificationHandler) -> Subscription;
}

/// A registration that can be undone.
///
/// Disposing twice is a no-op. Dropping disposes.
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// A subscription that runs `dispose` once.
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A subscription with nothing to undo.
    pub fn noop() -> Self {
        Self { dispose: None }
    }

    /// Undo the registration.
    pub fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Returns `true` until [`Subscription::dispose`] runs.
    pub fn is_active(&self) -> bool {
        self.dispose.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A [`Connection`] that fails requests with no response after a fixed delay.
///
/// Notifications and subscriptions pass straight through.
pub struct TimeoutConnection {
    inner: Arc<dyn Connection>,
    timeout: Duration,
}

impl TimeoutConnection {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn Connection>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Connection for TimeoutConnection {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, LspError> {
        match tokio::time::timeout(self.timeout, self.inner.send_request(method, params)).await {
            Ok(response) => response,
            Err(_) => {
                debug!(method, timeout = ?self.timeout, "request timed out");
                Err(LspError::Timeout {
                    method: method.to_string(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    fn send_notification(&self, method: &str, params: Value) -> Result<(), LspError> {
        self.inner.send_notification(method, params)
    }

    fn on_notification(&self, method: &str, handler: NotificationHandler) -> Subscription {
        self.inner.on_notification(method, handler)
    }
}

impl fmt::Debug for TimeoutConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutConnection")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct RouterInner {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, NotificationHandler)>>,
}

/// Method-keyed notification fan-out shared by connection implementations.
#[derive(Clone, Default)]
pub struct NotificationRouter {
    inner: Arc<Mutex<RouterInner>>,
}

impl NotificationRouter {
    /// An empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`.
    pub fn subscribe(&self, method: &str, handler: NotificationHandler) -> Subscription {
        let Ok(mut inner) = self.inner.lock() else {
            return Subscription::noop();
        };
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .handlers
            .entry(method.to_string())
            .or_default()
            .push((id, handler));
        drop(inner);

        let weak: Weak<Mutex<RouterInner>> = Arc::downgrade(&self.inner);
        let method = method.to_string();
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Ok(mut inner) = inner.lock()
                && let Some(handlers) = inner.handlers.get_mut(&method)
            {
                handlers.retain(|(handler_id, _)| *handler_id != id);
            }
        })
    }

    /// Deliver `params` to every handler of `method`. Returns the number of handlers called.
    ///
    /// Handlers run outside the router lock, so they may subscribe or dispose.
    pub fn dispatch(&self, method: &str, params: &Value) -> usize {
        let handlers = match self.inner.lock() {
            Ok(inner) => inner
                .handlers
                .get(method)
                .map(|handlers| {
                    handlers
                        .iter()
                        .map(|(_, handler)| handler.clone())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            Err(_) => return 0,
        };

        trace!(method, handlers = handlers.len(), "dispatching notification");
        for handler in &handlers {
            handler(params);
        }
        handlers.len()
    }

    /// Number of handlers registered for `method`.
    pub fn handler_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.handlers.get(method).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationRouter").finish_non_exhaustive()
    }
}
