#![allow(dead_code)]

use async_trait::async_trait;
use script_editor_lsp::{Connection, LspError, NotificationHandler, NotificationRouter, Subscription};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, mpsc};

#[derive(Clone)]
enum Canned {
    Result(Value),
    Error(i64, String),
    Hang,
}

/// In-memory connection with canned responses per method.
///
/// Requests and notifications are recorded. Server notifications are simulated with
/// [`FakeConnection::push`].
#[derive(Default)]
pub struct FakeConnection {
    responses: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<(String, Value)>>,
    notifications: Mutex<Vec<(String, Value)>>,
    router: NotificationRouter,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: &str, result: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), Canned::Result(result));
    }

    pub fn fail(&self, method: &str, code: i64, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), Canned::Error(code, message.to_string()));
    }

    /// Never answer `method`.
    pub fn hang(&self, method: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), Canned::Hang);
    }

    pub fn push(&self, method: &str, params: Value) -> usize {
        self.router.dispatch(method, &params)
    }

    pub fn handler_count(&self, method: &str) -> usize {
        self.router.handler_count(method)
    }

    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn notifications(&self, method: &str) -> Vec<Value> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, LspError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        let canned = self.responses.lock().unwrap().get(method).cloned();
        match canned {
            Some(Canned::Result(value)) => Ok(value),
            Some(Canned::Error(code, message)) => Err(LspError::Rpc { code, message }),
            Some(Canned::Hang) => std::future::pending().await,
            None => Ok(Value::Null),
        }
    }

    fn send_notification(&self, method: &str, params: Value) -> Result<(), LspError> {
        self.notifications
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        Ok(())
    }

    fn on_notification(&self, method: &str, handler: NotificationHandler) -> Subscription {
        self.router.subscribe(method, handler)
    }
}

/// Reading half of an in-memory byte pipe. Returns EOF once every writer is dropped.
pub struct PipeReader {
    rx: mpsc::Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

/// Writing half of an in-memory byte pipe.
#[derive(Clone)]
pub struct PipeWriter(mpsc::Sender<Vec<u8>>);

pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel();
    (
        PipeWriter(tx),
        PipeReader {
            rx,
            buf: Vec::new(),
            pos: 0,
        },
    )
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
