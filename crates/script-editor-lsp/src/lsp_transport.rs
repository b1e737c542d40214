//! JSON-RPC/LSP stdio framing helpers.
//!
//! LSP messages are JSON values framed by HTTP-like headers:
//!
//! ```text
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of UTF-8 JSON>
//! ```

use crate::error::LspError;
use serde_json::{Map, Value};
use std::io::{BufRead, Write};
use tracing::trace;

/// Write a single LSP JSON-RPC message to `writer`.
pub fn write_message<W: Write>(writer: &mut W, value: &Value) -> Result<(), LspError> {
    let body = serde_json::to_vec(value)?;

    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()?;
    trace!(bytes = body.len(), "wrote message");
    Ok(())
}

/// Read a single LSP JSON-RPC message from `reader`.
///
/// Returns:
/// - `Ok(Some(value))` when a message is successfully read.
/// - `Ok(None)` on clean EOF (no more messages).
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<Value>, LspError> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            // Stray blank lines before any header are tolerated.
            if content_length.is_none() {
                continue;
            }
            break;
        }

        if let Some((name, rest)) = trimmed.split_once(':')
            && name.trim().eq_ignore_ascii_case("Content-Length")
        {
            content_length = rest.trim().parse::<usize>().ok();
        }
    }

    let len = content_length
        .ok_or_else(|| LspError::InvalidMessage("missing Content-Length header".to_string()))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    trace!(bytes = len, "read message");

    Ok(Some(serde_json::from_slice(&body)?))
}

fn envelope() -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("jsonrpc".to_string(), Value::String("2.0".to_string()));
    obj
}

/// Build a JSON-RPC notification.
pub fn json_rpc_notification(method: &str, params: Value) -> Value {
    let mut obj = envelope();
    obj.insert("method".to_string(), Value::String(method.to_string()));
    obj.insert("params".to_string(), params);
    Value::Object(obj)
}

/// Build a JSON-RPC request.
pub fn json_rpc_request(id: u64, method: &str, params: Value) -> Value {
    let mut obj = envelope();
    obj.insert("id".to_string(), Value::Number(id.into()));
    obj.insert("method".to_string(), Value::String(method.to_string()));
    obj.insert("params".to_string(), params);
    Value::Object(obj)
}

/// Build a JSON-RPC success response. `id` is echoed as received (number or string).
pub fn json_rpc_response(id: Value, result: Value) -> Value {
    let mut obj = envelope();
    obj.insert("id".to_string(), id);
    obj.insert("result".to_string(), result);
    Value::Object(obj)
}

/// Build a JSON-RPC error response.
pub fn json_rpc_error_response(id: Value, code: i64, message: &str) -> Value {
    let mut error = Map::new();
    error.insert("code".to_string(), Value::Number(code.into()));
    error.insert("message".to_string(), Value::String(message.to_string()));

    let mut obj = envelope();
    obj.insert("id".to_string(), id);
    obj.insert("error".to_string(), Value::Object(error));
    Value::Object(obj)
}

/// Interpret a response message: its `result`, or its `error` as [`LspError::Rpc`].
pub fn response_result(msg: &Value) -> Result<Value, LspError> {
    if let Some(error) = msg.get("error") {
        return Err(LspError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        });
    }
    Ok(msg.get("result").cloned().unwrap_or(Value::Null))
}
