mod common;

use common::{PipeReader, PipeWriter, pipe};
use pretty_assertions::assert_eq;
use script_editor_lsp::{Connection, LspError, StdioConnection, read_message, write_message};
use serde_json::{Value, json};
use std::io::BufReader;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

struct ServerEnd {
    from_client: BufReader<PipeReader>,
    to_client: PipeWriter,
}

impl ServerEnd {
    fn read(&mut self) -> Value {
        read_message(&mut self.from_client).unwrap().unwrap()
    }

    fn write(&mut self, message: Value) {
        write_message(&mut self.to_client, &message).unwrap();
    }
}

fn connect() -> (StdioConnection, ServerEnd) {
    let (to_client, client_input) = pipe();
    let (client_output, from_client) = pipe();
    let connection = StdioConnection::from_streams(
        client_input,
        client_output,
        vec![json!({ "uri": "file:///work", "name": "work" })],
    );
    (
        connection,
        ServerEnd {
            from_client: BufReader::new(from_client),
            to_client,
        },
    )
}

#[tokio::test]
async fn request_round_trip_with_interleaved_server_traffic() {
    let (connection, mut server) = connect();
    let logged = Arc::new(Mutex::new(Vec::new()));
    let sink = logged.clone();
    let _subscription = connection.on_notification(
        "window/logMessage",
        Arc::new(move |params: &Value| sink.lock().unwrap().push(params.clone())),
    );

    let script = thread::spawn(move || {
        let request = server.read();
        server.write(json!({
            "jsonrpc": "2.0",
            "id": "cfg",
            "method": "workspace/configuration",
            "params": { "items": [{ "section": "js" }, { "section": "ts" }] },
        }));
        let configuration = server.read();
        server.write(json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "workspace/workspaceFolders",
        }));
        let folders = server.read();
        server.write(json!({
            "jsonrpc": "2.0",
            "method": "window/logMessage",
            "params": { "type": 3, "message": "indexing" },
        }));
        server.write(json!({ "jsonrpc": "2.0", "id": request["id"], "result": { "ok": true } }));
        let notification = server.read();
        (request, configuration, folders, notification)
    });

    let result = connection
        .send_request("textDocument/hover", json!({ "probe": 1 }))
        .await
        .unwrap();
    assert_eq!(result, json!({ "ok": true }));
    assert_eq!(
        *logged.lock().unwrap(),
        vec![json!({ "type": 3, "message": "indexing" })]
    );

    connection
        .send_notification("initialized", json!({}))
        .unwrap();
    let (request, configuration, folders, notification) = script.join().unwrap();

    assert_eq!(request["method"], json!("textDocument/hover"));
    assert_eq!(request["params"], json!({ "probe": 1 }));
    assert_eq!(configuration["id"], json!("cfg"));
    assert_eq!(configuration["result"], json!([null, null]));
    assert_eq!(folders["id"], json!(9));
    assert_eq!(
        folders["result"],
        json!([{ "uri": "file:///work", "name": "work" }])
    );
    assert_eq!(notification["method"], json!("initialized"));
    assert!(notification.get("id").is_none());
}

#[tokio::test]
async fn error_responses_become_rpc_errors() {
    let (connection, mut server) = connect();
    let script = thread::spawn(move || {
        let request = server.read();
        server.write(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": -32602, "message": "bad position" },
        }));
        server
    });

    let err = connection
        .send_request("textDocument/completion", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LspError::Rpc { code: -32602, ref message } if message == "bad position"
    ));
    drop(script.join().unwrap());
}

#[tokio::test]
async fn server_exit_fails_pending_and_later_requests() {
    let (connection, mut server) = connect();
    let script = thread::spawn(move || {
        let request = server.read();
        drop(server);
        request
    });

    let err = connection
        .send_request("textDocument/foldingRange", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, LspError::ConnectionClosed));
    assert!(connection.is_closed());
    assert_eq!(script.join().unwrap()["method"], json!("textDocument/foldingRange"));

    let err = connection
        .send_request("textDocument/hover", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, LspError::ConnectionClosed));
}

#[tokio::test(start_paused = true)]
async fn unanswered_requests_time_out() {
    let (connection, _server) = connect();
    let connection = connection.with_request_timeout(Some(Duration::from_millis(50)));

    let err = connection
        .send_request("textDocument/documentColor", json!({}))
        .await
        .unwrap_err();
    match err {
        LspError::Timeout { method, timeout_ms } => {
            assert_eq!(method, "textDocument/documentColor");
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(!connection.is_closed());
}
