//! MCP server over newline-delimited JSON-RPC.
//!
//! Requests are read one line at a time. Everything except `tools/call` is
//! answered inline; tool calls run as their own tasks so a slow upstream
//! request never blocks `ping` or a cancellation. All output goes through a
//! single writer task so frames never interleave.

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CancelledParams, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, LogLevel,
    LoggingMessageParams, ServerCapabilities, ServerInfo, SetLevelParams, ToolsCapability,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::tools::ToolRegistry;
use futures::{FutureExt, SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::AbortHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

/// Name reported in `serverInfo` and as the logger of log notifications
pub const SERVER_NAME: &str = "nefino-mcp";

/// Longest accepted request line
const MAX_FRAME_BYTES: usize = 1024 * 1024;

const INSTRUCTIONS: &str = "Use GetNews to look up renewable-energy news for a German place. \
Pass place_id and place_type; optionally restrict the time window with range_or_recency \
and filter by news_topics.";

/// MCP server exposing a tool registry
#[derive(Clone)]
pub struct McpServer {
    state: Arc<ServerState>,
}

struct ServerState {
    registry: ToolRegistry,
    log_level: RwLock<LogLevel>,
    /// Running tool calls, keyed by the serialized request id
    in_flight: Mutex<HashMap<String, AbortHandle>>,
}

type Outbox = mpsc::UnboundedSender<String>;

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            state: Arc::new(ServerState {
                registry,
                log_level: RwLock::new(LogLevel::Info),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.state.registry
    }

    /// Number of tool calls currently running
    pub async fn in_flight(&self) -> usize {
        self.state.in_flight.lock().await.len()
    }

    /// Minimum level of `notifications/message` sent to the client
    pub async fn log_level(&self) -> LogLevel {
        *self.state.log_level.read().await
    }

    /// Serve over stdin and stdout until input closes or `shutdown` resolves
    pub async fn run_stdio_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.serve_until(tokio::io::stdin(), tokio::io::stdout(), shutdown)
            .await
    }

    /// Serve until the reader reaches end of input.
    ///
    /// Tool calls still running at end of input are aborted; frames already
    /// queued are flushed before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.serve_until(reader, writer, std::future::pending()).await
    }

    /// Like [`serve`](Self::serve), but also stops once `shutdown` resolves
    pub async fn serve_until<R, W, F>(&self, reader: R, writer: W, shutdown: F) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let (outbox, frames) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_frames(writer, frames));

        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        tokio::pin!(shutdown);
        info!("MCP server ready");

        loop {
            let line = tokio::select! {
                line = lines.next() => match line {
                    Some(line) => line,
                    None => {
                        info!("Input closed, shutting down");
                        break;
                    }
                },
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            };
            let line = match line {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(max_bytes = MAX_FRAME_BYTES, "Dropping oversized frame");
                    send(
                        &outbox,
                        &JsonRpcResponse::error(
                            Value::Null,
                            JsonRpcError::invalid_request("request exceeds maximum frame size"),
                        ),
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }

            debug!(bytes = line.len(), "Received frame");
            self.dispatch(&line, &outbox).await;
        }

        for (_, handle) in self.state.in_flight.lock().await.drain() {
            handle.abort();
        }

        drop(outbox);
        writer_task
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }

    /// Handle one raw message without the streaming machinery.
    ///
    /// Tool calls are awaited inline and no log notifications are produced.
    /// Returns `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        match parse_request(line) {
            Ok(request) => self.handle_request(request).await,
            Err(response) => Some(response),
        }
    }

    async fn dispatch(&self, line: &str, outbox: &Outbox) {
        match parse_request(line) {
            Err(response) => send(outbox, &response),
            Ok(request) if request.method == "tools/call" && !request.is_notification() => {
                self.spawn_tool_call(request, outbox).await
            }
            Ok(request) => {
                if let Some(response) = self.handle_request(request).await {
                    send(outbox, &response);
                }
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request).await;
            return None;
        };

        let result = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.state.registry.list_schemas(),
            }),
            "tools/call" => match parse_params::<CallToolParams>(request.params) {
                Ok(params) => {
                    to_result(&self.state.registry.call(&params.name, params.arguments).await)
                }
                Err(e) => Err(e),
            },
            "logging/setLevel" => self.set_level(request.params).await,
            method => {
                debug!(method, "Unknown method");
                Err(JsonRpcError::method_not_found(method))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, e),
        })
    }

    async fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" | "initialized" => info!("Client initialized"),
            "notifications/cancelled" => {
                match parse_params::<CancelledParams>(request.params.clone()) {
                    Ok(params) => self.cancel(params).await,
                    Err(e) => warn!(error = %e.message, "Ignoring malformed cancellation"),
                }
            }
            method => debug!(method, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params)?;
        let protocol_version = SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .find(|v| **v == params.protocol_version)
            .unwrap_or(&SUPPORTED_PROTOCOL_VERSIONS[0])
            .to_string();

        info!(
            client = params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
            requested = %params.protocol_version,
            negotiated = %protocol_version,
            "Initializing session"
        );

        to_result(&InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: Some(json!({})),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        })
    }

    async fn set_level(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: SetLevelParams = parse_params(params)?;
        *self.state.log_level.write().await = params.level;
        info!(level = ?params.level, "Client log level changed");
        Ok(json!({}))
    }

    async fn cancel(&self, params: CancelledParams) {
        let key = request_key(&params.request_id);
        match self.state.in_flight.lock().await.remove(&key) {
            Some(handle) => {
                handle.abort();
                info!(
                    request_id = %key,
                    reason = params.reason.as_deref().unwrap_or(""),
                    "Cancelled tool call"
                );
            }
            None => debug!(request_id = %key, "Cancellation for unknown or finished request"),
        }
    }

    async fn spawn_tool_call(&self, request: JsonRpcRequest, outbox: &Outbox) {
        let id = request.id.unwrap_or(Value::Null);
        let params = match parse_params::<CallToolParams>(request.params) {
            Ok(params) => params,
            Err(e) => {
                send(outbox, &JsonRpcResponse::error(id, e));
                return;
            }
        };

        let key = request_key(&id);

        // Held across the spawn so the task cannot deregister before it is registered
        let mut in_flight = self.state.in_flight.lock().await;
        if in_flight.contains_key(&key) {
            warn!(request_id = %key, "Rejecting tool call reusing an in-flight id");
            send(
                outbox,
                &JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request(format!(
                        "request id {} is already in flight",
                        key
                    )),
                ),
            );
            return;
        }

        let state = self.state.clone();
        let outbox = outbox.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let tool = params.name;
            state
                .notify(&outbox, LogLevel::Info, json!({ "tool": tool, "event": "started" }))
                .await;

            let outcome = AssertUnwindSafe(state.registry.call(&tool, params.arguments))
                .catch_unwind()
                .await;
            let response = match outcome {
                Ok(result) => {
                    match result.error_kind() {
                        Some(kind) => {
                            state
                                .notify(
                                    &outbox,
                                    LogLevel::Error,
                                    json!({ "tool": tool, "event": "failed", "kind": kind }),
                                )
                                .await
                        }
                        None => {
                            state
                                .notify(
                                    &outbox,
                                    LogLevel::Info,
                                    json!({ "tool": tool, "event": "finished" }),
                                )
                                .await
                        }
                    }
                    match serde_json::to_value(&result) {
                        Ok(value) => JsonRpcResponse::success(id, value),
                        Err(e) => {
                            JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
                        }
                    }
                }
                Err(_) => {
                    error!(tool = %tool, request_id = %task_key, "Tool call panicked");
                    state
                        .notify(
                            &outbox,
                            LogLevel::Error,
                            json!({ "tool": tool, "event": "failed", "kind": "internal_error" }),
                        )
                        .await;
                    JsonRpcResponse::error(
                        id,
                        JsonRpcError::internal_error(format!("tool {} failed unexpectedly", tool)),
                    )
                }
            };

            state.in_flight.lock().await.remove(&task_key);
            send(&outbox, &response);
        });
        in_flight.insert(key, task.abort_handle());
    }
}

impl ServerState {
    /// Send a `notifications/message` if `level` passes the client's threshold
    async fn notify(&self, outbox: &Outbox, level: LogLevel, data: Value) {
        if level < *self.log_level.read().await {
            return;
        }
        let params = LoggingMessageParams {
            level,
            logger: Some(SERVER_NAME.to_string()),
            data,
        };
        match serde_json::to_value(params) {
            Ok(params) => send(
                outbox,
                &JsonRpcNotification::new("notifications/message", params),
            ),
            Err(e) => error!(error = %e, "Failed to encode log notification"),
        }
    }
}

async fn write_frames<W>(writer: W, mut frames: mpsc::UnboundedReceiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(frame) = frames.recv().await {
        sink.send(frame).await?;
    }
    Ok(())
}

fn send<T: Serialize>(outbox: &Outbox, message: &T) {
    match serde_json::to_string(message) {
        Ok(frame) => {
            if outbox.send(frame).is_err() {
                debug!("Writer closed, dropping frame");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode frame"),
    }
}

fn parse_request(line: &str) -> std::result::Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(e)))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(
            id.clone(),
            JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
        )
    })?;
    if request.jsonrpc != "2.0" {
        return Err(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }
    Ok(request)
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> std::result::Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_result<T: Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// `1` and `"1"` are different request ids
fn request_key(id: &Value) -> String {
    id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use crate::protocol::ToolSchema;
    use nefino_sdk::NefinoResult;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    struct EchoTool;

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".to_string(),
                description: "Echo the arguments".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            }
        }

        async fn execute(&self, arguments: Value) -> NefinoResult<Value> {
            if arguments.get("fail").is_some() {
                return Err(nefino_sdk::NefinoError::NotFound("nothing here".to_string()));
            }
            Ok(arguments)
        }
    }

    /// Never finishes; reports when its future is dropped
    struct HangingTool {
        dropped: std::sync::Mutex<Option<oneshot::Sender<()>>>,
    }

    struct DropSignal(Option<oneshot::Sender<()>>);

    impl Drop for DropSignal {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    #[async_trait::async_trait]
    impl Tool for HangingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "hang".to_string(),
                description: "Wait forever".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            }
        }

        async fn execute(&self, _arguments: Value) -> NefinoResult<Value> {
            let _signal = DropSignal(self.dropped.lock().unwrap().take());
            std::future::pending::<()>().await;
            Ok(Value::Null)
        }
    }

    struct PanickingTool;

    #[async_trait::async_trait]
    impl Tool for PanickingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "explode".to_string(),
                description: "Panics".to_string(),
                input_schema: json!({"type": "object"}),
                output_schema: None,
            }
        }

        async fn execute(&self, _arguments: Value) -> NefinoResult<Value> {
            panic!("tool blew up");
        }
    }

    fn server_with(hang_dropped: Option<oneshot::Sender<()>>) -> McpServer {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(HangingTool {
            dropped: std::sync::Mutex::new(hang_dropped),
        }));
        McpServer::new(registry)
    }

    struct TestClient {
        input: Option<DuplexStream>,
        output: FramedRead<DuplexStream, LinesCodec>,
        task: JoinHandle<Result<()>>,
    }

    impl TestClient {
        fn start(server: McpServer) -> Self {
            let (input, server_in) = tokio::io::duplex(64 * 1024);
            let (server_out, output) = tokio::io::duplex(64 * 1024);
            let task = tokio::spawn(async move { server.serve(server_in, server_out).await });
            Self {
                input: Some(input),
                output: FramedRead::new(output, LinesCodec::new()),
                task,
            }
        }

        async fn send_raw(&mut self, line: &str) {
            let input = self.input.as_mut().unwrap();
            input.write_all(line.as_bytes()).await.unwrap();
            input.write_all(b"\n").await.unwrap();
        }

        async fn send(&mut self, message: Value) {
            self.send_raw(&message.to_string()).await;
        }

        async fn next_frame(&mut self) -> Value {
            let line = tokio::time::timeout(Duration::from_secs(5), self.output.next())
                .await
                .expect("timed out waiting for a frame")
                .unwrap()
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }

        /// Next frame that is a response, skipping notifications
        async fn next_response(&mut self) -> Value {
            loop {
                let frame = self.next_frame().await;
                if frame.get("id").is_some() {
                    return frame;
                }
            }
        }

        async fn finish(mut self) -> Result<()> {
            drop(self.input.take());
            tokio::time::timeout(Duration::from_secs(5), self.task)
                .await
                .expect("server did not stop")
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_initialize_echoes_supported_version() {
        let server = server_with(None);
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"1"}}}"#,
            )
            .await
            .unwrap();
        let result = response.result.unwrap();

        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "nefino-mcp");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
        assert!(result["capabilities"]["logging"].is_object());
    }

    #[tokio::test]
    async fn test_initialize_offers_latest_for_unknown_version() {
        let server = server_with(None);
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(
            response.result.unwrap()["protocolVersion"],
            SUPPORTED_PROTOCOL_VERSIONS[0]
        );
    }

    #[tokio::test]
    async fn test_tools_list_and_ping() {
        let server = server_with(None);

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();
        let names: Vec<String> = response.result.unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["echo", "hang"]);

        let pong = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(pong.id, json!(2));
        assert_eq!(pong.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server_with(None);

        let parse = server.handle_message("{not json").await.unwrap();
        assert_eq!(parse.id, Value::Null);
        assert_eq!(parse.error.unwrap().code, JsonRpcError::PARSE_ERROR);

        let unknown = server
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(unknown.id, json!(3));
        assert_eq!(unknown.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let bad_params = server
            .handle_message(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"arguments":{}}}"#)
            .await
            .unwrap();
        assert_eq!(bad_params.error.unwrap().code, JsonRpcError::INVALID_PARAMS);

        let wrong_version = server
            .handle_message(r#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(wrong_version.error.unwrap().code, JsonRpcError::INVALID_REQUEST);

        let notification = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/whatever"}"#)
            .await;
        assert!(notification.is_none());
    }

    #[tokio::test]
    async fn test_tool_failure_is_result_not_protocol_error() {
        let server = server_with(None);
        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"echo","arguments":{"fail":true}}}"#,
            )
            .await
            .unwrap();

        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["error"]["kind"], "not_found_error");
    }

    #[tokio::test]
    async fn test_set_level_updates_threshold() {
        let server = server_with(None);
        assert_eq!(server.log_level().await, LogLevel::Info);

        let response = server
            .handle_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"logging/setLevel","params":{"level":"error"}}"#,
            )
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({})));
        assert_eq!(server.log_level().await, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_serve_emits_log_notifications_around_tool_call() {
        let mut client = TestClient::start(server_with(None));
        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                         "params": {"name": "echo", "arguments": {"x": 1}}}))
            .await;

        let started = client.next_frame().await;
        assert_eq!(started["method"], "notifications/message");
        assert_eq!(started["params"]["level"], "info");
        assert_eq!(started["params"]["data"]["event"], "started");

        let finished = client.next_frame().await;
        assert_eq!(finished["params"]["data"]["event"], "finished");

        let response = client.next_frame().await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["structuredContent"], json!({"x": 1}));

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_respects_log_level() {
        let mut client = TestClient::start(server_with(None));
        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "logging/setLevel",
                         "params": {"level": "error"}}))
            .await;
        assert_eq!(client.next_frame().await["id"], 1);

        client
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                         "params": {"name": "echo", "arguments": {}}}))
            .await;
        // Info-level start and finish are suppressed
        assert_eq!(client.next_frame().await["id"], 2);

        client
            .send(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                         "params": {"name": "echo", "arguments": {"fail": true}}}))
            .await;
        let failed = client.next_frame().await;
        assert_eq!(failed["params"]["level"], "error");
        assert_eq!(failed["params"]["data"]["kind"], "not_found_error");
        assert_eq!(client.next_frame().await["id"], 3);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_call_gets_no_response() {
        let (dropped_tx, dropped_rx) = oneshot::channel();
        let mut client = TestClient::start(server_with(Some(dropped_tx)));

        client
            .send(json!({"jsonrpc": "2.0", "id": 10, "method": "tools/call",
                         "params": {"name": "hang", "arguments": {}}}))
            .await;
        let started = client.next_frame().await;
        assert_eq!(started["params"]["data"]["tool"], "hang");

        // Server keeps answering while the call is in flight
        client.send(json!({"jsonrpc": "2.0", "id": 11, "method": "ping"})).await;
        assert_eq!(client.next_response().await["id"], 11);

        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/cancelled",
                         "params": {"requestId": 10, "reason": "user aborted"}}))
            .await;
        tokio::time::timeout(Duration::from_secs(5), dropped_rx)
            .await
            .expect("tool future was not dropped")
            .unwrap();

        client.send(json!({"jsonrpc": "2.0", "id": 12, "method": "ping"})).await;
        assert_eq!(client.next_response().await["id"], 12);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_tool_still_gets_one_response() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PanickingTool));
        let server = McpServer::new(registry);
        let mut client = TestClient::start(server.clone());

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                         "params": {"name": "explode", "arguments": {}}}))
            .await;
        let response = client.next_response().await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["error"]["code"], JsonRpcError::INTERNAL_ERROR);

        client.send(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await;
        assert_eq!(client.next_response().await["id"], 2);
        assert_eq!(server.in_flight().await, 0);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_id_is_rejected() {
        let (dropped_tx, dropped_rx) = oneshot::channel();
        let server = server_with(Some(dropped_tx));
        let mut client = TestClient::start(server.clone());

        let call = json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                          "params": {"name": "hang", "arguments": {}}});
        client.send(call.clone()).await;
        client.next_frame().await;

        client.send(call).await;
        let rejected = client.next_response().await;
        assert_eq!(rejected["id"], 5);
        assert_eq!(rejected["error"]["code"], JsonRpcError::INVALID_REQUEST);
        assert_eq!(server.in_flight().await, 1);

        // The original call is still tracked and can be cancelled
        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/cancelled",
                         "params": {"requestId": 5}}))
            .await;
        tokio::time::timeout(Duration::from_secs(5), dropped_rx)
            .await
            .expect("tool future was not dropped")
            .unwrap();
        assert_eq!(server.in_flight().await, 0);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_recovers_from_bad_frames() {
        let mut client = TestClient::start(server_with(None));

        client.send_raw("this is not json").await;
        let parse = client.next_frame().await;
        assert_eq!(parse["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(parse["id"], Value::Null);

        client.send_raw("").await;
        client.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await;
        client.send(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
        assert_eq!(client.next_frame().await["id"], 1);

        client.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_of_input_aborts_running_calls() {
        let (dropped_tx, dropped_rx) = oneshot::channel();
        let mut client = TestClient::start(server_with(Some(dropped_tx)));

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                         "params": {"name": "hang", "arguments": {}}}))
            .await;
        client.next_frame().await;

        client.finish().await.unwrap();
        dropped_rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_serving_while_input_is_open() {
        let (dropped_tx, dropped_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = server_with(Some(dropped_tx));

        let (mut input, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, output) = tokio::io::duplex(64 * 1024);
        let mut output = FramedRead::new(output, LinesCodec::new());
        let task = tokio::spawn(async move {
            server
                .serve_until(server_in, server_out, async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let call = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                          "params": {"name": "hang", "arguments": {}}});
        input.write_all(format!("{}\n", call).as_bytes()).await.unwrap();
        // the start notification means the call is running
        let started = tokio::time::timeout(Duration::from_secs(5), output.next())
            .await
            .unwrap();
        assert!(started.is_some());

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server ignored shutdown")
            .unwrap()
            .unwrap();
        dropped_rx.await.unwrap();

        // input is still open; nothing is read after shutdown
        drop(input);
    }
}
