//! MCP JSON-RPC client over a byte stream pair.
//!
//! Implements newline-delimited JSON-RPC 2.0 as used by MCP stdio servers.
//! Reference: <https://spec.modelcontextprotocol.io/>
//!
//! One reader task per connection drains inbound messages and hands each
//! response to the caller waiting on its correlation id. Any number of
//! callers may issue requests concurrently; writes are serialized per line.

mod pending;
mod wire;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, mpsc};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use toolmux_core::{
    CorrelationId, InputSchema, InvocationOutcome, InvocationResult, LogLevel, ResourceContent,
    ResourceDescriptor, ServerIdentity, ToolDescriptor, TransportErrorKind,
};
use tracing::{debug, error, info, warn};

use pending::{PendingRequest, PendingTable, Route};
use wire::{
    Incoming, InitializeResult, OutgoingNotification, OutgoingRequest, OutgoingResponse,
    ReadResourceResult, ResourcesPage, RpcErrorObject, ToolsPage,
};

pub use wire::{METHOD_NOT_FOUND, PREFERRED_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};

/// Errors from the protocol client.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Failed to write to server: {0}")]
    WriteFailed(String),

    #[error("Server returned error: code={code}, message={message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed {method} result: {reason}")]
    MalformedResult { method: &'static str, reason: String },

    #[error("Incompatible protocol version '{offered}' (supported: {})", SUPPORTED_PROTOCOL_VERSIONS.join(", "))]
    IncompatibleVersion { offered: String },
}

/// Signals from the reader task to whoever supervises the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server announced `notifications/tools/list_changed`.
    ToolsChanged,
    /// A `notifications/message` log entry.
    Notification { level: LogLevel, message: String },
    /// Consecutive undecodable messages reached the configured limit.
    AnomalyLimitExceeded { count: u32 },
    /// The inbound stream ended; every pending request has failed.
    Closed,
}

type BoxedWriter = BufWriter<Box<dyn AsyncWrite + Send + Unpin>>;

struct Inner {
    server: String,
    writer: Mutex<Option<BoxedWriter>>,
    pending: PendingTable,
    next_id: AtomicU64,
}

impl Inner {
    async fn write_line(&self, line: &str) -> Result<(), ProtocolError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProtocolError::ConnectionClosed)?;
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        result.map_err(|e| ProtocolError::WriteFailed(e.to_string()))
    }
}

/// Handle to one server connection. Cheap to clone.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
    reader: AbortHandle,
}

impl RpcClient {
    /// Start the client over `reader`/`writer` (the server's stdout/stdin).
    ///
    /// Returns the client and the event stream of its reader task.
    pub fn start<R, W>(
        server: impl Into<String>,
        reader: R,
        writer: W,
        max_consecutive_anomalies: u32,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
        let inner = Arc::new(Inner {
            server: server.into(),
            writer: Mutex::new(Some(BufWriter::new(boxed))),
            pending: PendingTable::default(),
            next_id: AtomicU64::new(1),
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(
            Arc::clone(&inner),
            reader,
            events_tx,
            max_consecutive_anomalies.max(1),
        ));
        (
            Self {
                inner,
                reader: task.abort_handle(),
            },
            events_rx,
        )
    }

    pub fn server(&self) -> &str {
        &self.inner.server
    }

    /// Requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.in_flight()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pending.is_closed()
    }

    /// Whether both handles drive the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Perform the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(&self) -> Result<ServerIdentity, ProtocolError> {
        let params = json!({
            "protocolVersion": PREFERRED_PROTOCOL_VERSION,
            "clientInfo": {
                "name": "toolmux",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {}
        });

        let value = self.request("initialize", Some(params)).await?;
        let result: InitializeResult =
            serde_json::from_value(value).map_err(|e| ProtocolError::MalformedResult {
                method: "initialize",
                reason: e.to_string(),
            })?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&result.protocol_version.as_str()) {
            return Err(ProtocolError::IncompatibleVersion {
                offered: result.protocol_version,
            });
        }

        self.notify("notifications/initialized", None).await?;

        let (name, version) = result
            .server_info
            .map_or_else(|| (self.inner.server.clone(), None), |info| (info.name, info.version));

        info!(
            server = %self.inner.server,
            protocol_version = %result.protocol_version,
            remote_name = %name,
            "MCP session initialized"
        );

        Ok(ServerIdentity {
            protocol_version: result.protocol_version,
            name,
            version,
            capabilities: result.capabilities,
            instructions: result.instructions,
        })
    }

    /// Fetch every tool the server offers, following `nextCursor` pages.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProtocolError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = self.request("tools/list", params).await?;
            let page: ToolsPage =
                serde_json::from_value(value).map_err(|e| ProtocolError::MalformedResult {
                    method: "tools/list",
                    reason: e.to_string(),
                })?;

            tools.extend(page.tools.into_iter().map(|t| ToolDescriptor {
                input_schema: t
                    .input_schema
                    .as_ref()
                    .map(InputSchema::from_json_schema)
                    .unwrap_or_default(),
                name: t.name,
                description: t.description.unwrap_or_default(),
                server: self.inner.server.clone(),
            }));

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Fetch every resource the server lists, following `nextCursor` pages.
    pub async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ProtocolError> {
        let mut resources = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let value = self.request("resources/list", params).await?;
            let page: ResourcesPage =
                serde_json::from_value(value).map_err(|e| ProtocolError::MalformedResult {
                    method: "resources/list",
                    reason: e.to_string(),
                })?;

            resources.extend(page.resources.into_iter().map(|r| ResourceDescriptor {
                uri: r.uri,
                name: r.name,
                description: r.description.unwrap_or_default(),
                mime_type: r.mime_type,
                server: self.inner.server.clone(),
            }));

            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        Ok(resources)
    }

    /// Read the resource at `uri`.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, ProtocolError> {
        let value = self
            .request("resources/read", Some(json!({ "uri": uri })))
            .await?;
        let result: ReadResourceResult =
            serde_json::from_value(value).map_err(|e| ProtocolError::MalformedResult {
                method: "resources/read",
                reason: e.to_string(),
            })?;
        Ok(result.contents)
    }

    /// Call a tool with a caller-side deadline.
    ///
    /// The deadline covers writing the request and waiting for the reply.
    /// On timeout the correlation id is abandoned and a late reply is dropped.
    pub async fn call_tool(&self, name: &str, arguments: Value, timeout: Duration) -> InvocationResult {
        let started = Instant::now();
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };
        let params = json!({ "name": name, "arguments": arguments });

        let mut correlation = 0;
        let outcome = match tokio::time::timeout(timeout, async {
            let pending = self.send_request("tools/call", Some(params)).await?;
            correlation = pending.id();
            pending.response().await.ok_or(ProtocolError::ConnectionClosed)
        })
        .await
        {
            Err(_) => InvocationOutcome::TimedOut {
                after_ms: millis(started.elapsed()),
            },
            Ok(Err(e)) => InvocationOutcome::TransportError {
                kind: transport_kind(e),
            },
            Ok(Ok(Err(rpc))) => InvocationOutcome::ToolError {
                code: Some(rpc.code),
                message: rpc.message,
            },
            Ok(Ok(Ok(result))) => outcome_from_result(result),
        };

        InvocationResult {
            correlation_id: CorrelationId(correlation),
            server: self.inner.server.clone(),
            tool: name.to_string(),
            outcome,
            elapsed_ms: millis(started.elapsed()),
        }
    }

    /// Send a request and wait for its result without a deadline.
    pub async fn request(&self, method: &'static str, params: Option<Value>) -> Result<Value, ProtocolError> {
        let pending = self.send_request(method, params).await?;
        match pending.response().await {
            Some(Ok(value)) => Ok(value),
            Some(Err(RpcErrorObject { code, message, .. })) => Err(ProtocolError::Rpc { code, message }),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<PendingRequest, ProtocolError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&OutgoingRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| ProtocolError::WriteFailed(e.to_string()))?;

        // Register before writing so a fast reply cannot race the bookkeeping.
        let pending = self
            .inner
            .pending
            .register(id)
            .ok_or(ProtocolError::ConnectionClosed)?;

        debug!(server = %self.inner.server, correlation_id = id, method, "-> request");
        if let Err(e) = self.inner.write_line(&line).await {
            self.inner.pending.discard(id);
            return Err(e);
        }
        Ok(pending)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ProtocolError> {
        let line = serde_json::to_string(&OutgoingNotification {
            jsonrpc: "2.0",
            method,
            params,
        })
        .map_err(|e| ProtocolError::WriteFailed(e.to_string()))?;
        self.inner.write_line(&line).await
    }

    /// Close the connection: stop the reader, fail pending calls and drop
    /// the writer so the server sees EOF on its stdin.
    pub async fn close(&self) {
        self.reader.abort();
        let failed = self.inner.pending.close();
        if failed > 0 {
            debug!(server = %self.inner.server, failed, "failed in-flight requests on close");
        }
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn transport_kind(error: ProtocolError) -> TransportErrorKind {
    match error {
        ProtocolError::WriteFailed(reason) => TransportErrorKind::WriteFailed(reason),
        ProtocolError::ConnectionClosed => TransportErrorKind::ConnectionClosed,
        other => TransportErrorKind::MalformedResponse(other.to_string()),
    }
}

/// Map a `tools/call` result to an outcome. `isError: true` is a tool-level failure.
fn outcome_from_result(result: Value) -> InvocationOutcome {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if is_error {
        let message = wire::first_text(&result).unwrap_or("Unknown error").to_string();
        InvocationOutcome::ToolError { code: None, message }
    } else {
        InvocationOutcome::Success { payload: result }
    }
}

/// Console noise some launchers (npx, uvx) print on stdout.
fn is_console_noise(line: &[u8]) -> bool {
    line.first() == Some(&0x1b)
}

async fn read_loop<R>(inner: Arc<Inner>, reader: R, events: mpsc::UnboundedSender<ClientEvent>, max_anomalies: u32)
where
    R: AsyncRead + Send + Unpin,
{
    let server = inner.server.clone();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut consecutive_anomalies = 0u32;
    let mut limit_signalled = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(server = %server, error = %e, "read from MCP server failed");
                break;
            }
        }

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }
        if is_console_noise(line) {
            debug!(server = %server, "skipping ANSI log line on stdout");
            continue;
        }

        match Incoming::decode(line) {
            Ok(message) => {
                consecutive_anomalies = 0;
                handle_message(&inner, message, &events);
            }
            Err(e) => {
                consecutive_anomalies += 1;
                warn!(
                    server = %server,
                    error = %e,
                    consecutive = consecutive_anomalies,
                    line = %String::from_utf8_lossy(line),
                    "protocol anomaly: undecodable message"
                );
                if consecutive_anomalies >= max_anomalies && !limit_signalled {
                    limit_signalled = true;
                    error!(server = %server, count = consecutive_anomalies, "protocol anomaly limit reached");
                    let _ = events.send(ClientEvent::AnomalyLimitExceeded {
                        count: consecutive_anomalies,
                    });
                }
            }
        }
    }

    let failed = inner.pending.close();
    debug!(server = %server, failed, "MCP server stdout closed");
    let _ = events.send(ClientEvent::Closed);
}

fn handle_message(inner: &Arc<Inner>, message: Incoming, events: &mpsc::UnboundedSender<ClientEvent>) {
    match message {
        Incoming::Response { id, reply } => {
            let Some(correlation) = wire::correlation_of(&id) else {
                warn!(server = %inner.server, id = %id, "protocol anomaly: response with foreign id");
                return;
            };
            match inner.pending.route(correlation) {
                Route::Deliver(tx) => {
                    debug!(server = %inner.server, correlation_id = correlation, "<- response");
                    let _ = tx.send(reply);
                }
                Route::Abandoned => {
                    debug!(server = %inner.server, correlation_id = correlation, "discarding late response");
                }
                Route::Unmatched => {
                    warn!(server = %inner.server, correlation_id = correlation, "protocol anomaly: unmatched response");
                }
            }
        }
        Incoming::Request { id, method, .. } => {
            let response = if method == "ping" {
                OutgoingResponse {
                    jsonrpc: "2.0",
                    id,
                    result: Some(json!({})),
                    error: None,
                }
            } else {
                debug!(server = %inner.server, method = %method, "rejecting unsupported server request");
                OutgoingResponse {
                    jsonrpc: "2.0",
                    id,
                    result: None,
                    error: Some(RpcErrorObject {
                        code: wire::METHOD_NOT_FOUND,
                        message: format!("client does not implement method '{method}'"),
                        data: None,
                    }),
                }
            };
            // Replies go out on their own task; the reader must never wait on
            // the writer, which may be blocked behind a full stdin pipe.
            if let Ok(line) = serde_json::to_string(&response) {
                let inner = Arc::clone(inner);
                tokio::spawn(async move {
                    if let Err(e) = inner.write_line(&line).await {
                        debug!(server = %inner.server, error = %e, "failed to answer server request");
                    }
                });
            }
        }
        Incoming::Notification { method, params } => match method.as_str() {
            "notifications/tools/list_changed" => {
                let _ = events.send(ClientEvent::ToolsChanged);
            }
            "notifications/message" => {
                let params = params.unwrap_or(Value::Null);
                let level = LogLevel::from_protocol(params.get("level").and_then(Value::as_str).unwrap_or("info"));
                let message = match params.get("data") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                match level {
                    LogLevel::Debug => debug!(server = %inner.server, "{message}"),
                    LogLevel::Info => info!(server = %inner.server, "{message}"),
                    LogLevel::Warning => warn!(server = %inner.server, "{message}"),
                    LogLevel::Error => error!(server = %inner.server, "{message}"),
                }
                let _ = events.send(ClientEvent::Notification { level, message });
            }
            other => debug!(server = %inner.server, method = other, "notification"),
        },
    }
}
