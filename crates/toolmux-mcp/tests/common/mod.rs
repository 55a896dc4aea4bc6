//! Shared fixtures for integration tests: an in-process MCP server behind
//! the `ServerLauncher` seam, plus helpers to build a runtime around it.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toolmux_core::{
    BackoffPolicy, ChannelEmitter, ConnectionSnapshot, ConnectionState, RuntimeEvent, RuntimeSettings, ServerDefinition,
};
use toolmux_mcp::adapters::{CommandPackageRunner, MemoryCredentialStore, MemoryStore};
use toolmux_mcp::connection::{LaunchError, LaunchedServer, ServerLauncher, ServerProcess};
use toolmux_mcp::{RuntimeDeps, ToolRuntime};

/// Tool advertised by the fake server with a `{ text: string }` schema.
pub fn text_tool(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("fake {name} tool"),
        "inputSchema": {
            "type": "object",
            "properties": { "text": { "type": "string" }, "ms": { "type": "integer" } },
            "additionalProperties": false
        }
    })
}

/// `echo`, `slow`, `hang`, `fail` and `crash`.
pub fn default_tools() -> Vec<Value> {
    ["echo", "slow", "hang", "fail", "crash"]
        .into_iter()
        .map(text_tool)
        .collect()
}

struct Instance {
    exit: CancellationToken,
    hangup: CancellationToken,
    push: mpsc::UnboundedSender<String>,
}

struct FakeState {
    tools: Mutex<Vec<Value>>,
    resources: Mutex<Vec<Value>>,
    protocol_version: Mutex<String>,
    failing_launches: AtomicUsize,
    hang_handshake: AtomicBool,
    hang_servers: Mutex<HashSet<String>>,
    slow_shutdown: AtomicBool,
    launches: AtomicUsize,
    calls: AtomicUsize,
    last_env: Mutex<Vec<(String, String)>>,
    current: Mutex<Option<Instance>>,
}

/// Launches in-process servers that speak just enough MCP for the runtime.
///
/// Tools: `echo` replies with its `text`, `slow` waits `ms` first (without
/// blocking other requests), `hang` never replies, `fail` reports a tool
/// error and `crash` kills the server mid-call. Resources, when configured,
/// read back as `contents of <uri>`.
#[derive(Clone)]
pub struct FakeLauncher {
    state: Arc<FakeState>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new(default_tools())
    }
}

impl FakeLauncher {
    pub fn new(tools: Vec<Value>) -> Self {
        Self {
            state: Arc::new(FakeState {
                tools: Mutex::new(tools),
                resources: Mutex::new(Vec::new()),
                protocol_version: Mutex::new("2025-06-18".to_string()),
                failing_launches: AtomicUsize::new(0),
                hang_handshake: AtomicBool::new(false),
                hang_servers: Mutex::new(HashSet::new()),
                slow_shutdown: AtomicBool::new(false),
                launches: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                last_env: Mutex::new(Vec::new()),
                current: Mutex::new(None),
            }),
        }
    }

    pub fn with_protocol_version(self, version: &str) -> Self {
        *self.state.protocol_version.lock().unwrap() = version.to_string();
        self
    }

    /// Advertise the resources capability and serve `resources`.
    pub fn with_resources(self, resources: Vec<Value>) -> Self {
        *self.state.resources.lock().unwrap() = resources;
        self
    }

    /// Make the next `n` launches fail to spawn.
    pub fn fail_next_launches(&self, n: usize) {
        self.state.failing_launches.store(n, Ordering::SeqCst);
    }

    pub fn hang_handshake(&self, hang: bool) {
        self.state.hang_handshake.store(hang, Ordering::SeqCst);
    }

    /// Never answer `initialize` for `server` only.
    pub fn hang_handshake_for(&self, server: &str) {
        self.state.hang_servers.lock().unwrap().insert(server.to_string());
    }

    /// Ignore SIGTERM: `shutdown` takes the whole grace period.
    pub fn slow_shutdown(&self, slow: bool) {
        self.state.slow_shutdown.store(slow, Ordering::SeqCst);
    }

    pub fn set_tools(&self, tools: Vec<Value>) {
        *self.state.tools.lock().unwrap() = tools;
    }

    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// `tools/call` requests received across all launches.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn last_env(&self) -> Vec<(String, String)> {
        self.state.last_env.lock().unwrap().clone()
    }

    /// Kill the most recently launched server.
    pub fn crash(&self) {
        if let Some(instance) = self.state.current.lock().unwrap().as_ref() {
            instance.exit.cancel();
        }
    }

    /// Close the most recent server's stdout while the process keeps running.
    pub fn close_stdout(&self) {
        if let Some(instance) = self.state.current.lock().unwrap().as_ref() {
            instance.hangup.cancel();
        }
    }

    /// Send a message from the most recent server to the client.
    pub fn push(&self, message: &Value) {
        self.push_raw(&message.to_string());
    }

    /// Send one line verbatim, whether or not it is JSON.
    pub fn push_raw(&self, line: &str) {
        if let Some(instance) = self.state.current.lock().unwrap().as_ref() {
            let _ = instance.push.send(line.to_string());
        }
    }
}

struct FakeProcess {
    pid: Option<u32>,
    exit: CancellationToken,
    slow_shutdown: bool,
}

#[async_trait]
impl ServerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> String {
        self.exit.cancelled().await;
        "exit status: 1".to_string()
    }

    async fn shutdown(&mut self, grace: Duration) {
        if self.slow_shutdown {
            tokio::time::sleep(grace).await;
        }
        self.exit.cancel();
        self.pid = None;
    }
}

#[async_trait]
impl ServerLauncher for FakeLauncher {
    async fn launch(&self, definition: &ServerDefinition, env: &[(String, String)]) -> Result<LaunchedServer, LaunchError> {
        let launch = self.state.launches.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.last_env.lock().unwrap() = env.to_vec();

        let failing = self.state.failing_launches.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_launches.store(failing - 1, Ordering::SeqCst);
            return Err(LaunchError::Spawn("fake spawn failure".to_string()));
        }

        let (client_stdin, server_stdin) = tokio::io::duplex(64 * 1024);
        let (server_stdout, client_stdout) = tokio::io::duplex(64 * 1024);
        let exit = CancellationToken::new();
        let hangup = CancellationToken::new();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        *self.state.current.lock().unwrap() = Some(Instance {
            exit: exit.clone(),
            hangup: hangup.clone(),
            push: push_tx,
        });

        let hang = self.state.hang_handshake.load(Ordering::SeqCst)
            || self.state.hang_servers.lock().unwrap().contains(&definition.name);
        tokio::spawn(serve(
            Arc::clone(&self.state),
            hang,
            server_stdin,
            server_stdout,
            exit.clone(),
            hangup,
            push_rx,
        ));

        Ok(LaunchedServer {
            stdin: Box::new(client_stdin),
            stdout: Box::new(client_stdout),
            stderr: None,
            process: Box::new(FakeProcess {
                pid: Some(10_000 + u32::try_from(launch).unwrap()),
                exit,
                slow_shutdown: self.state.slow_shutdown.load(Ordering::SeqCst),
            }),
        })
    }
}

type Writer = Arc<tokio::sync::Mutex<DuplexStream>>;

async fn write_line(writer: &Writer, line: &str) {
    let mut writer = writer.lock().await;
    let _ = writer.write_all(format!("{line}\n").as_bytes()).await;
    let _ = writer.flush().await;
}

async fn serve(
    state: Arc<FakeState>,
    hang_handshake: bool,
    stdin: DuplexStream,
    stdout: DuplexStream,
    exit: CancellationToken,
    hangup: CancellationToken,
    mut push: mpsc::UnboundedReceiver<String>,
) {
    let writer: Writer = Arc::new(tokio::sync::Mutex::new(stdout));
    let mut lines = BufReader::new(stdin).lines();
    loop {
        tokio::select! {
            () = exit.cancelled() => break,
            () = hangup.cancelled() => break,
            Some(line) = push.recv() => write_line(&writer, &line).await,
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    // Client closed our stdin: exit like a real server would.
                    exit.cancel();
                    break;
                };
                if let Ok(message) = serde_json::from_str::<Value>(&line) {
                    handle(&state, hang_handshake, &writer, &exit, message).await;
                }
            }
        }
    }
    let _ = writer.lock().await.shutdown().await;
}

async fn handle(state: &Arc<FakeState>, hang_handshake: bool, writer: &Writer, exit: &CancellationToken, message: Value) {
    // Notifications need no reply.
    let Some(id) = message.get("id").cloned() else {
        return;
    };
    if message.get("method").is_none() {
        return;
    }
    let reply = |result: Value| json!({ "jsonrpc": "2.0", "id": id, "result": result }).to_string();
    let params = message.get("params").cloned().unwrap_or(Value::Null);

    match message["method"].as_str().unwrap_or_default() {
        "initialize" => {
            if hang_handshake {
                return;
            }
            let version = state.protocol_version.lock().unwrap().clone();
            let mut capabilities = json!({ "tools": { "listChanged": true } });
            if !state.resources.lock().unwrap().is_empty() {
                capabilities["resources"] = json!({});
            }
            let result = json!({
                "protocolVersion": version,
                "serverInfo": { "name": "fake", "version": "1.0.0" },
                "capabilities": capabilities
            });
            write_line(writer, &reply(result)).await;
        }
        "tools/list" => {
            let tools = state.tools.lock().unwrap().clone();
            write_line(writer, &reply(json!({ "tools": tools }))).await;
        }
        "resources/list" => {
            let resources = state.resources.lock().unwrap().clone();
            write_line(writer, &reply(json!({ "resources": resources }))).await;
        }
        "resources/read" => {
            let uri = params["uri"].as_str().unwrap_or_default().to_string();
            let known = state.resources.lock().unwrap().iter().any(|r| r["uri"] == uri.as_str());
            let line = if known {
                reply(json!({ "contents": [{ "uri": uri, "mimeType": "text/plain", "text": format!("contents of {uri}") }] }))
            } else {
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32002, "message": format!("Resource not found: {uri}") }
                })
                .to_string()
            };
            write_line(writer, &line).await;
        }
        "tools/call" => {
            state.calls.fetch_add(1, Ordering::SeqCst);
            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
            let text = args.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
            let content = |text: &str| json!({ "content": [{ "type": "text", "text": text }] });
            match params["name"].as_str().unwrap_or_default() {
                "echo" => write_line(writer, &reply(content(&text))).await,
                "slow" => {
                    let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(50);
                    let writer = Arc::clone(writer);
                    let line = reply(content(&text));
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        write_line(&writer, &line).await;
                    });
                }
                "hang" => {}
                "fail" => {
                    let mut result = content("tool failed");
                    result["isError"] = json!(true);
                    write_line(writer, &reply(result)).await;
                }
                "crash" => exit.cancel(),
                other => {
                    let error = json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32602, "message": format!("unknown tool: {other}") }
                    });
                    write_line(writer, &error.to_string()).await;
                }
            }
        }
        method => {
            let error = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            });
            write_line(writer, &error.to_string()).await;
        }
    }
}

/// Settings with short timeouts and fast backoff.
pub fn fast_settings() -> RuntimeSettings {
    RuntimeSettings {
        handshake_timeout_ms: 500,
        default_call_timeout_ms: 2_000,
        shutdown_grace_ms: 200,
        backoff: BackoffPolicy {
            initial_delay_ms: 10,
            max_delay_ms: 40,
            multiplier: 2,
            max_retries: 3,
        },
        ..RuntimeSettings::default()
    }
}

pub struct Harness {
    pub runtime: ToolRuntime,
    pub launcher: FakeLauncher,
    pub events: broadcast::Receiver<RuntimeEvent>,
}

/// A started runtime over `launcher` with one custom server per name.
pub async fn harness(launcher: FakeLauncher, servers: &[&str], settings: RuntimeSettings) -> Harness {
    let emitter = ChannelEmitter::new(1024);
    let events = emitter.subscribe();
    let runtime = ToolRuntime::new(
        RuntimeDeps {
            store: Arc::new(MemoryStore::new()),
            credentials: Arc::new(MemoryCredentialStore::new()),
            runner: Arc::new(CommandPackageRunner::new()),
            launcher: Arc::new(launcher.clone()),
            emitter: Arc::new(emitter),
        },
        settings,
    )
    .unwrap();
    runtime.start().await.unwrap();
    for name in servers {
        runtime
            .add_server(ServerDefinition::custom(*name, "fake-server", vec![]))
            .await
            .unwrap();
    }
    Harness {
        runtime,
        launcher,
        events,
    }
}

/// Poll until `condition` holds, failing after five seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {what}");
}

/// Connection snapshot of `server`, if it ever had a slot.
pub fn snapshot_of(runtime: &ToolRuntime, server: &str) -> Option<ConnectionSnapshot> {
    runtime
        .connections()
        .snapshots()
        .into_iter()
        .find(|s| s.server == server)
}

/// Poll until `server` reaches `state`, failing after five seconds.
pub async fn wait_for_state(runtime: &ToolRuntime, server: &str, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while runtime.connections().state(server) != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "{server} never reached {state}, stuck in {}",
            runtime.connections().state(server)
        )
    });
}
