//! Connection manager.
//!
//! Owns one slot per server: the state machine, the live protocol client and
//! a supervisor task that watches the process and reconnects with backoff.
//! Slots are independent; nothing here holds a lock across another server's
//! I/O.
//!
//! ```text
//! Disconnected → Connecting → Handshaking → Connected
//! Connected → Reconnecting (unexpected exit) → Connecting … | Error (retries exhausted)
//! any → Disconnected (operator disconnect)
//! ```
//!
//! The catalog slice of a server is replaced on entering `Connected` and
//! purged on leaving it, under the same lock as the state change.

mod backoff;
mod error;
mod launcher;
mod shutdown;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toolmux_core::{
    ConnectionSnapshot, ConnectionState, CredentialStore, ErrorInfo, EventEmitter, ResourceDescriptor,
    RuntimeEvent, RuntimeSettings, ServerDefinition, ServerIdentity, ToolDescriptor,
};
use tracing::{debug, error, info, warn};

use crate::catalog::ToolCatalog;
use crate::client::{ClientEvent, METHOD_NOT_FOUND, ProtocolError, RpcClient};
use crate::installer::Installer;
use crate::registry::ServerRegistry;

pub use backoff::{BackoffDecision, GiveUpReason, decide, delay_for};
pub use error::ConnectionError;
pub use launcher::{
    BoxedReader, BoxedWriter, LaunchError, LaunchedServer, ProcessLauncher, ServerLauncher, ServerProcess,
};
pub use shutdown::terminate_child;

/// Stderr lines kept per connection for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

type StderrTail = Arc<Mutex<VecDeque<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct SlotState {
    snapshot: ConnectionSnapshot,
    client: Option<RpcClient>,
    supervisor: Option<Supervisor>,
}

struct Slot {
    name: String,
    /// Serializes connect/disconnect for this server only.
    op_lock: tokio::sync::Mutex<()>,
    state: Mutex<SlotState>,
}

impl Slot {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            op_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SlotState {
                snapshot: ConnectionSnapshot::disconnected(name),
                client: None,
                supervisor: None,
            }),
        }
    }

    fn state(&self) -> ConnectionState {
        lock(&self.state).snapshot.state
    }
}

/// A connection that completed its handshake.
struct Live {
    client: RpcClient,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    process: Box<dyn ServerProcess>,
    stderr: StderrTail,
}

impl Live {
    /// Close stdin, fail pending calls, then terminate the process.
    async fn teardown(mut self, grace: std::time::Duration) {
        self.client.close().await;
        self.process.shutdown(grace).await;
    }
}

struct Shared {
    registry: Arc<ServerRegistry>,
    installer: Arc<Installer>,
    credentials: Arc<dyn CredentialStore>,
    launcher: Arc<dyn ServerLauncher>,
    catalog: Arc<ToolCatalog>,
    emitter: Arc<dyn EventEmitter>,
    settings: RuntimeSettings,
    spawn_permits: Arc<Semaphore>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

/// Owns every server connection.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<ServerRegistry>,
        installer: Arc<Installer>,
        credentials: Arc<dyn CredentialStore>,
        launcher: Arc<dyn ServerLauncher>,
        catalog: Arc<ToolCatalog>,
        emitter: Arc<dyn EventEmitter>,
        settings: RuntimeSettings,
    ) -> Self {
        let permits = settings.max_live_connections.max(1);
        Self {
            shared: Arc::new(Shared {
                registry,
                installer,
                credentials,
                launcher,
                catalog,
                emitter,
                settings,
                spawn_permits: Arc::new(Semaphore::new(permits)),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn slot(&self, name: &str) -> Arc<Slot> {
        lock(&self.shared.slots)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Slot::new(name)))
            .clone()
    }

    fn existing_slot(&self, name: &str) -> Option<Arc<Slot>> {
        lock(&self.shared.slots).get(name).cloned()
    }

    /// Spawn `name`, complete the handshake and publish its tools.
    pub async fn connect(&self, name: &str) -> Result<ConnectionSnapshot, ConnectionError> {
        let shared = &self.shared;
        let definition = shared
            .registry
            .get(name)
            .await
            .map_err(|_| ConnectionError::UnknownServer(name.to_string()))?;

        let slot = self.slot(name);
        let _op = slot.op_lock.lock().await;

        let state = slot.state();
        if matches!(
            state,
            ConnectionState::Connected | ConnectionState::Connecting | ConnectionState::Handshaking
        ) {
            return Err(ConnectionError::AlreadyConnected {
                server: name.to_string(),
                state,
            });
        }

        if definition.install_required && !shared.installer.is_installed(name) {
            return Err(ConnectionError::NotInstalled(name.to_string()));
        }
        let env = resolve_env(shared, &definition).await?;

        // An operator connect while backing off retries right away.
        if state == ConnectionState::Reconnecting {
            info!(server = %name, "Cancelling backoff for manual reconnect");
        }
        stop_supervisor(&slot).await;

        let Ok(permit) = Arc::clone(&shared.spawn_permits).try_acquire_owned() else {
            let e = ConnectionError::TooManyConnections {
                limit: shared.settings.max_live_connections,
            };
            // The cancelled supervisor's permit went to another server; its lease is ours to drop.
            if slot.state() == ConnectionState::Reconnecting {
                shared.registry.release_lease(name).await;
                settle_error(shared, &slot, &e);
            }
            return Err(e);
        };

        shared
            .registry
            .acquire_lease(name)
            .await
            .map_err(|_| ConnectionError::UnknownServer(name.to_string()))?;

        match establish(shared, &slot, &definition, &env).await {
            Ok(live) => {
                let cancel = CancellationToken::new();
                let handle = tokio::spawn(supervise(
                    Arc::clone(shared),
                    Arc::clone(&slot),
                    definition,
                    env,
                    live,
                    cancel.clone(),
                    permit,
                ));
                let mut state = lock(&slot.state);
                state.supervisor = Some(Supervisor { cancel, handle });
                Ok(state.snapshot.clone())
            }
            Err(e) => {
                drop(permit);
                settle_error(shared, &slot, &e);
                shared.registry.release_lease(name).await;
                Err(e)
            }
        }
    }

    /// Terminate `name` and move it to `Disconnected`.
    ///
    /// Disconnecting a server that is already disconnected is a no-op.
    pub async fn disconnect(&self, name: &str) -> Result<(), ConnectionError> {
        let Some(slot) = self.existing_slot(name) else {
            return if self.shared.registry.contains(name).await {
                Ok(())
            } else {
                Err(ConnectionError::UnknownServer(name.to_string()))
            };
        };
        let _op = slot.op_lock.lock().await;

        let had_supervisor = stop_supervisor(&slot).await;
        if !had_supervisor && slot.state() == ConnectionState::Disconnected {
            return Ok(());
        }

        settle_disconnected(&self.shared, &slot);
        self.shared.registry.release_lease(name).await;
        info!(server = %name, "Disconnected");
        Ok(())
    }

    /// Connect every registered server concurrently.
    pub async fn connect_all(&self) -> Vec<(String, Result<ConnectionSnapshot, ConnectionError>)> {
        let names: Vec<String> = self
            .shared
            .registry
            .list(None)
            .await
            .into_iter()
            .map(|d| d.name)
            .collect();
        let results = join_all(names.iter().map(|n| self.connect(n))).await;
        names.into_iter().zip(results).collect()
    }

    /// Disconnect every server that is not already disconnected.
    pub async fn disconnect_all(&self) {
        let slots: Vec<Arc<Slot>> = lock(&self.shared.slots).values().cloned().collect();
        let results = join_all(slots.iter().map(|slot| self.disconnect(&slot.name))).await;
        for (slot, result) in slots.iter().zip(results) {
            if let Err(e) = result {
                warn!(server = %slot.name, error = %e, "Failed to disconnect server");
            }
        }
    }

    pub async fn snapshot(&self, name: &str) -> Option<ConnectionSnapshot> {
        if let Some(slot) = self.existing_slot(name) {
            return Some(lock(&slot.state).snapshot.clone());
        }
        self.shared
            .registry
            .contains(name)
            .await
            .then(|| ConnectionSnapshot::disconnected(name))
    }

    /// Snapshots of every server that ever had a connection slot, by name.
    pub fn snapshots(&self) -> Vec<ConnectionSnapshot> {
        let mut snapshots: Vec<_> = lock(&self.shared.slots)
            .values()
            .map(|slot| lock(&slot.state).snapshot.clone())
            .collect();
        snapshots.sort_by(|a, b| a.server.cmp(&b.server));
        snapshots
    }

    pub fn state(&self, name: &str) -> ConnectionState {
        self.existing_slot(name)
            .map_or(ConnectionState::Disconnected, |slot| slot.state())
    }

    /// The protocol client of `name`, only while it is `Connected`.
    pub fn client(&self, name: &str) -> Option<RpcClient> {
        let slot = self.existing_slot(name)?;
        let state = lock(&slot.state);
        (state.snapshot.state == ConnectionState::Connected)
            .then(|| state.client.clone())
            .flatten()
    }

    /// Record activity on `name`.
    pub fn touch(&self, name: &str) {
        if let Some(slot) = self.existing_slot(name) {
            lock(&slot.state).snapshot.last_activity = Some(Utc::now());
        }
    }

    /// Drop the slot of a removed server. Only valid while it is disconnected.
    pub fn forget(&self, name: &str) {
        let mut slots = lock(&self.shared.slots);
        if slots.get(name).is_some_and(|slot| slot.state() == ConnectionState::Disconnected) {
            slots.remove(name);
        }
    }

    /// Live spawn permits in use.
    pub fn live_connections(&self) -> usize {
        self.shared
            .settings
            .max_live_connections
            .max(1)
            .saturating_sub(self.shared.spawn_permits.available_permits())
    }
}

/// Cancel and await the supervisor, if any. Returns whether one existed.
async fn stop_supervisor(slot: &Slot) -> bool {
    let supervisor = lock(&slot.state).supervisor.take();
    match supervisor {
        Some(Supervisor { cancel, handle }) => {
            cancel.cancel();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(server = %slot.name, "connection supervisor panicked");
                }
            }
            true
        }
        None => false,
    }
}

/// Apply a state change if the state machine permits it.
///
/// Leaving `Connected` purges the catalog slice and the client in the same
/// critical section.
fn transition(shared: &Shared, slot: &Slot, to: ConnectionState, update: impl FnOnce(&mut SlotState)) -> bool {
    let mut state = lock(&slot.state);
    let from = state.snapshot.state;
    if from != to && !from.can_transition_to(to) {
        warn!(server = %slot.name, %from, %to, "Ignoring invalid connection transition");
        return false;
    }

    let purged = if to == ConnectionState::Connected {
        false
    } else {
        state.client = None;
        shared.catalog.on_server_disconnected(&slot.name)
    };
    update(&mut state);
    state.snapshot.state = to;
    drop(state);

    if purged {
        shared.emitter.emit(RuntimeEvent::tools_updated(&slot.name, 0));
    }
    if from != to {
        match to {
            ConnectionState::Error => error!(server = %slot.name, %from, %to, "Connection state changed"),
            ConnectionState::Reconnecting => warn!(server = %slot.name, %from, %to, "Connection state changed"),
            _ => info!(server = %slot.name, %from, %to, "Connection state changed"),
        }
        shared
            .emitter
            .emit(RuntimeEvent::state_changed(&slot.name, from, to));
    }
    true
}

fn settle_disconnected(shared: &Shared, slot: &Slot) {
    transition(shared, slot, ConnectionState::Disconnected, |s| {
        s.snapshot.pid = None;
        s.snapshot.next_retry_delay_ms = None;
        s.snapshot.reconnect_attempt = 0;
        s.snapshot.identity = None;
    });
}

/// Settle in `Error` with `error` recorded.
fn settle_error(shared: &Shared, slot: &Slot, error: &ConnectionError) {
    let message = error.to_string();
    transition(shared, slot, ConnectionState::Error, |s| {
        s.snapshot.pid = None;
        s.snapshot.next_retry_delay_ms = None;
        s.snapshot.last_error = Some(message.clone());
    });
    shared
        .emitter
        .emit(RuntimeEvent::server_error(ErrorInfo::new(error.category(), &slot.name, message)));
}

/// Static env plus required credentials (staged at install time, else from the store).
async fn resolve_env(shared: &Shared, definition: &ServerDefinition) -> Result<Vec<(String, String)>, ConnectionError> {
    let mut env: Vec<(String, String)> = definition
        .env
        .iter()
        .map(|e| (e.key.clone(), e.value.clone()))
        .collect();
    if definition.required_env.is_empty() {
        return Ok(env);
    }

    let staged = shared.installer.staged_env(&definition.name);
    for key in &definition.required_env {
        let value = match staged.get(key) {
            Some(value) => Some(value.clone()),
            None => shared.credentials.get(key).await.unwrap_or_else(|e| {
                warn!(server = %definition.name, key = %key, error = %e, "credential lookup failed");
                None
            }),
        };
        let value = value.ok_or_else(|| ConnectionError::MissingCredential {
            server: definition.name.clone(),
            key: key.clone(),
        })?;
        env.push((key.clone(), value));
    }
    Ok(env)
}

fn spawn_stderr_pump(server: String, stderr: BoxedReader, tail: StderrTail) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    debug!(server = %server, "stderr: {line}");
                    let mut tail = lock(&tail);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        }
    });
}

/// Launch the process and run the handshake. Ends in `Connected` on success.
async fn establish(
    shared: &Shared,
    slot: &Slot,
    definition: &ServerDefinition,
    env: &[(String, String)],
) -> Result<Live, ConnectionError> {
    let name = definition.name.as_str();
    transition(shared, slot, ConnectionState::Connecting, |s| {
        s.snapshot.pid = None;
        s.snapshot.next_retry_delay_ms = None;
    });

    let launched = shared
        .launcher
        .launch(definition, env)
        .await
        .map_err(|source| ConnectionError::Launch {
            server: name.to_string(),
            source,
        })?;
    let LaunchedServer {
        stdin,
        stdout,
        stderr,
        mut process,
    } = launched;
    let pid = process.id();

    let tail: StderrTail = Arc::default();
    if let Some(stderr) = stderr {
        spawn_stderr_pump(name.to_string(), stderr, Arc::clone(&tail));
    }

    let (client, events) = RpcClient::start(name, stdout, stdin, shared.settings.max_consecutive_anomalies);
    transition(shared, slot, ConnectionState::Handshaking, |s| s.snapshot.pid = pid);

    let timeout = shared.settings.handshake_timeout();
    let handshake = tokio::time::timeout(timeout, handshake(&client)).await;
    let (identity, tools, resources) = match handshake {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            client.close().await;
            process.shutdown(shared.settings.shutdown_grace()).await;
            return Err(annotate(ConnectionError::from_protocol(name, e), &tail));
        }
        Err(_) => {
            client.close().await;
            process.shutdown(shared.settings.shutdown_grace()).await;
            return Err(annotate(
                ConnectionError::HandshakeTimeout {
                    server: name.to_string(),
                    after_ms: millis(timeout),
                },
                &tail,
            ));
        }
    };

    let count = tools.len();
    let resource_count = resources.len();
    transition(shared, slot, ConnectionState::Connected, |s| {
        shared
            .catalog
            .publish(name, &definition.category, tools, resources);
        s.client = Some(client.clone());
        s.snapshot.identity = Some(identity);
        s.snapshot.last_error = None;
        s.snapshot.reconnect_attempt = 0;
        s.snapshot.next_retry_delay_ms = None;
        s.snapshot.last_activity = Some(Utc::now());
    });
    shared.emitter.emit(RuntimeEvent::tools_updated(name, count));
    info!(server = %name, pid = ?pid, tool_count = count, resource_count, "Server connected");

    Ok(Live {
        client,
        events,
        process,
        stderr: tail,
    })
}

/// Attach the stderr tail to process-exit errors, where it usually says why.
fn annotate(error: ConnectionError, tail: &StderrTail) -> ConnectionError {
    let ConnectionError::ProcessExited { server, detail } = error else {
        return error;
    };
    let lines = lock(tail);
    if lines.is_empty() {
        return ConnectionError::ProcessExited { server, detail };
    }
    let stderr = lines.iter().cloned().collect::<Vec<_>>().join("\n");
    ConnectionError::ProcessExited {
        server,
        detail: format!("{detail}; stderr: {stderr}"),
    }
}

type Discovered = (ServerIdentity, Vec<ToolDescriptor>, Vec<ResourceDescriptor>);

async fn handshake(client: &RpcClient) -> Result<Discovered, ProtocolError> {
    let identity = client.initialize().await?;
    let tools = match client.list_tools().await {
        Ok(tools) => tools,
        // A server without tools support simply has none.
        Err(ProtocolError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => Vec::new(),
        Err(e) => return Err(e),
    };
    // Only servers that advertise resources are asked for them.
    let resources = if identity.capabilities.get("resources").is_some() {
        match client.list_resources().await {
            Ok(resources) => resources,
            Err(ProtocolError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => Vec::new(),
            Err(e) => return Err(e),
        }
    } else {
        Vec::new()
    };
    Ok((identity, tools, resources))
}

/// Replace the catalog slice after `notifications/tools/list_changed`.
async fn refresh_tools(shared: Arc<Shared>, slot: Arc<Slot>, client: RpcClient, category: String) {
    let tools = match tokio::time::timeout(shared.settings.handshake_timeout(), client.list_tools()).await {
        Ok(Ok(tools)) => tools,
        Ok(Err(e)) => {
            warn!(server = %slot.name, error = %e, "Failed to refresh tools");
            return;
        }
        Err(_) => {
            warn!(server = %slot.name, "Timed out refreshing tools");
            return;
        }
    };

    let count = tools.len();
    let applied = {
        let state = lock(&slot.state);
        let current = state.snapshot.state == ConnectionState::Connected
            && state.client.as_ref().is_some_and(|c| c.same_connection(&client));
        if current {
            shared.catalog.on_server_connected(&slot.name, &category, tools);
        }
        current
    };
    if applied {
        info!(server = %slot.name, tool_count = count, "Tool list refreshed");
        shared.emitter.emit(RuntimeEvent::tools_updated(&slot.name, count));
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Cancelled,
    Lost(ConnectionError),
    Fatal(ConnectionError),
}

/// Watch a connected session until it ends.
async fn watch(shared: &Arc<Shared>, slot: &Arc<Slot>, live: &mut Live, category: &str, cancel: &CancellationToken) -> SessionEnd {
    let name = slot.name.clone();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return SessionEnd::Cancelled,
            detail = live.process.wait() => {
                return SessionEnd::Lost(annotate(ConnectionError::ProcessExited { server: name, detail }, &live.stderr));
            }
            event = live.events.recv() => match event {
                Some(ClientEvent::ToolsChanged) => {
                    tokio::spawn(refresh_tools(
                        Arc::clone(shared),
                        Arc::clone(slot),
                        live.client.clone(),
                        category.to_string(),
                    ));
                }
                Some(ClientEvent::Notification { level, message }) => {
                    shared.emitter.emit(RuntimeEvent::ServerNotification {
                        server: name.clone(),
                        level,
                        message,
                    });
                }
                Some(ClientEvent::AnomalyLimitExceeded { count }) => {
                    return SessionEnd::Fatal(ConnectionError::AnomalyLimit { server: name, count });
                }
                Some(ClientEvent::Closed) | None => {
                    return SessionEnd::Lost(annotate(
                        ConnectionError::ProcessExited {
                            server: name,
                            detail: "stdout closed".to_string(),
                        },
                        &live.stderr,
                    ));
                }
            }
        }
    }
}

/// Supervisor task: watch the session, reconnect with backoff after
/// unexpected exits, settle in `Error` when giving up.
async fn supervise(
    shared: Arc<Shared>,
    slot: Arc<Slot>,
    definition: ServerDefinition,
    env: Vec<(String, String)>,
    mut live: Live,
    cancel: CancellationToken,
    permit: OwnedSemaphorePermit,
) {
    let grace = shared.settings.shutdown_grace();
    let policy = shared.settings.backoff;

    loop {
        let lost = match watch(&shared, &slot, &mut live, &definition.category, &cancel).await {
            // Each end leaves `Connected` first: the catalog slice and the
            // client are gone before the process is given its grace period.
            SessionEnd::Cancelled => {
                settle_disconnected(&shared, &slot);
                live.teardown(grace).await;
                return;
            }
            SessionEnd::Fatal(e) => {
                shared.registry.release_lease(&slot.name).await;
                settle_error(&shared, &slot, &e);
                live.teardown(grace).await;
                drop(permit);
                return;
            }
            SessionEnd::Lost(e) => e,
        };

        let message = lost.to_string();
        transition(&shared, &slot, ConnectionState::Reconnecting, |s| {
            s.snapshot.pid = None;
            s.snapshot.last_error = Some(message.clone());
        });
        shared
            .emitter
            .emit(RuntimeEvent::server_error(ErrorInfo::new(lost.category(), &slot.name, message)));
        live.teardown(grace).await;

        let mut attempt = 1;
        let mut last_error = lost;
        live = loop {
            let delay = match decide(&policy, attempt, &last_error) {
                BackoffDecision::Retry { delay, .. } => delay,
                BackoffDecision::GiveUp(reason) => {
                    warn!(server = %slot.name, ?reason, "Giving up on reconnecting");
                    // Lease and permit are free before `Error` becomes visible.
                    shared.registry.release_lease(&slot.name).await;
                    drop(permit);
                    settle_error(&shared, &slot, &last_error);
                    return;
                }
            };

            {
                let mut state = lock(&slot.state);
                state.snapshot.reconnect_attempt = attempt;
                state.snapshot.next_retry_delay_ms = Some(millis(delay));
            }
            warn!(server = %slot.name, attempt, delay_ms = millis(delay), "Reconnect scheduled");
            shared.emitter.emit(RuntimeEvent::ReconnectScheduled {
                server: slot.name.clone(),
                attempt,
                delay_ms: millis(delay),
            });

            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = establish(&shared, &slot, &definition, &env) => Some(result),
            };
            match result {
                None => {
                    // Interrupted mid-attempt: leave the slot where a new connect can start.
                    transition(&shared, &slot, ConnectionState::Reconnecting, |s| s.snapshot.pid = None);
                    return;
                }
                Some(Ok(live)) => break live,
                Some(Err(e)) => {
                    warn!(server = %slot.name, attempt, error = %e, "Reconnect attempt failed");
                    let message = e.to_string();
                    transition(&shared, &slot, ConnectionState::Reconnecting, |s| {
                        s.snapshot.pid = None;
                        s.snapshot.last_error = Some(message);
                    });
                    last_error = e;
                    attempt += 1;
                }
            }
        };
    }
}
