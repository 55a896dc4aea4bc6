//! Install-then-connect scenarios, including the real calculator binary.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{FakeLauncher, fast_settings};
use serde_json::json;
use toolmux_core::{
    ChannelEmitter, CommandFailure, CommandOutput, ConnectionState, InstallCommand, InstallFailure, InstallMethod,
    InstallStatus, InvocationOutcome, InvocationRequest, PackageRunner, RuntimeEvent, RuntimeSettings, ServerDefinition,
};
use toolmux_mcp::adapters::{CommandPackageRunner, MemoryCredentialStore, MemoryStore};
use toolmux_mcp::connection::{ProcessLauncher, ServerLauncher};
use toolmux_mcp::{ConnectionError, DispatchError, RuntimeDeps, RuntimeError, ToolRuntime};

/// Runner that finds every program it is not told is missing, and counts install runs.
#[derive(Default)]
struct StubRunner {
    missing: Vec<&'static str>,
    runs: AtomicUsize,
}

#[async_trait]
impl PackageRunner for StubRunner {
    async fn probe(&self, program: &str) -> Option<PathBuf> {
        (!self.missing.contains(&program)).then(|| PathBuf::from("/usr/bin").join(program))
    }

    async fn run(&self, _command: &InstallCommand, _timeout: Duration) -> Result<CommandOutput, CommandFailure> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(CommandOutput {
            stdout_tail: "added 1 package".to_string(),
        })
    }
}

fn runtime_with(
    runner: Arc<dyn PackageRunner>,
    launcher: Arc<dyn ServerLauncher>,
    credentials: MemoryCredentialStore,
    emitter: ChannelEmitter,
    settings: RuntimeSettings,
) -> ToolRuntime {
    ToolRuntime::new(
        RuntimeDeps {
            store: Arc::new(MemoryStore::new()),
            credentials: Arc::new(credentials),
            runner,
            launcher,
            emitter: Arc::new(emitter),
        },
        settings,
    )
    .unwrap()
}

fn search_definition() -> ServerDefinition {
    ServerDefinition::custom("search", "search-server", vec![])
        .with_install(InstallMethod::Npm, "@example/search-server")
        .with_required_env("SEARCH_KEY")
}

#[tokio::test]
async fn calculator_install_connect_and_call() {
    let runtime = runtime_with(
        Arc::new(CommandPackageRunner::new()),
        Arc::new(ProcessLauncher),
        MemoryCredentialStore::new(),
        ChannelEmitter::new(256),
        // A real process start can be slow on a loaded machine.
        RuntimeSettings {
            handshake_timeout_ms: 10_000,
            ..fast_settings()
        },
    );
    runtime
        .add_server(
            ServerDefinition::custom("calc", env!("CARGO_BIN_EXE_toolmux-calculator"), vec![]).with_category("math"),
        )
        .await
        .unwrap();

    let job = runtime.install("calc").await;
    assert_eq!(job.status, InstallStatus::Done, "install failed: {:?}", job.failure);

    let snapshot = runtime.connect("calc").await.unwrap();
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.identity.unwrap().name, "toolmux-calculator");

    let names: Vec<String> = runtime
        .catalog()
        .entries_for("calc")
        .into_iter()
        .map(|e| e.tool.name)
        .collect();
    assert_eq!(names, ["add", "subtract", "multiply", "divide", "power", "sqrt"]);

    let result = runtime
        .invoke(InvocationRequest::new("calc", "add", json!({ "a": 2, "b": 3 })))
        .await
        .unwrap();
    let InvocationOutcome::Success { payload } = result.outcome else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(payload["content"][0]["text"], "5");

    let result = runtime
        .invoke(InvocationRequest::new("calc", "divide", json!({ "a": 1, "b": 0 })))
        .await
        .unwrap();
    assert!(matches!(
        result.outcome,
        InvocationOutcome::ToolError { ref message, .. } if message == "division by zero"
    ));

    let err = runtime
        .invoke(InvocationRequest::new("calc", "sqrt", json!({ "x": "nine" })))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::SchemaValidation { ref field, .. }) if field == "x"
    ));

    runtime.disconnect("calc").await.unwrap();
    assert_eq!(runtime.catalog().tool_count("calc"), 0);
    assert_eq!(runtime.connections().state("calc"), ConnectionState::Disconnected);
}

#[tokio::test]
async fn install_stages_credentials_for_connect() {
    let emitter = ChannelEmitter::new(256);
    let mut events = emitter.subscribe();
    let runner = Arc::new(StubRunner::default());
    let launcher = FakeLauncher::default();
    let runtime = runtime_with(
        runner.clone(),
        Arc::new(launcher.clone()),
        MemoryCredentialStore::new().with("SEARCH_KEY", "k-123"),
        emitter,
        fast_settings(),
    );
    runtime.add_server(search_definition()).await.unwrap();

    let err = runtime.connect("search").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Connection(ConnectionError::NotInstalled(_))));
    assert_eq!(launcher.launches(), 0);

    let job = runtime.install("search").await;
    assert_eq!(job.status, InstallStatus::Done);
    assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
    assert!(runtime.status().await[0].installed);

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RuntimeEvent::InstallStatusChanged { status, job_id, .. } = event {
            assert_eq!(job_id, job.id);
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        [
            InstallStatus::Pending,
            InstallStatus::CheckingDependencies,
            InstallStatus::Installing,
            InstallStatus::ConfiguringKeys,
            InstallStatus::Done
        ]
    );

    runtime.connect("search").await.unwrap();
    assert!(
        launcher
            .last_env()
            .contains(&("SEARCH_KEY".to_string(), "k-123".to_string()))
    );
}

#[tokio::test]
async fn missing_dependency_fails_without_spawning() {
    let runner = Arc::new(StubRunner {
        missing: vec!["npm"],
        ..StubRunner::default()
    });
    let launcher = FakeLauncher::default();
    let runtime = runtime_with(
        runner.clone(),
        Arc::new(launcher.clone()),
        MemoryCredentialStore::new().with("SEARCH_KEY", "k-123"),
        ChannelEmitter::new(16),
        fast_settings(),
    );
    runtime.add_server(search_definition()).await.unwrap();

    let job = runtime.install("search").await;
    assert_eq!(job.status, InstallStatus::Failed);
    assert!(matches!(
        job.failure,
        Some(InstallFailure::MissingDependency { ref program }) if program == "npm"
    ));
    assert_eq!(runner.runs.load(Ordering::SeqCst), 0);

    assert!(runtime.connect("search").await.is_err());
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn retrying_an_install_creates_a_new_job() {
    let runner = Arc::new(StubRunner::default());
    let runtime = runtime_with(
        runner,
        Arc::new(FakeLauncher::default()),
        MemoryCredentialStore::new(),
        ChannelEmitter::new(16),
        fast_settings(),
    );
    runtime.add_server(search_definition()).await.unwrap();

    let first = runtime.install("search").await;
    assert!(matches!(
        first.failure,
        Some(InstallFailure::MissingCredential { ref key }) if key == "SEARCH_KEY"
    ));

    let second = runtime.install("search").await;
    assert_ne!(first.id, second.id);
    assert_eq!(runtime.installer().job(first.id).unwrap().status, InstallStatus::Failed);
    assert_eq!(runtime.installer().latest_job("search").unwrap().id, second.id);
}

#[tokio::test]
async fn completed_install_survives_a_restart() {
    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(StubRunner::default());
    let launcher = FakeLauncher::default();
    let boot = || {
        ToolRuntime::new(
            RuntimeDeps {
                store: store.clone(),
                credentials: Arc::new(MemoryCredentialStore::new().with("SEARCH_KEY", "k-123")),
                runner: runner.clone(),
                launcher: Arc::new(launcher.clone()),
                emitter: Arc::new(ChannelEmitter::new(16)),
            },
            fast_settings(),
        )
        .unwrap()
    };

    let first = boot();
    first.start().await.unwrap();
    first.add_server(search_definition()).await.unwrap();
    assert_eq!(first.install("search").await.status, InstallStatus::Done);
    first.shutdown().await;

    let second = boot();
    assert_eq!(second.start().await.unwrap(), 1);
    assert!(second.status().await[0].installed);
    second.connect("search").await.unwrap();
    assert!(
        launcher
            .last_env()
            .contains(&("SEARCH_KEY".to_string(), "k-123".to_string()))
    );
    assert_eq!(runner.runs.load(Ordering::SeqCst), 1);

    // Removing the server drops its install record too.
    second.disconnect("search").await.unwrap();
    second.remove_server("search").await.unwrap();
    assert!(store.installed().is_empty());
}

#[tokio::test]
async fn datetime_server_formats_timestamps() {
    let runtime = runtime_with(
        Arc::new(CommandPackageRunner::new()),
        Arc::new(ProcessLauncher),
        MemoryCredentialStore::new(),
        ChannelEmitter::new(64),
        RuntimeSettings {
            handshake_timeout_ms: 10_000,
            ..fast_settings()
        },
    );
    runtime
        .add_server(ServerDefinition::custom("clock", env!("CARGO_BIN_EXE_toolmux-datetime"), vec![]))
        .await
        .unwrap();
    runtime.connect("clock").await.unwrap();
    assert_eq!(runtime.catalog().tool_count("clock"), 3);

    let result = runtime
        .invoke(InvocationRequest::new(
            "clock",
            "format_date",
            json!({ "timestamp": 0, "timezone": "UTC", "format": "%Y-%m-%d" }),
        ))
        .await
        .unwrap();
    let InvocationOutcome::Success { payload } = result.outcome else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(payload["content"][0]["text"], "1970-01-01");

    let result = runtime
        .invoke(InvocationRequest::new("clock", "current_time", json!({ "timezone": "Nowhere/City" })))
        .await
        .unwrap();
    assert!(matches!(result.outcome, InvocationOutcome::ToolError { .. }));

    runtime.disconnect("clock").await.unwrap();
}
