//! Invocation dispatch against in-process servers.

mod common;

use std::time::{Duration, Instant};

use common::{FakeLauncher, eventually, fast_settings, harness};
use serde_json::json;
use toolmux_core::{ConnectionState, InvocationOutcome, InvocationRequest, TransportErrorKind};
use toolmux_mcp::{DispatchError, RuntimeError};

#[tokio::test]
async fn echo_round_trip() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let result = h
        .runtime
        .invoke(InvocationRequest::new("alpha", "echo", json!({ "text": "hello" })))
        .await
        .unwrap();
    assert_eq!(result.server, "alpha");
    assert_eq!(result.tool, "echo");
    let InvocationOutcome::Success { payload } = result.outcome else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(payload["content"][0]["text"], "hello");

    let snapshot = h.runtime.connections().snapshot("alpha").await.unwrap();
    assert!(snapshot.last_activity.is_some());
}

#[tokio::test]
async fn schema_violation_never_reaches_the_server() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    for args in [json!({ "text": 42 }), json!({ "unexpected": true }), json!("not an object")] {
        let err = h
            .runtime
            .invoke(InvocationRequest::new("alpha", "echo", args))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Dispatch(DispatchError::SchemaValidation { .. })));
        assert!(!err.is_retryable());
    }
    assert_eq!(h.launcher.calls(), 0);
}

#[tokio::test]
async fn unknown_tool_and_disconnected_server() {
    let h = harness(FakeLauncher::default(), &["alpha", "beta"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let err = h
        .runtime
        .invoke(InvocationRequest::new("alpha", "nope", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Dispatch(DispatchError::UnknownTool { .. })));

    let err = h
        .runtime
        .invoke(InvocationRequest::new("beta", "echo", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Dispatch(DispatchError::ServerNotConnected(_))));
    assert_eq!(h.launcher.calls(), 0);
}

#[tokio::test]
async fn tool_errors_pass_through() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let result = h
        .runtime
        .invoke(InvocationRequest::new("alpha", "fail", json!({})))
        .await
        .unwrap();
    assert_eq!(
        result.outcome,
        InvocationOutcome::ToolError {
            code: None,
            message: "tool failed".into()
        }
    );
    assert!(!result.outcome.is_retryable());
    // The connection is unaffected.
    assert_eq!(h.runtime.connections().state("alpha"), ConnectionState::Connected);
}

#[tokio::test]
async fn silent_server_times_out_on_the_callers_deadline() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let deadline = Duration::from_millis(150);
    let started = Instant::now();
    let result = h
        .runtime
        .invoke(InvocationRequest::new("alpha", "hang", json!({})).with_timeout(deadline))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(matches!(result.outcome, InvocationOutcome::TimedOut { .. }));
    assert!(result.outcome.is_retryable());
    assert!(elapsed >= deadline);
    assert!(elapsed < deadline + Duration::from_secs(1));
    assert_eq!(h.launcher.calls(), 1);

    // A timed-out call leaves the connection usable.
    let result = h
        .runtime
        .invoke(InvocationRequest::new("alpha", "echo", json!({ "text": "still here" })))
        .await
        .unwrap();
    assert!(result.outcome.is_success());
}

#[tokio::test]
async fn crash_mid_call_is_a_transport_error_then_reconnects() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let result = h
        .runtime
        .invoke(InvocationRequest::new("alpha", "crash", json!({})))
        .await
        .unwrap();
    assert_eq!(
        result.outcome,
        InvocationOutcome::TransportError {
            kind: TransportErrorKind::ConnectionClosed
        }
    );

    eventually("reconnect after crash", || h.launcher.launches() == 2).await;
}

#[tokio::test]
async fn concurrent_calls_get_their_own_replies() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    // The first call is answered last.
    let (slow, fast) = tokio::join!(
        h.runtime.invoke(InvocationRequest::new(
            "alpha",
            "slow",
            json!({ "text": "first", "ms": 200 })
        )),
        h.runtime.invoke(InvocationRequest::new(
            "alpha",
            "slow",
            json!({ "text": "second", "ms": 10 })
        )),
    );
    let (slow, fast) = (slow.unwrap(), fast.unwrap());
    assert_ne!(slow.correlation_id, fast.correlation_id);

    let text = |outcome: &InvocationOutcome| match outcome {
        InvocationOutcome::Success { payload } => payload["content"][0]["text"].as_str().unwrap().to_string(),
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(text(&slow.outcome), "first");
    assert_eq!(text(&fast.outcome), "second");
    assert!(fast.elapsed_ms < slow.elapsed_ms);
}

#[tokio::test]
async fn hung_call_on_one_server_does_not_block_another() {
    let h = harness(FakeLauncher::default(), &["alpha", "beta"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();
    h.runtime.connect("beta").await.unwrap();

    let (hung, quick) = tokio::join!(
        h.runtime
            .invoke(InvocationRequest::new("alpha", "hang", json!({})).with_timeout(Duration::from_millis(300))),
        async {
            let started = Instant::now();
            let result = h
                .runtime
                .invoke(InvocationRequest::new("beta", "echo", json!({ "text": "hi" })))
                .await
                .unwrap();
            (result, started.elapsed())
        }
    );
    assert!(matches!(hung.unwrap().outcome, InvocationOutcome::TimedOut { .. }));
    let (quick, elapsed) = quick;
    assert!(quick.outcome.is_success());
    assert!(elapsed < Duration::from_millis(250));
}

#[tokio::test]
async fn invoke_by_name_needs_a_unique_provider() {
    let h = harness(FakeLauncher::default(), &["alpha", "beta"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let result = h.runtime.invoke_by_name("echo", json!({ "text": "x" })).await.unwrap();
    assert_eq!(result.server, "alpha");

    h.runtime.connect("beta").await.unwrap();
    let err = h.runtime.invoke_by_name("echo", json!({})).await.unwrap_err();
    let RuntimeError::Dispatch(DispatchError::AmbiguousTool { candidates, .. }) = err else {
        panic!("expected ambiguity, got {err:?}");
    };
    assert_eq!(candidates, ["alpha", "beta"]);

    let err = h.runtime.invoke_by_name("missing", json!({})).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Dispatch(DispatchError::ToolNotFound(_))));
}

#[tokio::test]
async fn tool_info_reports_availability() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    assert!(h.runtime.tool_info("alpha", "echo").is_none());

    h.runtime.connect("alpha").await.unwrap();
    let info = h.runtime.tool_info("alpha", "echo").unwrap();
    assert!(info.available);
    assert_eq!(info.tool.description, "fake echo tool");
    assert_eq!(h.runtime.search_tools("ECHO").len(), 1);
}

#[tokio::test]
async fn resources_are_read_by_uri_and_leave_with_the_server() {
    let launcher = FakeLauncher::default().with_resources(vec![
        json!({ "uri": "memo://today", "name": "today", "mimeType": "text/plain" }),
    ]);
    let h = harness(launcher, &["alpha", "beta"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();

    let resources = h.runtime.resources();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].server, "alpha");
    assert_eq!(resources[0].mime_type.as_deref(), Some("text/plain"));

    let contents = h.runtime.read_resource(None, "memo://today").await.unwrap();
    assert_eq!(contents[0].text.as_deref(), Some("contents of memo://today"));

    let err = h
        .runtime
        .read_resource(Some("alpha"), "memo://missing")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::ResourceRead { ref reason, .. }) if reason.contains("not found")
    ));
    let err = h.runtime.read_resource(None, "memo://missing").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Dispatch(DispatchError::UnknownResource(_))));
    let err = h.runtime.read_resource(Some("beta"), "memo://today").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Dispatch(DispatchError::ServerNotConnected(_))));

    h.runtime.connect("beta").await.unwrap();
    let err = h.runtime.read_resource(None, "memo://today").await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Dispatch(DispatchError::AmbiguousResource { ref candidates, .. }) if candidates == &["alpha", "beta"]
    ));
    assert!(h.runtime.read_resource(Some("beta"), "memo://today").await.is_ok());
    h.runtime.disconnect("beta").await.unwrap();

    h.runtime.disconnect("alpha").await.unwrap();
    assert!(h.runtime.resources().is_empty());
    let err = h.runtime.read_resource(None, "memo://today").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Dispatch(DispatchError::UnknownResource(_))));
}

#[tokio::test]
async fn servers_without_resources_capability_list_none() {
    let h = harness(FakeLauncher::default(), &["alpha"], fast_settings()).await;
    h.runtime.connect("alpha").await.unwrap();
    assert!(h.runtime.resources().is_empty());
    assert_eq!(h.runtime.catalog().tool_count("alpha"), 5);
}
