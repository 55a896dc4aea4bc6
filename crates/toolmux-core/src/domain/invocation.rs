//! Tool invocation requests and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Correlation id pairing a request with its response on one connection.
///
/// Ids come from a per-connection monotonically increasing counter and are
/// never reused for the lifetime of that connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tool call on behalf of the decision layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub server: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    /// Caller-supplied deadline; `None` means the runtime default.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_ms_opt")]
    pub timeout: Option<Duration>,
}

impl InvocationRequest {
    pub fn new(server: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
            arguments,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why the transport failed during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The server's output stream closed (process exited or crashed).
    ConnectionClosed,
    /// Writing the request to the server failed.
    WriteFailed(String),
    /// The response could not be decoded.
    MalformedResponse(String),
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionClosed => f.write_str("connection closed"),
            Self::WriteFailed(reason) => write!(f, "write failed: {reason}"),
            Self::MalformedResponse(reason) => write!(f, "malformed response: {reason}"),
        }
    }
}

/// Outcome of one invocation.
///
/// Only `TimedOut` is worth retrying by the caller, and only when the tool
/// is known to be free of side effects. The runtime never retries calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Success {
        payload: Value,
    },
    /// The remote tool reported a domain-level failure; passed through verbatim.
    ToolError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
        message: String,
    },
    TransportError {
        kind: TransportErrorKind,
    },
    TimedOut {
        after_ms: u64,
    },
}

impl InvocationOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short label for logs and reports.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ToolError { .. } => "tool_error",
            Self::TransportError { .. } => "transport_error",
            Self::TimedOut { .. } => "timed_out",
        }
    }

    /// Whether a caller may reasonably retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Result of one invocation with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub correlation_id: CorrelationId,
    pub server: String,
    pub tool: String,
    #[serde(flatten)]
    pub outcome: InvocationOutcome,
    pub elapsed_ms: u64,
}

mod duration_ms_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)] // serde `with` hands us `&Option<T>`
    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
