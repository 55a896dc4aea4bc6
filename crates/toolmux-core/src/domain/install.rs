//! Installation jobs.
//!
//! One job per install request. Status only moves forward; a retry is a new job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Status of an installation job, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStatus {
    Pending,
    CheckingDependencies,
    Installing,
    ConfiguringKeys,
    Done,
    Failed,
}

impl InstallStatus {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::CheckingDependencies => 1,
            Self::Installing => 2,
            Self::ConfiguringKeys => 3,
            Self::Done | Self::Failed => 4,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::CheckingDependencies => "checking dependencies",
            Self::Installing => "installing",
            Self::ConfiguringKeys => "configuring keys",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Why the package-manager command failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandFailure {
    /// Non-zero exit. `None` when the process was killed by a signal.
    ExitCode { code: Option<i32>, stderr_tail: String },
    /// The command could not be started at all.
    Spawn { reason: String },
    /// The command exceeded the install timeout and was killed.
    TimedOut { after_ms: u64 },
}

impl CommandFailure {
    pub fn timed_out(after: Duration) -> Self {
        Self::TimedOut {
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode { code: Some(code), stderr_tail } if stderr_tail.is_empty() => {
                write!(f, "exited with code {code}")
            }
            Self::ExitCode { code: Some(code), stderr_tail } => {
                write!(f, "exited with code {code}: {stderr_tail}")
            }
            Self::ExitCode { code: None, .. } => f.write_str("terminated by signal"),
            Self::Spawn { reason } => write!(f, "failed to start: {reason}"),
            Self::TimedOut { after_ms } => write!(f, "timed out after {after_ms}ms"),
        }
    }
}

/// Terminal failure reason of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InstallFailure {
    #[error("unknown server: {name}")]
    UnknownServer { name: String },

    #[error("missing dependency: {program}")]
    MissingDependency { program: String },

    #[error("install command `{command}` failed: {failure}")]
    InstallCommandFailed {
        command: String,
        failure: CommandFailure,
    },

    #[error("missing credential: {key}")]
    MissingCredential { key: String },
}

/// One recorded step outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStep {
    pub status: InstallStatus,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Rejected status change (regression or change after a terminal state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid install transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: InstallStatus,
    pub to: InstallStatus,
}

/// A single install request and its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationJob {
    pub id: Uuid,
    pub server: String,
    pub status: InstallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<InstallFailure>,
    pub log: Vec<InstallStep>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl InstallationJob {
    pub fn new(server: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            server: server.into(),
            status: InstallStatus::Pending,
            failure: None,
            log: vec![InstallStep {
                status: InstallStatus::Pending,
                message: "queued".to_string(),
                at: now,
            }],
            started_at: now,
            finished_at: None,
        }
    }

    /// Move to a later non-failure status and record a step.
    pub fn advance(&mut self, to: InstallStatus, message: impl Into<String>) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() || to == InstallStatus::Failed || to.rank() <= self.status.rank() {
            return Err(InvalidTransition { from: self.status, to });
        }
        self.status = to;
        let at = Utc::now();
        self.log.push(InstallStep {
            status: to,
            message: message.into(),
            at,
        });
        if to.is_terminal() {
            self.finished_at = Some(at);
        }
        Ok(())
    }

    /// Append a note to the log without changing status.
    pub fn note(&mut self, message: impl Into<String>) {
        self.log.push(InstallStep {
            status: self.status,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// Fail the job. A job that is already terminal is left untouched.
    pub fn fail(&mut self, failure: InstallFailure) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to: InstallStatus::Failed,
            });
        }
        let at = Utc::now();
        self.log.push(InstallStep {
            status: InstallStatus::Failed,
            message: failure.to_string(),
            at,
        });
        self.status = InstallStatus::Failed;
        self.failure = Some(failure);
        self.finished_at = Some(at);
        Ok(())
    }

    pub const fn is_done(&self) -> bool {
        matches!(self.status, InstallStatus::Done)
    }
}
