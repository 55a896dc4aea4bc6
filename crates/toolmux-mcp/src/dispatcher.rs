//! Invocation dispatcher.
//!
//! Validates arguments against the catalog's schema, finds the live client
//! for the target server and hands the call to it. Calls are never retried
//! here: a timed-out or dropped call may already have had side effects.
//! Resource reads are routed the same way, by server or by listed URI.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use toolmux_core::{ErrorCategory, InvocationRequest, InvocationResult, ResourceContent, ToolDescriptor};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, ToolCatalog};
use crate::connection::ConnectionManager;

/// Reasons a call was rejected before reaching the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Invalid arguments for {server}/{tool}: field '{field}': {reason}")]
    SchemaValidation {
        server: String,
        tool: String,
        field: String,
        reason: String,
    },

    #[error("Server '{0}' is not connected")]
    ServerNotConnected(String),

    #[error("Server '{server}' has no tool named '{tool}'")]
    UnknownTool { server: String, tool: String },

    #[error("No connected server offers a tool named '{0}'")]
    ToolNotFound(String),

    #[error("Tool '{tool}' is offered by several servers: {}", candidates.join(", "))]
    AmbiguousTool { tool: String, candidates: Vec<String> },

    #[error("No connected server lists a resource at '{0}'")]
    UnknownResource(String),

    #[error("Resource '{uri}' is listed by several servers: {}", candidates.join(", "))]
    AmbiguousResource { uri: String, candidates: Vec<String> },

    /// The read reached the server and failed there, or never got a reply.
    #[error("Reading '{uri}' from {server} failed: {reason}")]
    ResourceRead { server: String, uri: String, reason: String },
}

impl DispatchError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::SchemaValidation { .. } => ErrorCategory::Validation,
            Self::ServerNotConnected(_) => ErrorCategory::Transport,
            Self::UnknownTool { .. }
            | Self::ToolNotFound(_)
            | Self::AmbiguousTool { .. }
            | Self::UnknownResource(_)
            | Self::AmbiguousResource { .. } => ErrorCategory::Configuration,
            Self::ResourceRead { .. } => ErrorCategory::Protocol,
        }
    }

    /// A server that is reconnecting may be back later; everything else needs a different request.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerNotConnected(_))
    }
}

impl From<CatalogError> for DispatchError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NotFound(tool) => Self::ToolNotFound(tool),
            CatalogError::Ambiguous { tool, candidates } => Self::AmbiguousTool { tool, candidates },
        }
    }
}

/// A catalog entry plus whether it can be called right now.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ToolInfo {
    pub server: String,
    pub category: String,
    pub tool: ToolDescriptor,
    pub available: bool,
}

/// Routes tool calls to connected servers.
#[derive(Clone)]
pub struct InvocationDispatcher {
    catalog: Arc<ToolCatalog>,
    connections: Arc<ConnectionManager>,
    default_timeout: Duration,
}

impl InvocationDispatcher {
    pub const fn new(catalog: Arc<ToolCatalog>, connections: Arc<ConnectionManager>, default_timeout: Duration) -> Self {
        Self {
            catalog,
            connections,
            default_timeout,
        }
    }

    /// Call `tool` on `server`.
    ///
    /// `Err` means the call never left this process. Once sent, every
    /// failure is reported in the returned [`InvocationResult`].
    pub async fn invoke(
        &self,
        server: &str,
        tool: &str,
        arguments: Value,
        timeout: Option<Duration>,
    ) -> Result<InvocationResult, DispatchError> {
        let Some(entry) = self.catalog.get(server, tool) else {
            // The catalog only holds connected servers.
            return Err(if self.catalog.contains_server(server) {
                DispatchError::UnknownTool {
                    server: server.to_string(),
                    tool: tool.to_string(),
                }
            } else {
                DispatchError::ServerNotConnected(server.to_string())
            });
        };

        entry
            .tool
            .input_schema
            .validate(&arguments)
            .map_err(|violation| DispatchError::SchemaValidation {
                server: server.to_string(),
                tool: tool.to_string(),
                field: violation.field,
                reason: violation.reason,
            })?;

        let client = self
            .connections
            .client(server)
            .ok_or_else(|| DispatchError::ServerNotConnected(server.to_string()))?;

        let timeout = timeout.unwrap_or(self.default_timeout);
        debug!(server = %server, tool = %tool, ?timeout, "Dispatching tool call");
        let result = client.call_tool(tool, arguments, timeout).await;
        self.connections.touch(server);

        if result.outcome.is_success() {
            info!(
                server = %server,
                tool = %tool,
                correlation_id = result.correlation_id.0,
                elapsed_ms = result.elapsed_ms,
                "Tool call succeeded"
            );
        } else {
            warn!(
                server = %server,
                tool = %tool,
                correlation_id = result.correlation_id.0,
                outcome = result.outcome.label(),
                elapsed_ms = result.elapsed_ms,
                "Tool call failed"
            );
        }
        Ok(result)
    }

    pub async fn invoke_request(&self, request: InvocationRequest) -> Result<InvocationResult, DispatchError> {
        self.invoke(&request.server, &request.tool, request.arguments, request.timeout)
            .await
    }

    /// Call a tool by name alone. Fails when zero or several servers offer it.
    pub async fn invoke_by_name(
        &self,
        tool: &str,
        arguments: Value,
        timeout: Option<Duration>,
    ) -> Result<InvocationResult, DispatchError> {
        let entry = self.catalog.resolve(tool)?;
        self.invoke(&entry.server, tool, arguments, timeout).await
    }

    /// Read `uri` from `server`, or from the one connected server that lists it.
    pub async fn read_resource(
        &self,
        server: Option<&str>,
        uri: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<ResourceContent>, DispatchError> {
        let server = match server {
            Some(server) => server.to_string(),
            None => {
                let mut servers = self.catalog.resource_servers(uri);
                match servers.len() {
                    0 => return Err(DispatchError::UnknownResource(uri.to_string())),
                    1 => servers.remove(0),
                    _ => {
                        return Err(DispatchError::AmbiguousResource {
                            uri: uri.to_string(),
                            candidates: servers,
                        });
                    }
                }
            }
        };
        let client = self
            .connections
            .client(&server)
            .ok_or_else(|| DispatchError::ServerNotConnected(server.clone()))?;

        let timeout = timeout.unwrap_or(self.default_timeout);
        debug!(server = %server, uri = %uri, ?timeout, "Reading resource");
        let result = tokio::time::timeout(timeout, client.read_resource(uri)).await;
        self.connections.touch(&server);

        let reason = match result {
            Ok(Ok(contents)) => {
                info!(server = %server, uri = %uri, items = contents.len(), "Resource read");
                return Ok(contents);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no reply within {} ms", timeout.as_millis()),
        };
        warn!(server = %server, uri = %uri, reason = %reason, "Resource read failed");
        Err(DispatchError::ResourceRead {
            server,
            uri: uri.to_string(),
            reason,
        })
    }

    pub fn tool_info(&self, server: &str, tool: &str) -> Option<ToolInfo> {
        let entry = self.catalog.get(server, tool)?;
        Some(ToolInfo {
            available: self.connections.client(server).is_some(),
            server: entry.server,
            category: entry.category,
            tool: entry.tool,
        })
    }
}
