// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! External tool servers: spawned child processes speaking MCP over stdio,
//! or MCP servers reached over streamable HTTP.
//!
//! The loader only brings a server up and completes the `initialize`
//! handshake.  Listing its tools is done later by the supervisor through
//! [`ServerConnection::list_tools`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use forge_config::ProcessServerSource;
use forge_model::ToolSchema;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::ServiceExt;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::CapabilityError;

/// Where a process server lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEndpoint {
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
    },
    Http {
        url: String,
    },
}

impl ServerEndpoint {
    pub fn from_source(source: &ProcessServerSource) -> Result<Self, CapabilityError> {
        let command = source.command.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let url = source.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        match (command, url) {
            (Some(command), None) => Ok(ServerEndpoint::Stdio {
                command: command.to_string(),
                args: source.args.clone(),
                env: source.env.clone(),
            }),
            (None, Some(url)) => Ok(ServerEndpoint::Http { url: url.to_string() }),
            (None, None) => Err(CapabilityError::MissingEndpoint),
            (Some(_), Some(_)) => Err(CapabilityError::AmbiguousEndpoint),
        }
    }
}

impl std::fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerEndpoint::Stdio { command, args, .. } if args.is_empty() => write!(f, "{command}"),
            ServerEndpoint::Stdio { command, args, .. } => write!(f, "{command} {}", args.join(" ")),
            ServerEndpoint::Http { url } => write!(f, "{url}"),
        }
    }
}

/// An open connection to an external tool server.
///
/// Dropping a connection without closing it still terminates a spawned
/// child process.
#[async_trait]
pub trait ServerConnection: Send {
    fn server_id(&self) -> &str;

    async fn list_tools(&mut self) -> anyhow::Result<Vec<ToolSchema>>;

    /// Run one tool on the server and return its text output.  A result the
    /// server flags as an error comes back as `Err`.
    async fn call_tool(&mut self, name: &str, args: Value) -> anyhow::Result<String>;

    /// Shut the connection down.  Closing twice is a no-op.
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Brings a server up and completes its handshake.
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    async fn launch(
        &self,
        server_id: &str,
        endpoint: &ServerEndpoint,
    ) -> anyhow::Result<Box<dyn ServerConnection>>;
}

/// Keep only the tools named in `wanted`; an empty list keeps everything.
pub fn filter_tools(server_id: &str, tools: Vec<ToolSchema>, wanted: &[String]) -> Vec<ToolSchema> {
    if wanted.is_empty() {
        return tools;
    }
    for name in wanted {
        if !tools.iter().any(|t| &t.name == name) {
            warn!(server = %server_id, tool = %name, "requested tool not offered by server");
        }
    }
    tools.into_iter().filter(|t| wanted.contains(&t.name)).collect()
}

/// A server connection shared between the supervisor and the tools that
/// route calls to it.
pub type SharedConnection = Arc<Mutex<Box<dyn ServerConnection>>>;

/// Model-facing proxy for one tool offered by a server.
pub struct ServerTool {
    connection: SharedConnection,
    schema: ToolSchema,
}

impl ServerTool {
    pub fn new(connection: SharedConnection, schema: ToolSchema) -> Self {
        Self { connection, schema }
    }
}

#[async_trait]
impl Tool for ServerTool {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn description(&self) -> &str {
        &self.schema.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.parameters.clone()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let mut connection = self.connection.lock().await;
        match connection.call_tool(&self.schema.name, call.args.clone()).await {
            Ok(text) => ToolOutput::ok(&call.id, text),
            Err(e) => ToolOutput::err(&call.id, format!("{e:#}")),
        }
    }
}

// ─── rmcp-backed launcher ────────────────────────────────────────────────────

/// Default launcher backed by the `rmcp` client.
#[derive(Debug, Clone, Copy, Default)]
pub struct RmcpLauncher;

#[async_trait]
impl ServerLauncher for RmcpLauncher {
    async fn launch(
        &self,
        server_id: &str,
        endpoint: &ServerEndpoint,
    ) -> anyhow::Result<Box<dyn ServerConnection>> {
        debug!(server = %server_id, %endpoint, "starting tool server");
        let service = match endpoint {
            ServerEndpoint::Stdio { command, args, env } => {
                let mut cmd = Command::new(command);
                cmd.args(args).envs(env).kill_on_drop(true);
                let transport = TokioChildProcess::new(cmd)
                    .with_context(|| format!("failed to spawn `{command}`"))?;
                ().serve(transport)
                    .await
                    .with_context(|| format!("handshake with `{endpoint}` failed"))?
            }
            ServerEndpoint::Http { url } => {
                let transport = StreamableHttpClientTransport::from_uri(url.as_str());
                ().serve(transport)
                    .await
                    .with_context(|| format!("handshake with {url} failed"))?
            }
        };
        info!(server = %server_id, "tool server ready");
        Ok(Box::new(RmcpConnection { server_id: server_id.to_string(), service: Some(service) }))
    }
}

struct RmcpConnection {
    server_id: String,
    service: Option<RunningService<RoleClient, ()>>,
}

#[async_trait]
impl ServerConnection for RmcpConnection {
    fn server_id(&self) -> &str {
        &self.server_id
    }

    async fn list_tools(&mut self) -> anyhow::Result<Vec<ToolSchema>> {
        let service = self
            .service
            .as_ref()
            .with_context(|| format!("connection to {} is closed", self.server_id))?;
        let result = service
            .peer()
            .list_tools(None)
            .await
            .with_context(|| format!("listing tools of {}", self.server_id))?;
        Ok(result
            .tools
            .into_iter()
            .map(|tool| ToolSchema {
                name: tool.name.to_string(),
                description: tool.description.unwrap_or_default().to_string(),
                parameters: serde_json::to_value(&tool.input_schema)
                    .unwrap_or_else(|_| serde_json::json!({"type": "object"})),
            })
            .collect())
    }

    async fn call_tool(&mut self, name: &str, args: Value) -> anyhow::Result<String> {
        let service = self
            .service
            .as_ref()
            .with_context(|| format!("connection to {} is closed", self.server_id))?;
        let arguments = match args {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        // Built through serde so optional request fields keep their defaults.
        let params: CallToolRequestParams =
            serde_json::from_value(serde_json::json!({ "name": name, "arguments": arguments }))?;
        let result = service
            .peer()
            .call_tool(params)
            .await
            .with_context(|| format!("calling {name} on {}", self.server_id))?;
        let text = result
            .content
            .iter()
            .filter_map(|c| serde_json::to_value(c).ok())
            .filter_map(|v| v.get("text").and_then(Value::as_str).map(str::to_string))
            .collect::<Vec<_>>()
            .join("\n");
        if result.is_error.unwrap_or(false) {
            anyhow::bail!("{name} failed: {text}");
        }
        Ok(text)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };
        service
            .cancel()
            .await
            .with_context(|| format!("shutting down {}", self.server_id))?;
        debug!(server = %self.server_id, "tool server stopped");
        Ok(())
    }
}
