// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! [`SupervisedAgent`]: an assembled agent plus the external connections
//! it owns.
//!
//! Lifecycle: `Created` → [`activate`](SupervisedAgent::activate) →
//! `Active` → [`deactivate`](SupervisedAgent::deactivate) → `Released`.
//! Released is terminal.  [`scope`](SupervisedAgent::scope) wraps a body in
//! activate/deactivate and releases even when the body panics.
//!
//! Only the supervisor closes connections.  The [`ServerTool`]s it hands to
//! the agent share a connection but never shut it down.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use forge_core::{is_context_overflow, Agent, ConversationStrategy};
use forge_model::{Adapter, Message, ToolSchema};
use forge_tools::{filter_tools, RemoteAgentClient, ServerConnection, ServerTool, SharedConnection};

use crate::events::{AssemblyEvent, EventSender};
use crate::{ActivationError, ReleaseFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Active,
    Released,
}

struct ServerResource {
    server_id: String,
    connection: SharedConnection,
    /// Tool names to expose; empty exposes all.
    functions: Vec<String>,
}

pub struct SupervisedAgent {
    agent: Agent,
    strategy: ConversationStrategy,
    adapter: Arc<dyn Adapter>,
    servers: Vec<ServerResource>,
    remote_agents: Vec<Arc<RemoteAgentClient>>,
    has_initial_messages: bool,
    state: Lifecycle,
    events: EventSender,
}

impl SupervisedAgent {
    pub fn new(
        agent: Agent,
        strategy: ConversationStrategy,
        adapter: Arc<dyn Adapter>,
        events: EventSender,
    ) -> Self {
        Self {
            agent,
            strategy,
            adapter,
            servers: Vec::new(),
            remote_agents: Vec::new(),
            has_initial_messages: false,
            state: Lifecycle::Created,
            events,
        }
    }

    /// Take ownership of an open server connection.
    pub fn with_server(mut self, connection: Box<dyn ServerConnection>, functions: Vec<String>) -> Self {
        self.servers.push(ServerResource {
            server_id: connection.server_id().to_string(),
            connection: Arc::new(Mutex::new(connection)),
            functions,
        });
        self
    }

    pub fn with_remote_agent(mut self, client: Arc<RemoteAgentClient>) -> Self {
        self.remote_agents.push(client);
        self
    }

    pub fn with_initial_messages(mut self, seeded: bool) -> Self {
        self.has_initial_messages = seeded;
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub fn strategy(&self) -> &ConversationStrategy {
        &self.strategy
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn server_ids(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.server_id.as_str()).collect()
    }

    pub fn remote_agents(&self) -> &[Arc<RemoteAgentClient>] {
        &self.remote_agents
    }

    /// Whether the configuration seeded the conversation before first use.
    pub fn has_initial_messages(&self) -> bool {
        self.has_initial_messages
    }

    /// Run the adapter's content rewrite over the current history.
    pub fn adapt_content(&mut self) {
        let messages = std::mem::take(self.agent.messages_mut());
        *self.agent.messages_mut() = self.adapter.adapt_content(messages);
    }

    /// List the tools of every server and offer them to the model.
    ///
    /// If any server fails, every connection is closed before the error is
    /// returned and the agent ends up `Released`.  Activating twice is a
    /// no-op.
    pub async fn activate(&mut self) -> Result<(), ActivationError> {
        match self.state {
            Lifecycle::Active => return Ok(()),
            Lifecycle::Released => return Err(ActivationError::Released),
            Lifecycle::Created => {}
        }
        let started = (!self.servers.is_empty()).then(Instant::now);

        let listings = join_all(self.servers.iter().map(|server| async move {
            let mut connection = server.connection.lock().await;
            connection
                .list_tools()
                .await
                .map(|tools| filter_tools(&server.server_id, tools, &server.functions))
        }))
        .await;

        let mut offered: Vec<(SharedConnection, ToolSchema)> = Vec::new();
        let mut failure = None;
        for (server, listing) in self.servers.iter().zip(listings) {
            match listing {
                Ok(schemas) => {
                    debug!(server = %server.server_id, tools = schemas.len(), "server tools listed");
                    offered.extend(schemas.into_iter().map(|s| (server.connection.clone(), s)));
                }
                Err(e) => {
                    failure = Some(ActivationError::Server {
                        server_id: server.server_id.clone(),
                        reason: format!("{e:#}"),
                    });
                    break;
                }
            }
        }
        if let Some(err) = failure {
            warn!(error = %err, "activation failed, releasing every connection");
            self.release_all().await;
            return Err(err);
        }

        let adapted = self.adapter.adapt_tool_schemas(offered.iter().map(|(_, s)| s.clone()).collect());
        for (connection, schema) in offered {
            self.agent.tools_mut().register(Arc::new(ServerTool::new(connection, schema)));
        }
        self.agent.add_tool_schemas(adapted);
        self.state = Lifecycle::Active;

        let elapsed = started.map(|t| t.elapsed());
        match elapsed {
            Some(elapsed) => info!(servers = self.servers.len(), ?elapsed, "agent resources activated"),
            None => debug!("agent activated without external resources"),
        }
        self.events.send(AssemblyEvent::ResourcesActivated { count: self.servers.len(), elapsed });
        Ok(())
    }

    /// Close every connection, best effort.  Failures are logged and
    /// returned, never raised.  Deactivating twice returns nothing.
    pub async fn deactivate(&mut self) -> Vec<ReleaseFailure> {
        if self.state == Lifecycle::Released {
            return Vec::new();
        }
        self.release_all().await
    }

    async fn release_all(&mut self) -> Vec<ReleaseFailure> {
        self.state = Lifecycle::Released;
        let results = join_all(self.servers.iter().map(|server| async move {
            let mut connection = server.connection.lock().await;
            connection.close().await.map_err(|e| ReleaseFailure {
                server_id: server.server_id.clone(),
                reason: format!("{e:#}"),
            })
        }))
        .await;

        let mut failures = Vec::new();
        for result in results {
            if let Err(failure) = result {
                warn!(server = %failure.server_id, reason = %failure.reason, "tool server did not shut down cleanly");
                self.events.send(AssemblyEvent::ResourceReleaseFailed {
                    server_id: failure.server_id.clone(),
                    reason: failure.reason.clone(),
                });
                failures.push(failure);
            }
        }
        let released = self.servers.len() - failures.len();
        debug!(released, failed = failures.len(), "agent resources released");
        self.events.send(AssemblyEvent::ResourcesReleased { count: released });
        failures
    }

    /// Activate, run `body`, deactivate.  Deactivation also runs when `body`
    /// panics; the panic is resumed afterwards.
    ///
    /// ```rust,ignore
    /// let reply = supervised
    ///     .scope(|agent| Box::pin(async move { agent.ask("hello").await }))
    ///     .await??;
    /// ```
    pub async fn scope<T, F>(&mut self, body: F) -> Result<T, ActivationError>
    where
        F: for<'b> FnOnce(&'b mut Self) -> BoxFuture<'b, T>,
    {
        self.activate().await?;
        let outcome = AssertUnwindSafe(body(self)).catch_unwind().await;
        let failures = self.deactivate().await;
        if !failures.is_empty() {
            debug!(failures = failures.len(), "scope closed with release failures");
        }
        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// One user turn.  A context overflow is answered by reducing the
    /// history once and retrying; afterwards the strategy trims as usual.
    pub async fn ask(&mut self, input: impl Into<String>) -> anyhow::Result<String> {
        let reply = match self.agent.turn(Message::user(input)).await {
            Ok(reply) => reply,
            Err(e) if is_context_overflow(&e) => {
                let removed = self.strategy.reduce_context(&mut self.agent).await?;
                info!(strategy = self.strategy.name(), removed, "context reduced after overflow, retrying");
                self.agent.resume().await?
            }
            Err(e) => return Err(e),
        };
        match self.strategy.apply_management(self.agent.messages_mut()) {
            Ok(0) => {}
            Ok(evicted) => debug!(evicted, "conversation window applied"),
            Err(e) => warn!(strategy = self.strategy.name(), error = %e, "post-turn trim failed; history kept"),
        }
        Ok(reply)
    }
}

impl Drop for SupervisedAgent {
    fn drop(&mut self) {
        if self.state != Lifecycle::Released && !self.servers.is_empty() {
            warn!(
                servers = self.servers.len(),
                "supervised agent dropped without deactivation; connections are terminated uncleanly"
            );
        }
    }
}

impl std::fmt::Debug for SupervisedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedAgent")
            .field("agent", &self.agent)
            .field("strategy", &self.strategy.name())
            .field("framework", &self.adapter.framework())
            .field("servers", &self.server_ids())
            .field("remote_agents", &self.remote_agents.len())
            .field("state", &self.state)
            .finish()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
