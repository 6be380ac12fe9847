// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Capability loading.
//!
//! [`CapabilityLoader::load`] turns a batch of [`CapabilitySource`]s into
//! exactly one [`LoadedCapability`] per source, in input order.  A failing
//! source is recorded and never aborts the batch.
//!
//! Function sources resolve inline against the [`FunctionCatalog`].  Process
//! servers and remote agents are brought up concurrently, at most
//! `max_concurrency` at a time, each under its own startup timeout.
//! Dropping the future returned by `load` cancels every launch still in
//! flight and drops the connections that already came up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use forge_config::{check_unique_ids, CapabilityKind, CapabilitySource, ConfigError, LoaderConfig};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::process::{ServerConnection, ServerEndpoint, ServerLauncher};
use crate::remote::RemoteAgentClient;
use crate::{CapabilityError, FunctionCatalog, Tool};

/// Runtime handle of a successfully loaded source.
pub enum CapabilityHandle {
    /// In-process functions.
    Functions(Vec<Arc<dyn Tool>>),
    /// A running server.  Owned by whoever holds the handle; the supervisor
    /// closes it.
    Server {
        connection: Box<dyn ServerConnection>,
        /// Tool names to expose; empty exposes all.
        functions: Vec<String>,
    },
    /// Remote agent client plus the tools that front it.
    RemoteAgent {
        client: Arc<RemoteAgentClient>,
        tools: Vec<Arc<dyn Tool>>,
    },
}

impl CapabilityHandle {
    /// In-process tools contributed directly by this handle.
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        match self {
            CapabilityHandle::Functions(tools) | CapabilityHandle::RemoteAgent { tools, .. } => tools,
            CapabilityHandle::Server { .. } => &[],
        }
    }
}

impl std::fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityHandle::Functions(tools) => f
                .debug_tuple("Functions")
                .field(&tools.iter().map(|t| t.name()).collect::<Vec<_>>())
                .finish(),
            CapabilityHandle::Server { connection, functions } => f
                .debug_struct("Server")
                .field("server_id", &connection.server_id())
                .field("functions", functions)
                .finish(),
            CapabilityHandle::RemoteAgent { client, .. } => {
                f.debug_struct("RemoteAgent").field("urls", &client.urls()).finish()
            }
        }
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(CapabilityHandle),
    Failed(CapabilityError),
    Skipped,
}

/// One source descriptor paired with what became of it.
#[derive(Debug)]
pub struct LoadedCapability {
    pub source: CapabilitySource,
    pub outcome: LoadOutcome,
}

impl LoadedCapability {
    pub fn id(&self) -> &str {
        &self.source.id
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Loaded(_))
    }

    pub fn failure(&self) -> Option<&CapabilityError> {
        match &self.outcome {
            LoadOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

pub struct CapabilityLoader {
    catalog: Arc<FunctionCatalog>,
    launcher: Arc<dyn ServerLauncher>,
    max_concurrency: usize,
    startup_timeout: Duration,
}

impl CapabilityLoader {
    pub fn new(catalog: Arc<FunctionCatalog>, launcher: Arc<dyn ServerLauncher>) -> Self {
        let defaults = LoaderConfig::default();
        Self {
            catalog,
            launcher,
            max_concurrency: defaults.max_concurrency,
            startup_timeout: Duration::from_secs(defaults.startup_timeout_secs),
        }
    }

    pub fn with_config(mut self, config: &LoaderConfig) -> Self {
        self.max_concurrency = config.max_concurrency.max(1);
        self.startup_timeout = Duration::from_secs(config.startup_timeout_secs);
        self
    }

    /// Load every source.  Only a duplicate id fails the batch, and it does
    /// so before anything is started.
    pub async fn load(&self, sources: Vec<CapabilitySource>) -> Result<Vec<LoadedCapability>, ConfigError> {
        check_unique_ids(&sources)?;
        let started = Instant::now();
        let permits = Semaphore::new(self.max_concurrency.max(1));

        let slots = sources.into_iter().map(|source| {
            let permits = &permits;
            async move {
                if !source.enabled {
                    debug!(capability = %source.id, "capability disabled, skipping");
                    return LoadedCapability { source, outcome: LoadOutcome::Skipped };
                }
                let outcome = match self.load_one(&source, permits).await {
                    Ok(handle) => {
                        debug!(capability = %source.id, kind = source.kind.label(), "capability loaded");
                        LoadOutcome::Loaded(handle)
                    }
                    Err(e) => {
                        warn!(capability = %source.id, kind = source.kind.label(), error = %e, "capability failed to load");
                        LoadOutcome::Failed(e)
                    }
                };
                LoadedCapability { source, outcome }
            }
        });
        let loaded = join_all(slots).await;

        let ok = loaded.iter().filter(|c| c.is_loaded()).count();
        info!(total = loaded.len(), loaded = ok, elapsed = ?started.elapsed(), "capabilities loaded");
        Ok(loaded)
    }

    async fn load_one(
        &self,
        source: &CapabilitySource,
        permits: &Semaphore,
    ) -> Result<CapabilityHandle, CapabilityError> {
        match &source.kind {
            CapabilityKind::Function(f) => self.catalog.resolve(f).map(CapabilityHandle::Functions),
            CapabilityKind::ProcessServer(p) => {
                let endpoint = ServerEndpoint::from_source(p)?;
                let limit = p.startup_timeout_secs.map(Duration::from_secs).unwrap_or(self.startup_timeout);
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| CapabilityError::Startup { reason: e.to_string() })?;
                let connection = tokio::time::timeout(limit, self.launcher.launch(&source.id, &endpoint))
                    .await
                    .map_err(|_| CapabilityError::Timeout(limit))?
                    .map_err(|e| CapabilityError::Startup { reason: format!("{e:#}") })?;
                Ok(CapabilityHandle::Server { connection, functions: p.functions.clone() })
            }
            CapabilityKind::RemoteAgent(r) => {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| CapabilityError::Startup { reason: e.to_string() })?;
                let client = Arc::new(RemoteAgentClient::from_source(r)?);
                let tools = client.tools();
                Ok(CapabilityHandle::RemoteAgent { client, tools })
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
