// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! [`AgentFactory`] sequences configuration validation, adapter
//! selection, capability loading and strategy construction into a single
//! [`AgentFactory::assemble`] call.
//!
//! Order matters: everything that can fail the assembly (configuration,
//! model, summarizer) is checked before any external process is started, so
//! a fatal error never leaves a connection behind.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};

use forge_config::{check_unique_ids, expand_path, load_capability_file, validate, CapabilitySource, Config};
use forge_core::{Agent, StrategyFactory};
use forge_model::{AdapterRegistry, Message, ModelRuntime};
use forge_tools::{
    CapabilityHandle, CapabilityLoader, FunctionCatalog, LoadOutcome, LoadedCapability, RmcpLauncher,
    ServerLauncher, ToolRegistry,
};

use crate::events::{self, AssemblyEvent, EventReceiver};
use crate::{AssemblyError, CapabilityFailure, FatalCause, SupervisedAgent};

/// The result of a successful assembly.
#[derive(Debug)]
pub struct Assembly {
    /// Not yet activated.
    pub agent: SupervisedAgent,
    pub events: EventReceiver,
    /// Per-capability failures that did not stop the assembly.
    pub diagnostics: Vec<CapabilityFailure>,
}

pub struct AgentFactory {
    adapters: Arc<AdapterRegistry>,
    runtime: Arc<dyn ModelRuntime>,
    catalog: Arc<FunctionCatalog>,
    launcher: Arc<dyn ServerLauncher>,
}

impl AgentFactory {
    /// Factory with the built-in adapters (credentials from the process
    /// environment), an empty function catalog and the rmcp launcher.
    pub fn new(runtime: Arc<dyn ModelRuntime>) -> Self {
        Self {
            adapters: Arc::new(AdapterRegistry::default()),
            runtime,
            catalog: Arc::new(FunctionCatalog::new()),
            launcher: Arc::new(RmcpLauncher),
        }
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = Arc::new(adapters);
        self
    }

    pub fn with_catalog(mut self, catalog: FunctionCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ServerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Build a supervised agent from `config`.
    ///
    /// Capability failures never fail the assembly; they are returned in
    /// [`Assembly::diagnostics`].  Dropping the returned future while servers
    /// are still starting cancels them and terminates the ones already up.
    pub async fn assemble(&self, config: Config) -> Result<Assembly, AssemblyError> {
        let span = info_span!("assemble", model = %config.model);
        self.run(config).instrument(span).await
    }

    async fn run(&self, mut config: Config) -> Result<Assembly, AssemblyError> {
        validate(&config).map_err(|errors| AssemblyError::new(FatalCause::Config(errors)))?;
        let (events, rx) = events::channel();

        let (sources, mut diagnostics) = gather_sources(&mut config);
        if let Err(e) = check_unique_ids(&sources) {
            return Err(AssemblyError::new(e).with_failures(diagnostics));
        }

        // ── Model ───────────────────────────────────────────────────────────
        let selection = self.adapters.select(&config.model);
        events.send(AssemblyEvent::AdapterSelected {
            framework: selection.framework.clone(),
            model_id: selection.model_id.clone(),
            generic: selection.adapter.is_generic(),
        });
        let model = match selection.adapter.load_model(
            &selection.model_id,
            config.model_params.clone(),
            self.runtime.as_ref(),
        ) {
            Ok(model) => model,
            Err(e) => return Err(AssemblyError::new(e).with_failures(diagnostics)),
        };
        info!(framework = %selection.framework, model = %selection.model_id, "model loaded");
        events.send(AssemblyEvent::ModelLoaded {
            framework: selection.framework.clone(),
            model_id: selection.model_id.clone(),
        });

        // ── Conversation strategy ───────────────────────────────────────────
        let built = match StrategyFactory::new(&self.adapters, self.runtime.as_ref()).build(
            &config.conversation,
            &config.summarization,
            &config.model,
        ) {
            Ok(built) => built,
            Err(e) => return Err(AssemblyError::new(e).with_failures(diagnostics)),
        };
        events.send(AssemblyEvent::StrategyBuilt { strategy: built.strategy.name() });
        if let Some(reason) = &built.fallback {
            events.send(AssemblyEvent::SummarizerFallback { reason: reason.to_string() });
        }

        // ── Capabilities ────────────────────────────────────────────────────
        let loader = CapabilityLoader::new(self.catalog.clone(), self.launcher.clone()).with_config(&config.loader);
        let load = loader.load(sources);
        let loaded = match config.loader.timeout_secs.map(Duration::from_secs) {
            Some(limit) => match tokio::time::timeout(limit, load).await {
                Ok(loaded) => loaded,
                Err(_) => {
                    warn!(?limit, "capability loading timed out; in-flight servers cancelled");
                    return Err(AssemblyError::new(FatalCause::Timeout(limit)).with_failures(diagnostics));
                }
            },
            None => load.await,
        };
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => return Err(AssemblyError::new(e).with_failures(diagnostics)),
        };

        // ── Agent ───────────────────────────────────────────────────────────
        let seed: Vec<Message> = config.initial_message.iter().map(Message::user).collect();
        let prepared = selection.adapter.prepare_messages(
            config.system_prompt.as_deref(),
            config.emulate_system_prompt,
            seed,
        );
        let mut agent = Agent::new(model);
        agent.set_system_prompt(prepared.system_prompt);
        agent.seed_history(prepared.messages);

        let mut tools = ToolRegistry::new();
        let mut supervised_parts = Vec::new();
        let mut remote_agents = Vec::new();
        for LoadedCapability { source, outcome } in loaded {
            let kind = source.kind.label();
            match outcome {
                LoadOutcome::Loaded(handle) => {
                    events.send(AssemblyEvent::CapabilityLoaded { id: source.id.clone(), kind });
                    match handle {
                        CapabilityHandle::Functions(functions) => tools.extend(functions),
                        CapabilityHandle::Server { connection, functions } => {
                            supervised_parts.push((connection, functions));
                        }
                        CapabilityHandle::RemoteAgent { client, tools: remote_tools } => {
                            tools.extend(remote_tools);
                            remote_agents.push(client);
                        }
                    }
                }
                LoadOutcome::Failed(e) => {
                    let reason = e.to_string();
                    events.send(AssemblyEvent::CapabilityFailed { id: source.id.clone(), kind, reason: reason.clone() });
                    diagnostics.push(CapabilityFailure { id: source.id, kind, reason });
                }
                LoadOutcome::Skipped => events.send(AssemblyEvent::CapabilitySkipped { id: source.id }),
            }
        }

        let schemas = selection.adapter.adapt_tool_schemas(tools.schemas());
        debug!(tools = tools.len(), "in-process tools installed");
        agent.set_tools(tools, schemas);

        let mut supervised = SupervisedAgent::new(agent, built.strategy, selection.adapter.clone(), events.clone())
            .with_initial_messages(config.initial_message.is_some());
        for (connection, functions) in supervised_parts {
            supervised = supervised.with_server(connection, functions);
        }
        for client in remote_agents {
            supervised = supervised.with_remote_agent(client);
        }

        info!(
            strategy = supervised.strategy().name(),
            servers = supervised.server_ids().len(),
            failed = diagnostics.len(),
            "agent assembled"
        );
        Ok(Assembly { agent: supervised, events: rx, diagnostics })
    }
}

/// Inline sources followed by the ones in `capability_files`.  A file that
/// cannot be read becomes a `failed-config-<stem>` diagnostic.
fn gather_sources(config: &mut Config) -> (Vec<CapabilitySource>, Vec<CapabilityFailure>) {
    let mut sources = std::mem::take(&mut config.capabilities);
    let mut failures = Vec::new();
    for path in &config.capability_files {
        match load_capability_file(path) {
            Ok(source) => sources.push(source),
            Err(e) => {
                let path = expand_path(path);
                let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
                warn!(path = %path.display(), error = %e, "capability file could not be loaded");
                failures.push(CapabilityFailure {
                    id: format!("failed-config-{stem}"),
                    kind: "config",
                    reason: format!("{e:#}"),
                });
            }
        }
    }
    (sources, failures)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
