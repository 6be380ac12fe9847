// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Forge assembles a ready-to-run conversational agent from a declarative
//! configuration.
//!
//! ```rust,ignore
//! let config = forge::config::load_file(Path::new("agent.yaml"))?;
//! let forge::Assembly { mut agent, events, diagnostics } =
//!     forge::assemble(config, runtime).await?;
//! let reply = agent
//!     .scope(|a| Box::pin(async move { a.ask("hello").await }))
//!     .await??;
//! ```
//!
//! Inference is not performed here: callers supply a
//! [`ModelRuntime`](forge_model::ModelRuntime) that turns an adapted
//! [`ModelSpec`](forge_model::ModelSpec) into a live model.

use std::sync::Arc;

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, util::TryInitError};

pub use forge_bootstrap::{
    ActivationError, AgentFactory, Assembly, AssemblyError, AssemblyEvent, CapabilityFailure, FatalCause,
    Lifecycle, ReleaseFailure, SupervisedAgent,
};
pub use forge_config as config;
pub use forge_core as core;
pub use forge_model as model;
pub use forge_tools as tools;

/// Assemble with the built-in adapters, no in-process functions and the
/// rmcp server launcher.  Use [`AgentFactory`] to change any of those.
pub async fn assemble(
    config: forge_config::Config,
    runtime: Arc<dyn forge_model::ModelRuntime>,
) -> Result<Assembly, AssemblyError> {
    AgentFactory::new(runtime).assemble(config).await
}

/// Install a stderr subscriber.  `FORGE_LOG` overrides the level picked from
/// `verbosity` (0 = warn, 1 = debug, more = trace).
pub fn init_logging(verbosity: u8) -> Result<(), TryInitError> {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("FORGE_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init()
}
