// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Seam to the external inference engine.
//!
//! Adapters translate configuration into a [`ModelSpec`]; a [`ModelRuntime`]
//! turns that spec into a live [`ModelProvider`].  Forge never performs
//! inference itself.

use std::sync::Arc;

use forge_config::ModelParams;

use crate::ModelProvider;

/// Fully adapted description of a model to instantiate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSpec {
    pub framework: String,
    pub model_id: String,
    /// Per-request model parameters (`temperature`, `max_tokens`, ...).
    pub params: ModelParams,
    /// Connection-level settings split off by the adapter (`host`,
    /// `region_name`, client arguments).
    pub client_args: ModelParams,
}

pub trait ModelRuntime: Send + Sync {
    /// Construct a model handle.  Failing here aborts assembly.
    fn instantiate(&self, spec: &ModelSpec) -> anyhow::Result<Arc<dyn ModelProvider>>;
}
