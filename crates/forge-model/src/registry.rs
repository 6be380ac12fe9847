// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Adapter metadata: static facts about every specially handled framework.
//!
//! This module is the single source of truth for which framework keys get a
//! dedicated adapter.  It does **not** contain construction logic; that lives
//! in [`crate::adapter`].  Frameworks absent from this table are served by the
//! generic adapter.

/// Framework used when a provider string has no `framework:` prefix.
pub const DEFAULT_FRAMEWORK: &str = "openai";

/// Metadata describing a specialised adapter.
#[derive(Debug, Clone)]
pub struct AdapterMeta {
    /// Framework key used as the provider-string prefix (e.g. `"bedrock"`).
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Parameter key under which the framework expects the model identifier.
    pub model_key: &'static str,
    /// Parameter keys moved from the model parameters into the client
    /// arguments of the [`crate::ModelSpec`].
    pub client_keys: &'static [&'static str],
}

/// Complete table of specialised adapters.
pub static ADAPTERS: &[AdapterMeta] = &[
    AdapterMeta {
        id: "bedrock",
        name: "AWS Bedrock",
        description: "AWS Bedrock Converse API with region resolution and content checks",
        model_key: "model_id",
        client_keys: &["region_name", "boto_client_config"],
    },
    AdapterMeta {
        id: "litellm",
        name: "LiteLLM",
        description: "LiteLLM unified gateway; tool schemas are cleaned for every backend",
        model_key: "model_id",
        client_keys: &["client_args"],
    },
    AdapterMeta {
        id: "ollama",
        name: "Ollama",
        description: "Local or remote Ollama server",
        model_key: "model",
        client_keys: &["host", "ollama_client_args"],
    },
];

/// Metadata the generic adapter uses for every other framework.
pub static GENERIC: AdapterMeta = AdapterMeta {
    id: "generic",
    name: "Generic",
    description: "Any framework following the standard model constructor conventions",
    model_key: "model_id",
    client_keys: &["client_args"],
};

/// Returns all specialised adapters in declaration order.
pub fn list_adapters() -> &'static [AdapterMeta] {
    ADAPTERS
}

/// Look up a specialised adapter by framework key.
pub fn adapter_meta(id: &str) -> Option<&'static AdapterMeta> {
    ADAPTERS.iter().find(|a| a.id == id)
}
