// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider adapters and the registry that selects them.
//!
//! A provider string is `framework:model` or a bare `model` (framework
//! [`DEFAULT_FRAMEWORK`]).  Frameworks listed in [`crate::registry::ADAPTERS`]
//! get their specialised adapter; every other framework gets a
//! [`GenericAdapter`].

mod bedrock;
mod generic;
mod litellm;
mod ollama;

use std::collections::HashMap;
use std::sync::Arc;

use forge_config::ModelParams;
use serde_json::Value;
use tracing::debug;

use crate::registry::{AdapterMeta, DEFAULT_FRAMEWORK};
use crate::{AdapterError, CredentialResolver, Message, ModelProvider, ModelRuntime, ModelSpec, ToolSchema};

pub use bedrock::BedrockAdapter;
pub use generic::GenericAdapter;
pub use litellm::LiteLlmAdapter;
pub use ollama::OllamaAdapter;

/// Provider-specific strategy for model construction and compatibility
/// rewrites.  Every hook except [`Adapter::model_spec`] is pure.
pub trait Adapter: Send + Sync {
    /// Framework key this adapter serves.
    fn framework(&self) -> &str;

    /// True only for the fallback adapter.
    fn is_generic(&self) -> bool {
        false
    }

    /// Translate a model identifier and parameter map into a [`ModelSpec`].
    fn model_spec(&self, model_id: &str, params: ModelParams) -> Result<ModelSpec, AdapterError>;

    /// Build the spec and hand it to the runtime.
    fn load_model(
        &self,
        model_id: &str,
        params: ModelParams,
        runtime: &dyn ModelRuntime,
    ) -> Result<Arc<dyn ModelProvider>, AdapterError> {
        let spec = self.model_spec(model_id, params)?;
        debug!(framework = %spec.framework, model = %spec.model_id, "instantiating model");
        runtime.instantiate(&spec).map_err(|e| AdapterError::Load {
            framework: spec.framework.clone(),
            model_id: spec.model_id.clone(),
            reason: format!("{e:#}"),
        })
    }

    /// Rewrite tool schemas for provider compatibility.  Called once per
    /// capability batch.
    fn adapt_tool_schemas(&self, tools: Vec<ToolSchema>) -> Vec<ToolSchema> {
        tools
    }

    /// JSON schema of the parameters this adapter understands, if it
    /// publishes one.
    fn config_schema(&self) -> Option<Value> {
        None
    }

    /// Rewrite message content into a shape the provider accepts.
    fn adapt_content(&self, messages: Vec<Message>) -> Vec<Message> {
        messages
    }

    /// Place the system prompt and seed messages for the first turn.
    ///
    /// With `emulate_system_prompt` the prompt travels as the first user
    /// message and the system slot stays empty.
    fn prepare_messages(
        &self,
        system_prompt: Option<&str>,
        emulate_system_prompt: bool,
        messages: Vec<Message>,
    ) -> PreparedConversation {
        let mut messages = if messages.is_empty() { messages } else { self.adapt_content(messages) };
        match system_prompt {
            Some(prompt) if emulate_system_prompt => {
                messages.insert(0, Message::user(prompt));
                PreparedConversation { system_prompt: None, messages }
            }
            prompt => PreparedConversation {
                system_prompt: prompt.map(str::to_string),
                messages,
            },
        }
    }
}

/// System prompt and seed messages ready for the agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedConversation {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
}

/// Split a provider string into `(framework, model_id)`.
///
/// Only the first `:` separates the framework, so model ids may contain
/// colons (`ollama:llama3.1:8b`).  The framework is lower-cased.
pub fn parse_provider_string(provider: &str) -> (String, String) {
    match provider.split_once(':') {
        Some((framework, model)) if !framework.trim().is_empty() => {
            (framework.trim().to_ascii_lowercase(), model.trim().to_string())
        }
        Some((_, model)) => (DEFAULT_FRAMEWORK.to_string(), model.trim().to_string()),
        None => (DEFAULT_FRAMEWORK.to_string(), provider.trim().to_string()),
    }
}

/// Result of [`AdapterRegistry::select`].
#[derive(Clone)]
pub struct Selection {
    pub adapter: Arc<dyn Adapter>,
    pub framework: String,
    pub model_id: String,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("framework", &self.framework)
            .field("model_id", &self.model_id)
            .field("generic", &self.adapter.is_generic())
            .finish()
    }
}

/// Statically populated map from framework key to adapter.
pub struct AdapterRegistry {
    specialised: HashMap<&'static str, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Registry holding every adapter from [`crate::registry::ADAPTERS`].
    pub fn builtin(credentials: CredentialResolver) -> Self {
        let mut specialised: HashMap<&'static str, Arc<dyn Adapter>> = HashMap::new();
        specialised.insert("bedrock", Arc::new(BedrockAdapter::new(credentials)));
        specialised.insert("litellm", Arc::new(LiteLlmAdapter));
        specialised.insert("ollama", Arc::new(OllamaAdapter));
        Self { specialised }
    }

    pub fn get(&self, framework: &str) -> Option<Arc<dyn Adapter>> {
        self.specialised.get(framework).cloned()
    }

    pub fn frameworks(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self.specialised.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn select(&self, provider: &str) -> Selection {
        let (framework, model_id) = parse_provider_string(provider);
        let adapter = match self.get(&framework) {
            Some(adapter) => adapter,
            None => Arc::new(GenericAdapter::new(framework.clone())) as Arc<dyn Adapter>,
        };
        debug!(%framework, %model_id, generic = adapter.is_generic(), "adapter selected");
        Selection { adapter, framework, model_id }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin(CredentialResolver::from_env())
    }
}

/// Shared parameter split used by every adapter.
///
/// The identifier from the provider string wins over one found under the
/// framework's model key; keys listed in `meta.client_keys` move to the
/// spec's client arguments.
pub(crate) fn split_params(
    meta: &AdapterMeta,
    framework: &str,
    model_id: &str,
    mut params: ModelParams,
) -> Result<ModelSpec, AdapterError> {
    let from_params = params
        .remove(meta.model_key)
        .and_then(|v| v.as_str().map(str::to_string));
    let model_id = match model_id.trim() {
        "" => from_params.unwrap_or_default(),
        id => id.to_string(),
    };
    if model_id.trim().is_empty() {
        return Err(AdapterError::MissingModelId { framework: framework.to_string() });
    }

    let mut client_args = ModelParams::new();
    for key in meta.client_keys {
        if let Some(value) = params.remove(*key) {
            client_args.insert((*key).to_string(), value);
        }
    }

    Ok(ModelSpec { framework: framework.to_string(), model_id, params, client_args })
}

/// Fail unless `client_args[key]`, when present, is a JSON object.
pub(crate) fn require_object(framework: &str, spec: &ModelSpec, key: &str) -> Result<(), AdapterError> {
    match spec.client_args.get(key) {
        None | Some(Value::Object(_)) | Some(Value::Null) => Ok(()),
        Some(other) => Err(AdapterError::InvalidParam {
            framework: framework.to_string(),
            key: key.to_string(),
            reason: format!("must be an object, got {other}"),
        }),
    }
}

/// Shared JSON schema fragment for the sampling parameters.
pub(crate) fn sampling_properties() -> serde_json::Map<String, Value> {
    let schema = serde_json::json!({
        "temperature": {"type": "number", "minimum": 0, "maximum": 2},
        "top_p": {"type": "number", "minimum": 0, "maximum": 1},
        "max_tokens": {"type": "integer", "minimum": 1, "maximum": 200000}
    });
    match schema {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ContentPart, MessageContent, MockRuntime};

    fn registry() -> AdapterRegistry {
        AdapterRegistry::builtin(CredentialResolver::with_vars(Vec::<(String, String)>::new()))
    }

    // ── Provider strings ─────────────────────────────────────────────────────

    #[test]
    fn parse_splits_on_first_colon_only() {
        assert_eq!(parse_provider_string("ollama:llama3.1:8b"), ("ollama".into(), "llama3.1:8b".into()));
        assert_eq!(parse_provider_string("LiteLLM:gpt-4o"), ("litellm".into(), "gpt-4o".into()));
        assert_eq!(parse_provider_string("gpt-4o"), ("openai".into(), "gpt-4o".into()));
        assert_eq!(parse_provider_string(":gpt-4o"), ("openai".into(), "gpt-4o".into()));
    }

    // ── Selection ────────────────────────────────────────────────────────────

    #[test]
    fn registered_frameworks_never_get_the_generic_adapter() {
        let reg = registry();
        for framework in reg.frameworks() {
            let sel = reg.select(&format!("{framework}:some-model"));
            assert!(!sel.adapter.is_generic(), "{framework}");
            assert_eq!(sel.adapter.framework(), framework);
            let registered = reg.get(framework).unwrap();
            assert!(Arc::ptr_eq(&sel.adapter, &registered));
        }
    }

    #[test]
    fn unregistered_frameworks_get_the_generic_adapter() {
        let reg = registry();
        for provider in ["anthropic:claude-3-5-sonnet", "mistral:large", "x:model", "gpt-4o"] {
            let sel = reg.select(provider);
            assert!(sel.adapter.is_generic(), "{provider}");
        }
        let sel = reg.select("gemini:gemini-2.5-flash");
        assert_eq!(sel.adapter.framework(), "gemini");
        assert_eq!(sel.model_id, "gemini-2.5-flash");
    }

    // ── Shared hooks ─────────────────────────────────────────────────────────

    #[test]
    fn load_model_wraps_runtime_failures() {
        let reg = registry();
        let sel = reg.select("mistral:ghost");
        let rt = MockRuntime::new().unreachable("ghost");
        let err = sel.adapter.load_model(&sel.model_id, ModelParams::new(), &rt).err().unwrap();
        assert!(matches!(err, AdapterError::Load { ref model_id, .. } if model_id == "ghost"));
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn emulated_system_prompt_becomes_first_user_message() {
        let sel = registry().select("openai:gpt-4o");
        let prepared = sel.adapter.prepare_messages(Some("be terse"), true, vec![Message::user("hi")]);
        assert_eq!(prepared.system_prompt, None);
        assert_eq!(prepared.messages[0].as_text(), Some("be terse"));
        assert_eq!(prepared.messages[1].as_text(), Some("hi"));

        let native = sel.adapter.prepare_messages(Some("be terse"), false, vec![]);
        assert_eq!(native.system_prompt.as_deref(), Some("be terse"));
        assert!(native.messages.is_empty());
    }

    #[test]
    fn prepare_messages_runs_content_adaptation() {
        let sel = registry().select("bedrock:anthropic.claude-v2");
        let seed = vec![Message::user_with_parts(vec![ContentPart::image("tiff", "AAAA")])];
        let prepared = sel.adapter.prepare_messages(None, false, seed);
        assert!(matches!(
            &prepared.messages[0].content,
            MessageContent::ContentParts(parts) if matches!(&parts[0], ContentPart::Text { .. })
        ));
    }

    #[test]
    fn split_params_prefers_identifier_from_provider_string() {
        let mut params = ModelParams::new();
        params.insert("model_id".into(), json!("from-params"));
        params.insert("client_args".into(), json!({"api_key": "k"}));
        params.insert("temperature".into(), json!(0.1));
        let spec = split_params(&crate::registry::GENERIC, "openai", "gpt-4o", params).unwrap();
        assert_eq!(spec.model_id, "gpt-4o");
        assert!(!spec.params.contains_key("model_id"));
        assert_eq!(spec.client_args["client_args"]["api_key"], "k");
        assert_eq!(spec.params["temperature"], 0.1);
    }
}
