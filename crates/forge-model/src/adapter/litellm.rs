// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use forge_config::ModelParams;
use serde_json::{json, Value};

use super::{require_object, sampling_properties, split_params, Adapter};
use crate::registry::adapter_meta;
use crate::sanitize::strip_schema_key;
use crate::{AdapterError, ModelSpec, ToolSchema};

const FRAMEWORK: &str = "litellm";

/// LiteLLM gateway.  Several of its backends reject `additionalProperties`
/// anywhere in a tool schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteLlmAdapter;

impl Adapter for LiteLlmAdapter {
    fn framework(&self) -> &str {
        FRAMEWORK
    }

    fn model_spec(&self, model_id: &str, params: ModelParams) -> Result<ModelSpec, AdapterError> {
        let meta = adapter_meta(FRAMEWORK).unwrap_or(&crate::registry::GENERIC);
        let spec = split_params(meta, FRAMEWORK, model_id, params)?;
        require_object(FRAMEWORK, &spec, "client_args")?;
        Ok(spec)
    }

    fn adapt_tool_schemas(&self, tools: Vec<ToolSchema>) -> Vec<ToolSchema> {
        strip_schema_key(tools, "additionalProperties")
    }

    fn config_schema(&self) -> Option<Value> {
        let mut properties = sampling_properties();
        properties.insert("model_id".into(), json!({"type": "string"}));
        properties.insert("client_args".into(), json!({"type": "object"}));
        Some(json!({"type": "object", "properties": properties}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_additional_properties_are_removed() {
        let tools = vec![ToolSchema {
            name: "search".into(),
            description: "Search".into(),
            parameters: json!({
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "filter": {"type": "object", "additionalProperties": {"type": "string"}},
                    "tags": {"type": "array", "items": {"type": "object", "additionalProperties": false}}
                }
            }),
        }];
        let adapted = LiteLlmAdapter.adapt_tool_schemas(tools);
        let text = adapted[0].parameters.to_string();
        assert!(!text.contains("additionalProperties"));
        assert_eq!(adapted[0].parameters["properties"]["filter"]["type"], "object");
    }

    #[test]
    fn client_args_move_out_of_params() {
        let mut params = ModelParams::new();
        params.insert("client_args".into(), json!({"api_base": "http://proxy:4000"}));
        params.insert("max_tokens".into(), json!(512));
        let spec = LiteLlmAdapter.model_spec("anthropic/claude-3-5-sonnet", params).unwrap();
        assert_eq!(spec.client_args["client_args"]["api_base"], "http://proxy:4000");
        assert_eq!(spec.params["max_tokens"], 512);
        assert!(!spec.params.contains_key("client_args"));
    }

    #[test]
    fn empty_model_id_is_rejected() {
        let err = LiteLlmAdapter.model_spec("", ModelParams::new()).unwrap_err();
        assert_eq!(err, AdapterError::MissingModelId { framework: "litellm".into() });
    }
}
