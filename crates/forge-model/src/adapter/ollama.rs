// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use forge_config::ModelParams;
use serde_json::{json, Value};

use super::{require_object, sampling_properties, split_params, Adapter};
use crate::registry::adapter_meta;
use crate::{AdapterError, ModelSpec};

const FRAMEWORK: &str = "ollama";
pub const DEFAULT_HOST: &str = "127.0.0.1:11434";

/// Ollama server.  The model identifier may also come from `params.model`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaAdapter;

impl Adapter for OllamaAdapter {
    fn framework(&self) -> &str {
        FRAMEWORK
    }

    fn model_spec(&self, model_id: &str, params: ModelParams) -> Result<ModelSpec, AdapterError> {
        let meta = adapter_meta(FRAMEWORK).unwrap_or(&crate::registry::GENERIC);
        let mut spec = split_params(meta, FRAMEWORK, model_id, params)?;
        require_object(FRAMEWORK, &spec, "ollama_client_args")?;
        match spec.client_args.get("host") {
            None | Some(Value::Null) => {
                spec.client_args.insert("host".into(), Value::String(DEFAULT_HOST.into()));
            }
            Some(Value::String(h)) if !h.trim().is_empty() => {}
            Some(other) => {
                return Err(AdapterError::InvalidParam {
                    framework: FRAMEWORK.into(),
                    key: "host".into(),
                    reason: format!("must be a non-empty string, got {other}"),
                })
            }
        }
        Ok(spec)
    }

    fn config_schema(&self) -> Option<Value> {
        let mut properties = sampling_properties();
        properties.insert("model".into(), json!({"type": "string"}));
        properties.insert("host".into(), json!({"type": "string", "default": DEFAULT_HOST}));
        properties.insert("ollama_client_args".into(), json!({"type": "object"}));
        Some(json!({"type": "object", "properties": properties}))
    }
}
