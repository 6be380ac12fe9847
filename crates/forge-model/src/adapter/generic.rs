// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use forge_config::ModelParams;

use super::{require_object, split_params, Adapter};
use crate::registry::GENERIC;
use crate::{AdapterError, ModelSpec};

/// Fallback for every framework without a specialised adapter.
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    framework: String,
}

impl GenericAdapter {
    pub fn new(framework: impl Into<String>) -> Self {
        Self { framework: framework.into() }
    }
}

impl Adapter for GenericAdapter {
    fn framework(&self) -> &str {
        &self.framework
    }

    fn is_generic(&self) -> bool {
        true
    }

    fn model_spec(&self, model_id: &str, params: ModelParams) -> Result<ModelSpec, AdapterError> {
        let spec = split_params(&GENERIC, &self.framework, model_id, params)?;
        require_object(&self.framework, &spec, "client_args")?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keeps_framework_name_and_params() {
        let mut params = ModelParams::new();
        params.insert("temperature".into(), json!(0.2));
        let spec = GenericAdapter::new("anthropic").model_spec("claude-3-5-haiku", params).unwrap();
        assert_eq!(spec.framework, "anthropic");
        assert_eq!(spec.params["temperature"], 0.2);
        assert!(spec.client_args.is_empty());
    }

    #[test]
    fn rejects_scalar_client_args() {
        let mut params = ModelParams::new();
        params.insert("client_args".into(), json!([1, 2]));
        assert!(GenericAdapter::new("openai").model_spec("gpt-4o", params).is_err());
    }
}
