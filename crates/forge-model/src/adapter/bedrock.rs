// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use forge_config::ModelParams;
use serde_json::{json, Value};
use tracing::debug;

use super::{require_object, sampling_properties, split_params, Adapter};
use crate::credentials::REGION_PARAM;
use crate::registry::adapter_meta;
use crate::sanitize::adapt_for_bedrock;
use crate::{AdapterError, CredentialResolver, Message, ModelSpec};

const FRAMEWORK: &str = "bedrock";

/// AWS Bedrock: region resolution plus Converse API content limits.
#[derive(Debug, Clone)]
pub struct BedrockAdapter {
    credentials: CredentialResolver,
}

impl BedrockAdapter {
    pub fn new(credentials: CredentialResolver) -> Self {
        Self { credentials }
    }
}

impl Adapter for BedrockAdapter {
    fn framework(&self) -> &str {
        FRAMEWORK
    }

    fn model_spec(&self, model_id: &str, params: ModelParams) -> Result<ModelSpec, AdapterError> {
        let region = self.credentials.resolve(&params);
        let meta = adapter_meta(FRAMEWORK).unwrap_or(&crate::registry::GENERIC);
        let mut spec = split_params(meta, FRAMEWORK, model_id, params)?;
        require_object(FRAMEWORK, &spec, "boto_client_config")?;
        match region {
            Some(region) => {
                spec.client_args.insert(REGION_PARAM.to_string(), Value::String(region));
            }
            None => {
                spec.client_args.remove(REGION_PARAM);
                debug!("no region resolved; client default applies");
            }
        }
        Ok(spec)
    }

    fn config_schema(&self) -> Option<Value> {
        let mut properties = sampling_properties();
        properties.insert("model_id".into(), json!({"type": "string"}));
        properties.insert(REGION_PARAM.into(), json!({"type": "string"}));
        properties.insert("boto_client_config".into(), json!({"type": "object"}));
        Some(json!({"type": "object", "properties": properties}))
    }

    fn adapt_content(&self, messages: Vec<Message>) -> Vec<Message> {
        adapt_for_bedrock(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::REGION_ENV;

    #[test]
    fn resolved_region_lands_in_client_args() {
        let adapter = BedrockAdapter::new(CredentialResolver::with_vars([(REGION_ENV, "eu-west-1")]));
        let spec = adapter.model_spec("anthropic.claude-3-haiku", ModelParams::new()).unwrap();
        assert_eq!(spec.client_args[REGION_PARAM], "eu-west-1");
        assert_eq!(spec.model_id, "anthropic.claude-3-haiku");
        assert!(spec.params.is_empty());
    }

    #[test]
    fn explicit_region_is_kept() {
        let adapter = BedrockAdapter::new(CredentialResolver::with_vars([(REGION_ENV, "eu-west-1")]));
        let mut params = ModelParams::new();
        params.insert(REGION_PARAM.into(), json!("us-east-2"));
        params.insert("temperature".into(), json!(0.5));
        let spec = adapter.model_spec("m", params).unwrap();
        assert_eq!(spec.client_args[REGION_PARAM], "us-east-2");
        assert_eq!(spec.params["temperature"], 0.5);
    }

    #[test]
    fn no_region_means_no_client_region() {
        let adapter = BedrockAdapter::new(CredentialResolver::with_vars(Vec::<(String, String)>::new()));
        let spec = adapter.model_spec("m", ModelParams::new()).unwrap();
        assert!(!spec.client_args.contains_key(REGION_PARAM));
    }

    #[test]
    fn client_config_must_be_an_object() {
        let adapter = BedrockAdapter::new(CredentialResolver::with_vars(Vec::<(String, String)>::new()));
        let mut params = ModelParams::new();
        params.insert("boto_client_config".into(), json!("retries=3"));
        let err = adapter.model_spec("m", params).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidParam { ref key, .. } if key == "boto_client_config"));
    }
}
