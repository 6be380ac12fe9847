// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{provider::ResponseStream, CompletionRequest, ModelRuntime, ModelSpec, ResponseEvent};

/// Deterministic mock provider for tests.  Echoes the last user message
/// back as the assistant response.
pub struct MockProvider {
    framework: String,
    model: String,
}

impl MockProvider {
    pub fn new(framework: impl Into<String>, model: impl Into<String>) -> Self {
        Self { framework: framework.into(), model: model.into() }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock", "mock-model")
    }
}

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        &self.framework
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::Role::User))
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();

        let events: Vec<anyhow::Result<ResponseEvent>> = vec![
            Ok(ResponseEvent::TextDelta(format!("MOCK: {reply}"))),
            Ok(ResponseEvent::Usage { input_tokens: 10, output_tokens: 10 }),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A pre-scripted mock provider.  Each call to `complete` pops the next
/// response script from the front of the queue.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<Vec<ResponseEvent>>>>,
    /// Every request seen, in call order.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider whose first reply is `reply`.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![vec![ResponseEvent::TextDelta(reply.into()), ResponseEvent::Done]])
    }

    /// Provider whose first reply is a model error.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::new(vec![vec![ResponseEvent::Error(msg.into())]])
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        self.requests.lock().unwrap().push(req);
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![
                    ResponseEvent::TextDelta("[no more scripts]".into()),
                    ResponseEvent::Done,
                ]
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<anyhow::Result<ResponseEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

/// Runtime double that records every spec it is asked to instantiate.
///
/// Unknown model ids get an echoing [`MockProvider`]; ids registered with
/// [`MockRuntime::unreachable`] fail, ids registered with
/// [`MockRuntime::with_provider`] return the given handle.
#[derive(Default)]
pub struct MockRuntime {
    unreachable: Vec<String>,
    providers: HashMap<String, Arc<dyn crate::ModelProvider>>,
    /// Specs passed to `instantiate`, in call order.
    pub specs: Mutex<Vec<ModelSpec>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(mut self, model_id: impl Into<String>) -> Self {
        self.unreachable.push(model_id.into());
        self
    }

    pub fn with_provider(
        mut self,
        model_id: impl Into<String>,
        provider: Arc<dyn crate::ModelProvider>,
    ) -> Self {
        self.providers.insert(model_id.into(), provider);
        self
    }

    pub fn recorded(&self) -> Vec<ModelSpec> {
        self.specs.lock().unwrap().clone()
    }
}

impl ModelRuntime for MockRuntime {
    fn instantiate(&self, spec: &ModelSpec) -> anyhow::Result<Arc<dyn crate::ModelProvider>> {
        self.specs.lock().unwrap().push(spec.clone());
        if self.unreachable.contains(&spec.model_id) {
            anyhow::bail!("model {} is unreachable", spec.model_id);
        }
        if let Some(p) = self.providers.get(&spec.model_id) {
            return Ok(p.clone());
        }
        Ok(Arc::new(MockProvider::new(spec.framework.clone(), spec.model_id.clone())))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
