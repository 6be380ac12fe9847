// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use forge_model::{CompletionRequest, Message, ModelProvider, ResponseEvent, ToolSchema};
use forge_tools::{ToolCall, ToolRegistry};

/// Upper bound on model ↔ tool round trips within one turn.
pub const MAX_TOOL_ROUNDS: usize = 16;

/// A model handle plus the state one conversation needs: system prompt,
/// the tool set offered to the model and the message history.
pub struct Agent {
    model: Arc<dyn ModelProvider>,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    tool_schemas: Vec<ToolSchema>,
    messages: Vec<Message>,
}

/// What the model produced in one completion.
#[derive(Debug, Default)]
struct Completion {
    text: String,
    calls: Vec<(String, String, String)>,
}

impl Agent {
    pub fn new(model: Arc<dyn ModelProvider>) -> Self {
        Self {
            model,
            system_prompt: None,
            tools: ToolRegistry::new(),
            tool_schemas: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(&self) -> &Arc<dyn ModelProvider> {
        &self.model
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt;
    }

    /// Install in-process tools together with the schemas offered for them,
    /// usually `tools.schemas()` after provider adaptation.
    pub fn set_tools(&mut self, tools: ToolRegistry, schemas: Vec<ToolSchema>) {
        self.tools = tools;
        self.add_tool_schemas(schemas);
    }

    /// Offer additional tool schemas (server tools) to the model.
    pub fn add_tool_schemas(&mut self, schemas: impl IntoIterator<Item = ToolSchema>) {
        for schema in schemas {
            match self.tool_schemas.iter_mut().find(|s| s.name == schema.name) {
                Some(existing) => {
                    warn!(tool = %schema.name, "tool schema replaced by a later capability");
                    *existing = schema;
                }
                None => self.tool_schemas.push(schema),
            }
        }
    }

    pub fn tool_schemas(&self) -> &[ToolSchema] {
        &self.tool_schemas
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut Vec<Message> {
        &mut self.messages
    }

    pub fn seed_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// One stateless completion over `messages` without tools.  Used for
    /// side conversations such as summarization.
    pub async fn invoke(&self, messages: Vec<Message>) -> anyhow::Result<String> {
        self.invoke_as(self.system_prompt.as_deref(), messages).await
    }

    /// Like [`Agent::invoke`] but with `system_prompt` in place of the
    /// agent's own.
    pub async fn invoke_as(
        &self,
        system_prompt: Option<&str>,
        messages: Vec<Message>,
    ) -> anyhow::Result<String> {
        let req = CompletionRequest {
            system_prompt: system_prompt.map(str::to_string),
            messages,
            tools: Vec::new(),
            stream: true,
        };
        let stream = self.model.complete(req).await?;
        forge_model::collect_text(stream).await
    }

    /// Append `input`, run the model ↔ tool loop and return the final
    /// assistant text.  Every intermediate message lands in the history.
    pub async fn turn(&mut self, input: Message) -> anyhow::Result<String> {
        self.messages.push(input);
        self.resume().await
    }

    /// Continue the model ↔ tool loop from the current history.
    pub async fn resume(&mut self) -> anyhow::Result<String> {
        for round in 0..MAX_TOOL_ROUNDS {
            let completion = self.complete_once().await?;
            if completion.calls.is_empty() {
                self.messages.push(Message::assistant(completion.text.clone()));
                return Ok(completion.text);
            }
            debug!(round, calls = completion.calls.len(), "executing tool calls");
            if !completion.text.is_empty() {
                self.messages.push(Message::assistant(completion.text));
            }
            for (id, name, arguments) in completion.calls {
                let args: Value = serde_json::from_str(&arguments)
                    .unwrap_or_else(|_| Value::Object(Default::default()));
                self.messages.push(Message::tool_call(&id, &name, arguments));
                let output = self.tools.execute(&ToolCall { id: id.clone(), name, args }).await;
                self.messages.push(Message::tool_result(id, output.content));
            }
        }
        anyhow::bail!("tool loop did not settle within {MAX_TOOL_ROUNDS} rounds")
    }

    async fn complete_once(&self) -> anyhow::Result<Completion> {
        let req = CompletionRequest {
            system_prompt: self.system_prompt.clone(),
            messages: self.messages.clone(),
            tools: self.tool_schemas.clone(),
            stream: true,
        };
        let mut stream = self.model.complete(req).await?;
        let mut out = Completion::default();
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => out.text.push_str(&delta),
                ResponseEvent::ToolCall { id, name, arguments } => out.calls.push((id, name, arguments)),
                ResponseEvent::Error(msg) => anyhow::bail!("model error: {msg}"),
                ResponseEvent::Done => break,
                ResponseEvent::Usage { .. } => {}
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.model.model_name())
            .field("system_prompt", &self.system_prompt)
            .field("tools", &self.tool_schemas.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("messages", &self.messages.len())
            .finish()
    }
}
