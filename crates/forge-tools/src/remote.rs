// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Client for remote agents reachable over HTTP, exposed to the model as
//! three tools: list the configured agents, fetch an agent card, and send
//! a message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_config::RemoteAgentSource;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::CapabilityError;

pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

#[derive(Debug)]
pub struct RemoteAgentClient {
    urls: Vec<Url>,
    auth_token: Option<String>,
    webhook: Option<(String, Option<String>)>,
    http: reqwest::Client,
}

impl RemoteAgentClient {
    /// Validate addresses and build the HTTP client.  No request is sent.
    pub fn from_source(source: &RemoteAgentSource) -> Result<Self, CapabilityError> {
        if source.urls.iter().all(|u| u.trim().is_empty()) {
            return Err(CapabilityError::NoRemoteUrls);
        }
        let urls = source
            .urls
            .iter()
            .map(|raw| parse_agent_url(raw.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(source.timeout_secs))
            .user_agent(concat!("forge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CapabilityError::Startup { reason: e.to_string() })?;
        Ok(Self {
            urls,
            auth_token: source.auth_token.clone().filter(|t| !t.is_empty()),
            webhook: source.webhook_url.clone().map(|url| (url, source.webhook_token.clone())),
            http,
        })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// Tool set backed by this client.
    pub fn tools(self: &Arc<Self>) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(ListAgentsTool { client: self.clone() }),
            Arc::new(DiscoverAgentTool { client: self.clone() }),
            Arc::new(SendMessageTool { client: self.clone() }),
        ]
    }

    fn known(&self, raw: &str) -> anyhow::Result<Url> {
        let url = parse_agent_url(raw)?;
        if !self.urls.iter().any(|u| same_agent(u, &url)) {
            anyhow::bail!("{raw} is not a configured remote agent");
        }
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn agent_card(&self, raw: &str) -> anyhow::Result<Value> {
        let url = self.known(raw)?.join(AGENT_CARD_PATH)?;
        debug!(%url, "fetching agent card");
        let resp = self.authorize(self.http.get(url)).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn send_message(&self, raw: &str, text: &str) -> anyhow::Result<Value> {
        let url = self.known(raw)?;
        let body = message_request(text, self.webhook.as_ref());
        debug!(%url, "sending message to remote agent");
        let resp = self
            .authorize(self.http.post(url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let reply: Value = resp.json().await?;
        if let Some(err) = reply.get("error") {
            anyhow::bail!("remote agent error: {err}");
        }
        Ok(reply.get("result").cloned().unwrap_or(reply))
    }
}

fn parse_agent_url(raw: &str) -> Result<Url, CapabilityError> {
    let invalid = |reason: String| CapabilityError::InvalidUrl { url: raw.to_string(), reason };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(invalid("missing host".into())),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

fn same_agent(a: &Url, b: &Url) -> bool {
    a.as_str().trim_end_matches('/') == b.as_str().trim_end_matches('/')
}

/// JSON-RPC `message/send` request body.
fn message_request(text: &str, webhook: Option<&(String, Option<String>)>) -> Value {
    let mut params = json!({
        "message": {
            "role": "user",
            "messageId": uuid::Uuid::new_v4().to_string(),
            "parts": [{"kind": "text", "text": text}]
        }
    });
    if let Some((url, token)) = webhook {
        params["configuration"] = json!({
            "pushNotificationConfig": {"url": url, "token": token}
        });
    }
    json!({
        "jsonrpc": "2.0",
        "id": uuid::Uuid::new_v4().to_string(),
        "method": "message/send",
        "params": params
    })
}

fn url_arg(call: &ToolCall) -> Result<&str, ToolOutput> {
    call.args
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ToolOutput::err(&call.id, "missing 'url'"))
}

struct ListAgentsTool {
    client: Arc<RemoteAgentClient>,
}

#[async_trait]
impl Tool for ListAgentsTool {
    fn name(&self) -> &str {
        "remote_list_agents"
    }
    fn description(&self) -> &str {
        "List the remote agents this agent may talk to."
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let urls: Vec<&str> = self.client.urls.iter().map(Url::as_str).collect();
        ToolOutput::ok(&call.id, json!({ "agents": urls }).to_string())
    }
}

struct DiscoverAgentTool {
    client: Arc<RemoteAgentClient>,
}

#[async_trait]
impl Tool for DiscoverAgentTool {
    fn name(&self) -> &str {
        "remote_discover_agent"
    }
    fn description(&self) -> &str {
        "Fetch the agent card of a remote agent to learn its name, skills and capabilities."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Base URL of a configured remote agent"}
            },
            "required": ["url"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = match url_arg(call) {
            Ok(u) => u,
            Err(out) => return out,
        };
        match self.client.agent_card(url).await {
            Ok(card) => ToolOutput::ok(&call.id, card.to_string()),
            Err(e) => ToolOutput::err(&call.id, format!("discovery failed: {e:#}")),
        }
    }
}

struct SendMessageTool {
    client: Arc<RemoteAgentClient>,
}

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "remote_send_message"
    }
    fn description(&self) -> &str {
        "Send a text message to a remote agent and return its reply."
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Base URL of a configured remote agent"},
                "message": {"type": "string", "description": "Text to send"}
            },
            "required": ["url", "message"]
        })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = match url_arg(call) {
            Ok(u) => u,
            Err(out) => return out,
        };
        let Some(text) = call.args.get("message").and_then(Value::as_str) else {
            return ToolOutput::err(&call.id, "missing 'message'");
        };
        match self.client.send_message(url, text).await {
            Ok(reply) => ToolOutput::ok(&call.id, reply.to_string()),
            Err(e) => ToolOutput::err(&call.id, format!("send failed: {e:#}")),
        }
    }
}
