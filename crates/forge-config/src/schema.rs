// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Free-form provider parameters (`temperature`, `region_name`,
/// `client_args`, ...).  Adapters decide which keys they understand.
pub type ModelParams = serde_json::Map<String, serde_json::Value>;

/// Serde default helper, returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `false`, so a named
/// function is required for fields that are enabled unless switched off.
fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "openai:gpt-4o".to_string()
}

/// Top-level assembly configuration.
///
/// ```yaml
/// model: bedrock:anthropic.claude-3-5-sonnet-20241022-v2:0
/// model_params:
///   temperature: 0.2
/// system_prompt: You are a careful assistant.
/// capabilities:
///   - id: fs
///     type: process-server
///     command: npx
///     args: ["-y", "@modelcontextprotocol/server-filesystem", "."]
/// conversation:
///   strategy: summarizing
///   preserve_recent_messages: 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider string with an optional `framework:` prefix.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub model_params: ModelParams,
    pub system_prompt: Option<String>,
    /// Send the system prompt as the first user turn instead of through the
    /// provider's system slot.  Needed for models without system-role support.
    #[serde(default)]
    pub emulate_system_prompt: bool,
    /// Seed message placed in the conversation before the first user turn.
    pub initial_message: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<CapabilitySource>,
    /// Extra capability descriptor files (JSON, YAML or TOML).  `~` expands.
    #[serde(default)]
    pub capability_files: Vec<PathBuf>,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            model_params: ModelParams::new(),
            system_prompt: None,
            emulate_system_prompt: false,
            initial_message: None,
            capabilities: Vec::new(),
            capability_files: Vec::new(),
            conversation: ConversationConfig::default(),
            summarization: SummarizationConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

// ─── Conversation memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[serde(alias = "none")]
    Null,
    #[default]
    SlidingWindow,
    Summarizing,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Null => write!(f, "null"),
            StrategyKind::SlidingWindow => write!(f, "sliding_window"),
            StrategyKind::Summarizing => write!(f, "summarizing"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Maximum retained messages for the sliding window (1–1000).
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,
    /// Messages the summarizing strategy never compresses (1–100).
    #[serde(default = "default_preserve_recent_messages")]
    pub preserve_recent_messages: usize,
    /// Fraction of the history summarized per reduction (0.1–0.8).
    #[serde(default = "default_summary_ratio")]
    pub summary_ratio: f32,
    /// Truncate oversized tool results before evicting whole messages.
    #[serde(default = "default_true")]
    pub should_truncate_results: bool,
}

fn default_sliding_window_size() -> usize {
    40
}
fn default_preserve_recent_messages() -> usize {
    10
}
fn default_summary_ratio() -> f32 {
    0.3
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            sliding_window_size: default_sliding_window_size(),
            preserve_recent_messages: default_preserve_recent_messages(),
            summary_ratio: default_summary_ratio(),
            should_truncate_results: true,
        }
    }
}

/// Optional overrides for the dedicated summarizer agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Provider string for the summarizer; defaults to the primary model.
    pub model: Option<String>,
    /// Parameters for the summarizer; defaults to an empty map.
    pub params: Option<ModelParams>,
    /// System prompt for the summarizer; defaults to the built-in prompt.
    pub prompt: Option<String>,
}

impl SummarizationConfig {
    /// True when the caller asked for a specific summarizer model or
    /// parameter set.  A failure to honour such a request is fatal.
    pub fn has_explicit_override(&self) -> bool {
        self.model.is_some() || self.params.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Upper bound on concurrently starting process servers.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Handshake timeout applied to process servers without their own.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// Bound on the whole capability loading phase.  `None` waits for the
    /// per-source timeouts only.
    pub timeout_secs: Option<u64>,
}

fn default_max_concurrency() -> usize {
    3
}
fn default_startup_timeout_secs() -> u64 {
    30
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            startup_timeout_secs: default_startup_timeout_secs(),
            timeout_secs: None,
        }
    }
}

// ─── Capability sources ──────────────────────────────────────────────────────

/// One configured unit of agent functionality.
///
/// The `type` tag selects the payload; unknown tags fail deserialization.
/// Payload fields are deliberately lenient so that an incomplete payload is
/// reported as a load failure of that one source instead of rejecting the
/// whole configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySource {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: CapabilityKind,
    /// File the descriptor was read from, when it came from `capability_files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

impl CapabilitySource {
    pub fn new(id: impl Into<String>, kind: CapabilityKind) -> Self {
        Self { id: id.into(), enabled: true, kind, source_file: None }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CapabilityKind {
    #[serde(alias = "python")]
    Function(FunctionSource),
    #[serde(alias = "mcp", alias = "mcp-stdio", alias = "mcp-http")]
    ProcessServer(ProcessServerSource),
    #[serde(alias = "a2a")]
    RemoteAgent(RemoteAgentSource),
}

impl CapabilityKind {
    pub fn label(&self) -> &'static str {
        match self {
            CapabilityKind::Function(_) => "function",
            CapabilityKind::ProcessServer(_) => "process-server",
            CapabilityKind::RemoteAgent(_) => "remote-agent",
        }
    }
}

/// In-process functions resolved from a named module of the function catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionSource {
    #[serde(default, alias = "module_path")]
    pub module: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

/// A long-lived tool server, either spawned over stdio or reached over HTTP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessServerSource {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub url: Option<String>,
    /// Only expose these tools from the server.  Empty exposes all of them.
    #[serde(default)]
    pub functions: Vec<String>,
    pub startup_timeout_secs: Option<u64>,
}

/// Client for one or more remote agents reachable over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAgentSource {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
    pub auth_token: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
}

fn default_remote_timeout_secs() -> u64 {
    300
}

impl Default for RemoteAgentSource {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            timeout_secs: default_remote_timeout_secs(),
            auth_token: None,
            webhook_url: None,
            webhook_token: None,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_sensible() {
        let cfg = Config::default();
        assert_eq!(cfg.model, "openai:gpt-4o");
        assert_eq!(cfg.conversation.strategy, StrategyKind::SlidingWindow);
        assert_eq!(cfg.conversation.sliding_window_size, 40);
        assert_eq!(cfg.loader.max_concurrency, 3);
        assert!(cfg.conversation.should_truncate_results);
    }

    #[test]
    fn capability_tag_selects_payload() {
        let yaml = r#"
- id: fs
  type: process-server
  command: npx
  args: ["-y", "server-filesystem"]
- id: helpers
  type: function
  module: text
  functions: [word_count]
- id: peers
  type: remote-agent
  urls: ["http://localhost:9000"]
"#;
        let sources: Vec<CapabilitySource> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sources.len(), 3);
        assert!(matches!(sources[0].kind, CapabilityKind::ProcessServer(ref p) if p.command.as_deref() == Some("npx")));
        assert!(matches!(sources[1].kind, CapabilityKind::Function(ref f) if f.functions == ["word_count"]));
        match &sources[2].kind {
            CapabilityKind::RemoteAgent(r) => assert_eq!(r.timeout_secs, 300),
            other => panic!("unexpected kind: {other:?}"),
        }
        assert!(sources.iter().all(|s| s.enabled));
    }

    #[test]
    fn legacy_type_aliases_are_accepted() {
        let json = r#"[
            {"id": "a", "type": "mcp", "url": "http://localhost:8000/mcp"},
            {"id": "b", "type": "a2a", "urls": []},
            {"id": "c", "type": "python", "module": "m"}
        ]"#;
        let sources: Vec<CapabilitySource> = serde_json::from_str(json).unwrap();
        assert_eq!(sources[0].kind.label(), "process-server");
        assert_eq!(sources[1].kind.label(), "remote-agent");
        assert_eq!(sources[2].kind.label(), "function");
    }

    #[test]
    fn incomplete_payload_still_deserializes() {
        let json = r#"{"id": "empty", "type": "process-server"}"#;
        let source: CapabilitySource = serde_json::from_str(json).unwrap();
        match source.kind {
            CapabilityKind::ProcessServer(p) => {
                assert!(p.command.is_none());
                assert!(p.url.is_none());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"id": "x", "type": "carrier-pigeon"}"#;
        assert!(serde_json::from_str::<CapabilitySource>(json).is_err());
    }

    #[test]
    fn enabled_flag_can_be_switched_off() {
        let json = r#"{"id": "x", "type": "function", "module": "m", "enabled": false}"#;
        let source: CapabilitySource = serde_json::from_str(json).unwrap();
        assert!(!source.enabled);
    }

    #[test]
    fn explicit_summarizer_override_detection() {
        let mut s = SummarizationConfig::default();
        assert!(!s.has_explicit_override());
        s.prompt = Some("be brief".into());
        assert!(!s.has_explicit_override(), "a prompt alone is not an override");
        s.params = Some(ModelParams::new());
        assert!(s.has_explicit_override());
    }

    #[test]
    fn strategy_kind_accepts_none_alias() {
        let cfg: ConversationConfig = serde_yaml::from_str("strategy: none").unwrap();
        assert_eq!(cfg.strategy, StrategyKind::Null);
    }
}
