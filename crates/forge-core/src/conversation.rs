// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Conversation memory strategies.
//!
//! Two entry points:
//!
//! - [`ConversationStrategy::apply_management`] runs after every turn and
//!   enforces the sliding window.
//! - [`ConversationStrategy::reduce_context`] runs when the model reports a
//!   context overflow and must shrink the history or fail.
//!
//! Neither ever leaves a tool result at the head of the history or separates
//! a tool call from its result.

use tracing::{debug, info};

use forge_model::{Message, MessageContent};

use crate::prompts::SUMMARY_REQUEST;
use crate::{Agent, ConversationError};

/// Replacement content for a truncated tool result.
pub const TRUNCATED_RESULT_NOTICE: &str = "The tool result was too large!";

/// Who writes the summaries of a summarizing strategy.
pub enum Summarizer {
    /// A secondary agent owned by the strategy.
    Dedicated(Box<Agent>),
    /// The primary agent's model, called with `prompt` as system prompt.
    Primary { prompt: String },
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Summarizer::Dedicated(agent) => f.debug_tuple("Dedicated").field(agent).finish(),
            Summarizer::Primary { .. } => f.write_str("Primary"),
        }
    }
}

#[derive(Debug)]
pub enum ConversationStrategy {
    /// Keep everything; overflow is the caller's problem.
    Null,
    SlidingWindow {
        window_size: usize,
        should_truncate_results: bool,
    },
    Summarizing {
        preserve_recent: usize,
        summary_ratio: f32,
        summarizer: Summarizer,
    },
}

impl ConversationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationStrategy::Null => "null",
            ConversationStrategy::SlidingWindow { .. } => "sliding_window",
            ConversationStrategy::Summarizing { .. } => "summarizing",
        }
    }

    pub fn summarizer(&self) -> Option<&Summarizer> {
        match self {
            ConversationStrategy::Summarizing { summarizer, .. } => Some(summarizer),
            _ => None,
        }
    }

    /// Post-turn maintenance.  Returns the number of messages removed.
    pub fn apply_management(&self, messages: &mut Vec<Message>) -> Result<usize, ConversationError> {
        match self {
            ConversationStrategy::SlidingWindow { window_size, .. } if messages.len() > *window_size => {
                trim_window(messages, *window_size)
            }
            _ => Ok(0),
        }
    }

    /// Shrink `agent`'s history after a context overflow.  Returns the number
    /// of messages removed; zero means a tool result was truncated instead.
    pub async fn reduce_context(&self, agent: &mut Agent) -> Result<usize, ConversationError> {
        match self {
            ConversationStrategy::Null => Err(ConversationError::CannotTrim),
            ConversationStrategy::SlidingWindow { window_size, should_truncate_results } => {
                let messages = agent.messages_mut();
                if *should_truncate_results && truncate_last_tool_result(messages) {
                    debug!("truncated the most recent tool result");
                    return Ok(0);
                }
                trim_window(messages, *window_size)
            }
            ConversationStrategy::Summarizing { preserve_recent, summary_ratio, summarizer } => {
                let mut messages = std::mem::take(agent.messages_mut());
                let result = summarize(&mut messages, *preserve_recent, *summary_ratio, summarizer, agent).await;
                *agent.messages_mut() = messages;
                result
            }
        }
    }
}

/// Phrases providers use when a request exceeds the context window.
const OVERFLOW_MARKERS: &[&str] = &[
    "context window",
    "context length",
    "context_length_exceeded",
    "maximum context",
    "too many tokens",
    "input is too long",
    "prompt is too long",
];

/// True if `err` reports a context-window overflow.
pub fn is_context_overflow(err: &anyhow::Error) -> bool {
    let text = format!("{err:#}").to_ascii_lowercase();
    OVERFLOW_MARKERS.iter().any(|m| text.contains(m))
}

fn is_tool_call(m: &Message) -> bool {
    matches!(m.content, MessageContent::ToolCall { .. })
}

/// True if the history may start (or resume after a summary) at `idx`.
fn is_valid_start(messages: &[Message], idx: usize) -> bool {
    if messages[idx].is_tool_result() {
        return false;
    }
    let next_is_result = messages.get(idx + 1).map(Message::is_tool_result);
    !(is_tool_call(&messages[idx]) && next_is_result == Some(false))
}

/// Drop the oldest messages so at most `window_size` remain, moving the cut
/// forward past any tool pair it would split.
fn trim_window(messages: &mut Vec<Message>, window_size: usize) -> Result<usize, ConversationError> {
    let len = messages.len();
    let mut cut = if len <= window_size { 2 } else { len - window_size };
    while cut < len {
        if is_valid_start(messages, cut) {
            messages.drain(..cut);
            debug!(removed = cut, kept = messages.len(), "conversation window trimmed");
            return Ok(cut);
        }
        cut += 1;
    }
    Err(ConversationError::CannotTrim)
}

/// Replace the content of the most recent tool result with
/// [`TRUNCATED_RESULT_NOTICE`].  False if it already was.
fn truncate_last_tool_result(messages: &mut [Message]) -> bool {
    let Some(last) = messages.iter_mut().rev().find(|m| m.is_tool_result()) else {
        return false;
    };
    match &mut last.content {
        MessageContent::ToolResult { content, .. } if content != TRUNCATED_RESULT_NOTICE => {
            *content = TRUNCATED_RESULT_NOTICE.to_string();
            true
        }
        _ => false,
    }
}

/// Move `split` forward until it no longer orphans a tool result.
fn adjust_split_point(messages: &[Message], mut split: usize) -> Result<usize, ConversationError> {
    if split > messages.len() {
        return Err(ConversationError::CannotTrim);
    }
    if split == messages.len() {
        return Ok(split);
    }
    while split < messages.len() {
        if is_valid_start(messages, split) {
            return Ok(split);
        }
        split += 1;
    }
    Err(ConversationError::CannotTrim)
}

async fn summarize(
    messages: &mut Vec<Message>,
    preserve_recent: usize,
    summary_ratio: f32,
    summarizer: &Summarizer,
    primary: &Agent,
) -> Result<usize, ConversationError> {
    let len = messages.len();
    let limit = len.saturating_sub(preserve_recent);
    let count = ((len as f32 * summary_ratio) as usize).max(1).min(limit);
    if count == 0 {
        return Err(ConversationError::InsufficientMessages);
    }
    let count = match adjust_split_point(messages, count) {
        Ok(split) if split <= limit => split,
        // Moving forward reached the preserved tail; look back instead.
        _ => (1..=limit)
            .rev()
            .find(|&idx| idx == len || is_valid_start(messages, idx))
            .ok_or(ConversationError::InsufficientMessages)?,
    };

    let mut request: Vec<Message> = messages[..count].to_vec();
    request.push(Message::user(SUMMARY_REQUEST));
    let summary = match summarizer {
        Summarizer::Dedicated(agent) => agent.invoke(request).await,
        Summarizer::Primary { prompt } => primary.invoke_as(Some(prompt), request).await,
    }
    .map_err(ConversationError::Summarization)?;

    messages.splice(..count, [Message::user(summary)]);
    info!(summarized = count, remaining = messages.len(), "conversation summarized");
    Ok(count)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use forge_model::{ModelProvider, ScriptedMockProvider};

    use super::*;

    fn chat(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| if i % 2 == 0 { Message::user(format!("u{i}")) } else { Message::assistant(format!("a{i}")) })
            .collect()
    }

    fn agent_with(history: Vec<Message>, model: Arc<dyn ModelProvider>) -> Agent {
        let mut agent = Agent::new(model);
        agent.seed_history(history);
        agent
    }

    fn sliding(window_size: usize) -> ConversationStrategy {
        ConversationStrategy::SlidingWindow { window_size, should_truncate_results: true }
    }

    // ── Sliding window ───────────────────────────────────────────────────────

    #[test]
    fn window_evicts_oldest_first() {
        let mut msgs = chat(7);
        assert_eq!(sliding(4).apply_management(&mut msgs).unwrap(), 3);
        assert_eq!(msgs, chat(7)[3..].to_vec());

        let mut short = chat(3);
        assert_eq!(sliding(4).apply_management(&mut short).unwrap(), 0);
        assert_eq!(short.len(), 3);
    }

    #[test]
    fn window_never_starts_with_orphaned_result() {
        let mut msgs = vec![
            Message::user("q"),
            Message::tool_call("c1", "search", "{}"),
            Message::tool_result("c1", "found"),
            Message::assistant("done"),
            Message::user("next"),
        ];
        // A 3-message window would start at the tool result.
        assert_eq!(sliding(3).apply_management(&mut msgs).unwrap(), 3);
        assert_eq!(msgs[0].as_text(), Some("done"));
    }

    #[test]
    fn null_strategy_keeps_everything() {
        let mut msgs = chat(50);
        assert_eq!(ConversationStrategy::Null.apply_management(&mut msgs).unwrap(), 0);
        assert_eq!(msgs.len(), 50);
    }

    #[tokio::test]
    async fn overflow_truncates_tool_result_before_evicting() {
        let model = Arc::new(ScriptedMockProvider::always_text(""));
        let history = vec![
            Message::user("q"),
            Message::tool_call("c1", "dump", "{}"),
            Message::tool_result("c1", "x".repeat(10_000)),
            Message::assistant("ok"),
        ];
        let mut agent = agent_with(history, model);
        let strategy = sliding(10);

        assert_eq!(strategy.reduce_context(&mut agent).await.unwrap(), 0);
        assert_eq!(agent.messages()[2], Message::tool_result("c1", TRUNCATED_RESULT_NOTICE));

        // Nothing left to truncate: the next reduction evicts.
        assert_eq!(strategy.reduce_context(&mut agent).await.unwrap(), 3);
        assert_eq!(agent.messages().len(), 1);
    }

    #[tokio::test]
    async fn null_strategy_cannot_reduce() {
        let mut agent = agent_with(chat(4), Arc::new(ScriptedMockProvider::always_text("")));
        assert!(matches!(
            ConversationStrategy::Null.reduce_context(&mut agent).await,
            Err(ConversationError::CannotTrim)
        ));
    }

    #[test]
    fn overflow_errors_are_recognised() {
        assert!(is_context_overflow(&anyhow::anyhow!("model error: Input is too long for requested model")));
        assert!(is_context_overflow(&anyhow::anyhow!("context_length_exceeded")));
        assert!(!is_context_overflow(&anyhow::anyhow!("rate limited")));
    }

    // ── Summarizing ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn summary_replaces_oldest_messages() {
        let summarizer_model = Arc::new(ScriptedMockProvider::always_text("SUMMARY"));
        let summarizer = Agent::new(summarizer_model.clone()).with_system_prompt("sum it up");
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 4,
            summary_ratio: 0.5,
            summarizer: Summarizer::Dedicated(Box::new(summarizer)),
        };
        let mut agent = agent_with(chat(10), Arc::new(ScriptedMockProvider::always_text("")));

        assert_eq!(strategy.reduce_context(&mut agent).await.unwrap(), 5);
        let msgs = agent.messages();
        assert_eq!(msgs.len(), 6);
        assert_eq!(msgs[0], Message::user("SUMMARY"));
        assert_eq!(&msgs[1..], &chat(10)[5..]);

        let req = &summarizer_model.requests.lock().unwrap()[0];
        assert_eq!(req.system_prompt.as_deref(), Some("sum it up"));
        assert_eq!(req.messages.len(), 6);
        assert_eq!(req.messages[5].as_text(), Some(SUMMARY_REQUEST));
    }

    #[tokio::test]
    async fn recent_messages_are_never_summarized() {
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 8,
            summary_ratio: 0.8,
            summarizer: Summarizer::Primary { prompt: "p".into() },
        };
        let mut agent = agent_with(chat(10), Arc::new(ScriptedMockProvider::always_text("S")));
        assert_eq!(strategy.reduce_context(&mut agent).await.unwrap(), 2);
        assert_eq!(&agent.messages()[1..], &chat(10)[2..]);
    }

    #[tokio::test]
    async fn too_few_messages_to_summarize() {
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 10,
            summary_ratio: 0.3,
            summarizer: Summarizer::Primary { prompt: "p".into() },
        };
        let mut agent = agent_with(chat(6), Arc::new(ScriptedMockProvider::always_text("S")));
        assert!(matches!(
            strategy.reduce_context(&mut agent).await,
            Err(ConversationError::InsufficientMessages)
        ));
        assert_eq!(agent.messages().len(), 6);
    }

    #[tokio::test]
    async fn split_point_keeps_tool_pairs_together() {
        let history = vec![
            Message::user("q"),
            Message::tool_call("c1", "search", "{}"),
            Message::tool_result("c1", "found"),
            Message::assistant("a"),
            Message::user("q2"),
            Message::assistant("a2"),
        ];
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 1,
            summary_ratio: 0.4,
            summarizer: Summarizer::Primary { prompt: "p".into() },
        };
        let primary = Arc::new(ScriptedMockProvider::always_text("S"));
        let mut agent = agent_with(history, primary.clone());
        // 6 * 0.4 = 2 would split the pair; the split moves past the result.
        assert_eq!(strategy.reduce_context(&mut agent).await.unwrap(), 3);
        assert_eq!(agent.messages()[1].as_text(), Some("a"));
        assert_eq!(primary.requests.lock().unwrap()[0].system_prompt.as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn split_point_backs_off_a_pair_on_the_preserve_boundary() {
        let history = vec![
            Message::user("u0"),
            Message::assistant("a1"),
            Message::tool_call("c1", "search", "{}"),
            Message::tool_result("c1", "found"),
            Message::assistant("a4"),
            Message::user("u5"),
        ];
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 3,
            summary_ratio: 0.5,
            summarizer: Summarizer::Primary { prompt: "p".into() },
        };
        let mut agent = agent_with(history.clone(), Arc::new(ScriptedMockProvider::always_text("S")));
        assert_eq!(strategy.reduce_context(&mut agent).await.unwrap(), 2);
        assert_eq!(agent.messages()[0].as_text(), Some("S"));
        assert_eq!(&agent.messages()[1..], &history[2..]);
    }

    #[tokio::test]
    async fn tool_pairs_filling_the_history_cannot_be_summarized() {
        let history = vec![
            Message::tool_call("c1", "search", "{}"),
            Message::tool_result("c1", "found"),
            Message::tool_call("c2", "search", "{}"),
            Message::tool_result("c2", "found"),
        ];
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 3,
            summary_ratio: 0.5,
            summarizer: Summarizer::Primary { prompt: "p".into() },
        };
        let mut agent = agent_with(history.clone(), Arc::new(ScriptedMockProvider::always_text("S")));
        assert!(matches!(
            strategy.reduce_context(&mut agent).await,
            Err(ConversationError::InsufficientMessages)
        ));
        assert_eq!(agent.messages(), &history[..]);
    }

    #[tokio::test]
    async fn summarizer_failure_leaves_history_intact() {
        let strategy = ConversationStrategy::Summarizing {
            preserve_recent: 2,
            summary_ratio: 0.5,
            summarizer: Summarizer::Primary { prompt: "p".into() },
        };
        let mut agent = agent_with(chat(8), Arc::new(ScriptedMockProvider::failing("boom")));
        assert!(matches!(
            strategy.reduce_context(&mut agent).await,
            Err(ConversationError::Summarization(_))
        ));
        assert_eq!(agent.messages(), &chat(8)[..]);
    }
}
