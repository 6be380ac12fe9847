// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Builds the [`ConversationStrategy`] a configuration asks for.
//!
//! The summarizing strategy always gets its own secondary [`Agent`], even
//! when it runs on the primary model, so its system prompt and sampling
//! parameters stay independent of the primary agent.

use forge_config::{ConversationConfig, ModelParams, StrategyKind, SummarizationConfig};
use forge_model::{AdapterError, AdapterRegistry, ModelRuntime};
use tracing::{debug, warn};

use crate::conversation::{ConversationStrategy, Summarizer};
use crate::prompts::DEFAULT_SUMMARIZATION_PROMPT;
use crate::{Agent, StrategyInitError};

/// A built strategy plus the reason the summarizer fell back to the
/// primary agent, if it did.
#[derive(Debug)]
pub struct BuiltStrategy {
    pub strategy: ConversationStrategy,
    pub fallback: Option<AdapterError>,
}

pub struct StrategyFactory<'a> {
    adapters: &'a AdapterRegistry,
    runtime: &'a dyn ModelRuntime,
}

impl<'a> StrategyFactory<'a> {
    pub fn new(adapters: &'a AdapterRegistry, runtime: &'a dyn ModelRuntime) -> Self {
        Self { adapters, runtime }
    }

    /// `primary_model` is the provider string of the primary agent.
    pub fn build(
        &self,
        conversation: &ConversationConfig,
        summarization: &SummarizationConfig,
        primary_model: &str,
    ) -> Result<BuiltStrategy, StrategyInitError> {
        let strategy = match conversation.strategy {
            StrategyKind::Null => ConversationStrategy::Null,
            StrategyKind::SlidingWindow => ConversationStrategy::SlidingWindow {
                window_size: conversation.sliding_window_size,
                should_truncate_results: conversation.should_truncate_results,
            },
            StrategyKind::Summarizing => {
                let prompt = summarization
                    .prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SUMMARIZATION_PROMPT.to_string());
                let (summarizer, fallback) = self.summarizer(summarization, primary_model, prompt)?;
                return Ok(BuiltStrategy {
                    strategy: ConversationStrategy::Summarizing {
                        preserve_recent: conversation.preserve_recent_messages,
                        summary_ratio: conversation.summary_ratio,
                        summarizer,
                    },
                    fallback,
                });
            }
        };
        debug!(strategy = strategy.name(), "conversation strategy built");
        Ok(BuiltStrategy { strategy, fallback: None })
    }

    fn summarizer(
        &self,
        summarization: &SummarizationConfig,
        primary_model: &str,
        prompt: String,
    ) -> Result<(Summarizer, Option<AdapterError>), StrategyInitError> {
        let model = summarization.model.as_deref().unwrap_or(primary_model);
        let params = summarization.params.clone().unwrap_or_else(ModelParams::new);
        let selection = self.adapters.select(model);

        match selection.adapter.load_model(&selection.model_id, params, self.runtime) {
            Ok(handle) => {
                debug!(model, "dedicated summarization agent built");
                let agent = Agent::new(handle).with_system_prompt(prompt);
                Ok((Summarizer::Dedicated(Box::new(agent)), None))
            }
            Err(source) if summarization.has_explicit_override() => {
                Err(StrategyInitError::Summarizer { model: model.to_string(), source })
            }
            Err(source) => {
                warn!(model, error = %source, "summarization agent unavailable, using the primary agent");
                Ok((Summarizer::Primary { prompt }, Some(source)))
            }
        }
    }
}
