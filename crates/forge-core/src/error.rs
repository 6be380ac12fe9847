// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use forge_model::AdapterError;
use thiserror::Error;

/// The summarization model was explicitly configured and could not be built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyInitError {
    #[error("summarization model `{model}` could not be loaded: {source}")]
    Summarizer {
        model: String,
        #[source]
        source: AdapterError,
    },
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("cannot summarize: insufficient messages for summarization")]
    InsufficientMessages,

    #[error("unable to trim conversation context")]
    CannotTrim,

    #[error("summarization failed: {0:#}")]
    Summarization(#[source] anyhow::Error),
}
