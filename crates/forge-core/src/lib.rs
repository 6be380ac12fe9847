// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod error;

pub mod conversation;
pub mod prompts;
pub mod strategy;

pub use agent::{Agent, MAX_TOOL_ROUNDS};
pub use conversation::{is_context_overflow, ConversationStrategy, Summarizer, TRUNCATED_RESULT_NOTICE};
pub use error::{ConversationError, StrategyInitError};
pub use strategy::{BuiltStrategy, StrategyFactory};
