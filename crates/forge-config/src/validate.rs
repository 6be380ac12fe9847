// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Structural validation run before any capability is loaded.
//!
//! [`validate`] collects every problem instead of stopping at the first so
//! that a single assembly error can describe all of them.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::{CapabilitySource, Config, ModelParams, StrategyKind};

pub const SLIDING_WINDOW_RANGE: RangeInclusive<usize> = 1..=1000;
pub const SUMMARY_RATIO_RANGE: RangeInclusive<f32> = 0.1..=0.8;
pub const PRESERVE_RECENT_RANGE: RangeInclusive<usize> = 1..=100;

const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.0..=2.0;
const TOP_P_RANGE: RangeInclusive<f64> = 0.0..=1.0;
const MAX_TOKENS_RANGE: RangeInclusive<u64> = 1..=200_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("duplicate capability id: {0}")]
    DuplicateCapabilityId(String),

    #[error("capability at position {0} has an empty id")]
    EmptyCapabilityId(usize),

    #[error("sliding_window_size must be between 1 and 1000, got {0}")]
    SlidingWindowSize(usize),

    #[error("summary_ratio must be between 0.1 and 0.8, got {0}")]
    SummaryRatio(f32),

    #[error("preserve_recent_messages must be between 1 and 100, got {0}")]
    PreserveRecent(usize),

    #[error("invalid model identifier: {0:?}")]
    ModelIdentifier(String),

    #[error("model parameter {name} {reason}")]
    ModelParam { name: String, reason: String },

    #[error("loader.max_concurrency must be at least 1")]
    MaxConcurrency,
}

fn model_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_-]+(?::[a-zA-Z0-9_/.-]+)*$").expect("static regex")
    })
}

/// Check `config` and return every problem found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    check_model_identifier(&config.model, &mut errors);
    if let Some(model) = &config.summarization.model {
        check_model_identifier(model, &mut errors);
    }
    check_model_params(&config.model_params, &mut errors);
    if let Some(params) = &config.summarization.params {
        check_model_params(params, &mut errors);
    }

    let conv = &config.conversation;
    if !SLIDING_WINDOW_RANGE.contains(&conv.sliding_window_size) {
        errors.push(ConfigError::SlidingWindowSize(conv.sliding_window_size));
    }
    if !SUMMARY_RATIO_RANGE.contains(&conv.summary_ratio) {
        errors.push(ConfigError::SummaryRatio(conv.summary_ratio));
    }
    if conv.strategy == StrategyKind::Summarizing
        && !PRESERVE_RECENT_RANGE.contains(&conv.preserve_recent_messages)
    {
        errors.push(ConfigError::PreserveRecent(conv.preserve_recent_messages));
    }

    if config.loader.max_concurrency == 0 {
        errors.push(ConfigError::MaxConcurrency);
    }

    for (idx, source) in config.capabilities.iter().enumerate() {
        if source.id.trim().is_empty() {
            errors.push(ConfigError::EmptyCapabilityId(idx));
        }
    }
    if let Err(e) = check_unique_ids(&config.capabilities) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Reject the first identifier that appears twice in one batch.
pub fn check_unique_ids(sources: &[CapabilitySource]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for source in sources {
        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::DuplicateCapabilityId(source.id.clone()));
        }
    }
    Ok(())
}

fn check_model_identifier(model: &str, errors: &mut Vec<ConfigError>) {
    if !model_identifier_re().is_match(model) {
        errors.push(ConfigError::ModelIdentifier(model.to_string()));
    }
}

fn check_model_params(params: &ModelParams, errors: &mut Vec<ConfigError>) {
    let mut out_of_range = |name: &str, value: &serde_json::Value, ok: bool, expected: &str| {
        if !ok {
            errors.push(ConfigError::ModelParam {
                name: name.to_string(),
                reason: format!("must be {expected}, got {value}"),
            });
        }
    };

    if let Some(v) = params.get("temperature") {
        let ok = v.as_f64().is_some_and(|t| TEMPERATURE_RANGE.contains(&t));
        out_of_range("temperature", v, ok, "a number between 0 and 2");
    }
    if let Some(v) = params.get("top_p") {
        let ok = v.as_f64().is_some_and(|t| TOP_P_RANGE.contains(&t));
        out_of_range("top_p", v, ok, "a number between 0 and 1");
    }
    if let Some(v) = params.get("max_tokens") {
        let ok = v.as_u64().is_some_and(|t| MAX_TOKENS_RANGE.contains(&t));
        out_of_range("max_tokens", v, ok, "an integer between 1 and 200000");
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
