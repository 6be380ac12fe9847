// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Model construction failure.  Always fatal for the assembly that hit it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("{framework}: a model identifier is required")]
    MissingModelId { framework: String },

    #[error("{framework}: parameter {key} {reason}")]
    InvalidParam {
        framework: String,
        key: String,
        reason: String,
    },

    #[error("{framework}: failed to load model {model_id}: {reason}")]
    Load {
        framework: String,
        model_id: String,
        reason: String,
    },
}
