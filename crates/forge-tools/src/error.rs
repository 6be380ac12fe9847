// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use thiserror::Error;

/// Why one capability source failed to load.  Collected per source, never
/// raised for the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("function source has no module path")]
    MissingModule,

    #[error("module `{module}` is not registered")]
    UnknownModule { module: String },

    #[error("function `{function}` not found in module `{module}`")]
    UnknownFunction { module: String, function: String },

    #[error("process server needs a `command` or a `url`")]
    MissingEndpoint,

    #[error("process server sets both `command` and `url`")]
    AmbiguousEndpoint,

    #[error("failed to start: {reason}")]
    Startup { reason: String },

    #[error("startup timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote agent needs at least one url")]
    NoRemoteUrls,

    #[error("invalid remote agent url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}
