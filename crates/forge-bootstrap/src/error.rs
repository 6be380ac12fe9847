// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::time::Duration;

use forge_config::ConfigError;
use forge_core::StrategyInitError;
use forge_model::AdapterError;
use thiserror::Error;

/// Non-fatal per-capability failure, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityFailure {
    pub id: String,
    pub kind: &'static str,
    pub reason: String,
}

impl fmt::Display for CapabilityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.kind, self.reason)
    }
}

/// The cause that stopped an assembly.
#[derive(Debug, Error)]
pub enum FatalCause {
    #[error("invalid configuration: {}", join(.0))]
    Config(Vec<ConfigError>),

    #[error(transparent)]
    AdapterLoad(#[from] AdapterError),

    #[error(transparent)]
    StrategyInit(#[from] StrategyInitError),

    #[error("capability loading did not finish within {0:?}")]
    Timeout(Duration),
}

impl From<ConfigError> for FatalCause {
    fn from(e: ConfigError) -> Self {
        FatalCause::Config(vec![e])
    }
}

fn join(errors: &[ConfigError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Single aggregated error returned by a failed assembly: the fatal cause
/// plus every capability that failed along the way.
#[derive(Debug)]
pub struct AssemblyError {
    pub fatal: FatalCause,
    pub capability_failures: Vec<CapabilityFailure>,
}

impl AssemblyError {
    pub fn new(fatal: impl Into<FatalCause>) -> Self {
        Self { fatal: fatal.into(), capability_failures: Vec::new() }
    }

    pub fn with_failures(mut self, failures: Vec<CapabilityFailure>) -> Self {
        self.capability_failures = failures;
        self
    }
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent assembly failed: {}", self.fatal)?;
        if !self.capability_failures.is_empty() {
            write!(f, " ({} capability failure(s): ", self.capability_failures.len())?;
            for (i, failure) in self.capability_failures.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{failure}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl std::error::Error for AssemblyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.fatal)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActivationError {
    #[error("tool server {server_id} failed to activate: {reason}")]
    Server { server_id: String, reason: String },

    #[error("agent resources were already released")]
    Released,
}

/// A connection that did not close cleanly.  Recorded, never raised.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseFailure {
    pub server_id: String,
    pub reason: String,
}
