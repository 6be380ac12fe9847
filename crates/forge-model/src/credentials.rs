// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Region resolution for providers that need one (AWS Bedrock).
//!
//! Precedence, highest first:
//!
//! 1. `region_name` already present in the model parameters
//! 2. `AWS_REGION`
//! 3. `AWS_DEFAULT_REGION`
//! 4. the profile named by `AWS_PROFILE` in `~/.aws/config`, following
//!    `source_profile` links
//!
//! Resolution never fails: unreadable stores, malformed files and cyclic
//! `source_profile` chains all resolve to `None`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use forge_config::ModelParams;
use tracing::{debug, warn};

pub const REGION_PARAM: &str = "region_name";
pub const REGION_ENV: &str = "AWS_REGION";
pub const DEFAULT_REGION_ENV: &str = "AWS_DEFAULT_REGION";
pub const PROFILE_ENV: &str = "AWS_PROFILE";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct CredentialResolver {
    env: EnvLookup,
    profile_store: Option<PathBuf>,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("profile_store", &self.profile_store)
            .finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Resolver reading the process environment and `~/.aws/config`.
    pub fn from_env() -> Self {
        Self {
            env: Arc::new(|key| std::env::var(key).ok()),
            profile_store: dirs::home_dir().map(|home| home.join(".aws").join("config")),
        }
    }

    /// Resolver over a fixed set of variables and no profile store.
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            env: Arc::new(move |key| vars.get(key).cloned()),
            profile_store: None,
        }
    }

    pub fn with_profile_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_store = Some(path.into());
        self
    }

    pub fn resolve(&self, params: &ModelParams) -> Option<String> {
        // A configured region is kept as given, blank included.
        if let Some(region) = params.get(REGION_PARAM).and_then(|v| v.as_str()) {
            return Some(region.to_string());
        }
        if let Some(region) = self.var(REGION_ENV) {
            debug!(source = REGION_ENV, %region, "region resolved");
            return Some(region);
        }
        if let Some(region) = self.var(DEFAULT_REGION_ENV) {
            debug!(source = DEFAULT_REGION_ENV, %region, "region resolved");
            return Some(region);
        }
        let profile = self.var(PROFILE_ENV)?;
        let region = self.profile_region(&profile);
        if let Some(region) = &region {
            debug!(%profile, %region, "region resolved from profile store");
        }
        region
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn profile_region(&self, profile: &str) -> Option<String> {
        let path = self.profile_store.as_ref()?;
        match ProfileStore::load(path) {
            Ok(store) => store.region_for(profile),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "profile store unusable");
                None
            }
        }
    }
}

/// Parsed `~/.aws/config`-style file: named sections of `key = value` pairs.
#[derive(Debug, Default)]
pub struct ProfileStore {
    sections: HashMap<String, HashMap<String, String>>,
}

impl ProfileStore {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(inner) = line.strip_prefix('[') {
                let Some(name) = inner.strip_suffix(']') else {
                    bail!("line {}: unterminated section header", idx + 1);
                };
                let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    bail!("line {}: empty section name", idx + 1);
                }
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            let Some(section) = current.as_ref() else {
                bail!("line {}: property outside of any section", idx + 1);
            };
            // Indented lines are nested sub-properties (`s3 =` blocks).
            if raw.starts_with(char::is_whitespace) {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected `key = value`", idx + 1);
            };
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        Ok(Self { sections })
    }

    /// `default` lives in `[default]`, every other profile in `[profile NAME]`.
    fn section(&self, profile: &str) -> Option<&HashMap<String, String>> {
        if profile == "default" {
            return self.sections.get("default");
        }
        self.sections.get(&format!("profile {profile}"))
    }

    /// Follow `source_profile` links until a section defines `region`.
    pub fn region_for(&self, profile: &str) -> Option<String> {
        let mut visited = HashSet::new();
        let mut current = profile.to_string();
        loop {
            if !visited.insert(current.clone()) {
                warn!(profile, revisited = %current, "cyclic source_profile chain");
                return None;
            }
            let section = self.section(&current)?;
            if let Some(region) = section.get("region").filter(|r| !r.is_empty()) {
                return Some(region.clone());
            }
            current = section.get("source_profile")?.clone();
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
