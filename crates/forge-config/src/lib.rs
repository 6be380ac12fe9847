// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod schema;
mod loader;
mod validate;

pub use schema::*;
pub use loader::{expand_path, load_capability_file, load_file, load_layers, Format};
pub use validate::{
    check_unique_ids, validate, ConfigError, PRESERVE_RECENT_RANGE, SLIDING_WINDOW_RANGE,
    SUMMARY_RATIO_RANGE,
};
