// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model-side building blocks: message types, the provider and runtime
//! seams, and the adapters that turn a provider string plus parameters into
//! a loaded model.

mod error;
mod mock;
mod provider;
mod runtime;
mod types;

pub mod adapter;
pub mod credentials;
pub mod registry;
pub mod sanitize;

pub use adapter::{
    parse_provider_string, Adapter, AdapterRegistry, BedrockAdapter, GenericAdapter, LiteLlmAdapter,
    OllamaAdapter, PreparedConversation, Selection,
};
pub use credentials::{CredentialResolver, ProfileStore};
pub use error::AdapterError;
pub use mock::{MockProvider, MockRuntime, ScriptedMockProvider};
pub use provider::{collect_text, ModelProvider, ResponseStream};
pub use registry::{adapter_meta, list_adapters, AdapterMeta, DEFAULT_FRAMEWORK};
pub use runtime::{ModelRuntime, ModelSpec};
pub use types::*;
