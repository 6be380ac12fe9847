// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod catalog;
mod error;
mod registry;
mod tool;

pub mod loader;
pub mod process;
pub mod remote;

pub use catalog::FunctionCatalog;
pub use error::CapabilityError;
pub use loader::{CapabilityHandle, CapabilityLoader, LoadOutcome, LoadedCapability};
pub use process::{
    filter_tools, RmcpLauncher, ServerConnection, ServerEndpoint, ServerLauncher, ServerTool, SharedConnection,
};
pub use registry::ToolRegistry;
pub use remote::RemoteAgentClient;
pub use tool::{Tool, ToolCall, ToolOutput};
