// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Static table of in-process functions, addressed as `module` + `function`.
//!
//! Function sources never import code at runtime: the host registers every
//! callable up front and a source only selects from this table.

use std::collections::BTreeMap;
use std::sync::Arc;

use forge_config::FunctionSource;

use crate::{CapabilityError, Tool};

#[derive(Clone, Default)]
pub struct FunctionCatalog {
    modules: BTreeMap<String, BTreeMap<String, Arc<dyn Tool>>>,
}

impl FunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `tool` to `module` under its own name.
    pub fn register(&mut self, module: impl Into<String>, tool: Arc<dyn Tool>) -> &mut Self {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(tool.name().to_string(), tool);
        self
    }

    pub fn with(mut self, module: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        self.register(module, tool);
        self
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Resolve the functions a source asks for.
    ///
    /// An empty `functions` list selects the whole module in name order.
    /// Any unknown name fails the source; nothing is partially resolved.
    pub fn resolve(&self, source: &FunctionSource) -> Result<Vec<Arc<dyn Tool>>, CapabilityError> {
        let module = source.module.trim();
        if module.is_empty() {
            return Err(CapabilityError::MissingModule);
        }
        let entries = self
            .modules
            .get(module)
            .ok_or_else(|| CapabilityError::UnknownModule { module: module.to_string() })?;

        if source.functions.is_empty() {
            return Ok(entries.values().cloned().collect());
        }
        source
            .functions
            .iter()
            .map(|name| {
                entries.get(name).cloned().ok_or_else(|| CapabilityError::UnknownFunction {
                    module: module.to_string(),
                    function: name.clone(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for FunctionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (module, entries) in &self.modules {
            map.entry(module, &entries.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::{ToolCall, ToolOutput};

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test function"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, self.0)
        }
    }

    fn catalog() -> FunctionCatalog {
        FunctionCatalog::new()
            .with("math", Arc::new(Named("add")))
            .with("math", Arc::new(Named("mul")))
            .with("text", Arc::new(Named("upper")))
    }

    fn source(module: &str, functions: &[&str]) -> FunctionSource {
        FunctionSource {
            module: module.into(),
            functions: functions.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn empty_selection_takes_whole_module() {
        let tools = catalog().resolve(&source("math", &[])).unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["add", "mul"]);
    }

    #[test]
    fn named_selection_keeps_requested_order() {
        let tools = catalog().resolve(&source("math", &["mul", "add"])).unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["mul", "add"]);
    }

    #[test]
    fn unresolved_symbols_fail() {
        let cat = catalog();
        assert_eq!(cat.resolve(&source("  ", &[])).err(), Some(CapabilityError::MissingModule));
        assert!(matches!(
            cat.resolve(&source("io", &[])),
            Err(CapabilityError::UnknownModule { .. })
        ));
        assert_eq!(
            cat.resolve(&source("math", &["add", "div"])).err(),
            Some(CapabilityError::UnknownFunction { module: "math".into(), function: "div".into() })
        );
    }
}
