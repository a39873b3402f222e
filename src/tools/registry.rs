use super::traits::Tool;
use super::types::{ToolOutcome, ToolParams, ToolSpec};
use crate::error::ToolError;
use std::collections::HashMap;
use std::any::Any;
use std::fmt::Write as _;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Central registry for tool instances.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let tool: Arc<dyn Tool> = Arc::from(tool);
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Return specs for all registered tools, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Check `params` against the tool's declared parameters.
    ///
    /// Returns a human-readable problem, or `None` when the call is well formed.
    pub fn validate_params(&self, name: &str, params: &ToolParams) -> Option<String> {
        let Some(tool) = self.tools.get(name) else {
            return Some(format!("unknown tool '{name}'"));
        };
        let missing: Vec<String> = tool
            .parameters()
            .into_iter()
            .filter(|p| p.required && params.get(&p.name).is_none_or(serde_json::Value::is_null))
            .map(|p| p.name)
            .collect();
        if missing.is_empty() {
            None
        } else {
            Some(
                ToolError::InvalidParams {
                    name: name.to_string(),
                    message: format!("missing required parameter(s): {}", missing.join(", ")),
                }
                .to_string(),
            )
        }
    }

    /// Tool listing handed to a plan drafter.
    pub fn format_for_prompt(&self) -> String {
        let mut out = String::from("Available tools:\n");
        for spec in self.specs() {
            let _ = writeln!(out, "- {}: {}", spec.name, spec.description);
            for param in &spec.parameters {
                let marker = if param.required { "required" } else { "optional" };
                let _ = writeln!(out, "    - {} ({marker}): {}", param.name, param.description);
            }
        }
        out
    }

    /// Invoke a tool by name. An unknown name yields a failed outcome rather
    /// than an error so callers treat it like any other tool failure.
    pub fn invoke(&self, name: &str, params: &ToolParams) -> anyhow::Result<ToolOutcome> {
        let Some(tool) = self.tools.get(name) else {
            return Ok(ToolOutcome::failure(
                ToolError::NotFound {
                    name: name.to_string(),
                }
                .to_string(),
            ));
        };
        // A panicking tool fails its call like any other error.
        let result = catch_unwind(AssertUnwindSafe(|| tool.execute(params))).unwrap_or_else(|payload| {
            Err(anyhow::anyhow!("tool panicked: {}", panic_message(&*payload)))
        });
        result.map_err(|e| {
            ToolError::Execution {
                name: name.to_string(),
                message: format!("{e:#}"),
            }
            .into()
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
