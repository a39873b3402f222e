use super::traits::Tool;
use super::types::{ToolOutcome, ToolParameter, ToolParams};
use serde_json::json;

/// Stand-in that reports what it would have done instead of doing it.
///
/// Used by the CLI so plans can be walked end to end without wiring real
/// integrations.
pub struct DryRunTool {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
}

impl DryRunTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ToolParameter>) -> Self {
        self.parameters = parameters;
        self
    }
}

impl Tool for DryRunTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        self.parameters.clone()
    }

    fn execute(&self, params: &ToolParams) -> anyhow::Result<ToolOutcome> {
        tracing::info!(tool = %self.name, "dry run");
        Ok(ToolOutcome::ok(json!({
            "dry_run": true,
            "action": self.name,
            "parameters": params,
        })))
    }
}
