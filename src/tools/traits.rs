use super::types::{ToolOutcome, ToolParameter, ToolParams, ToolSpec};

/// A capability a plan step can invoke.
///
/// `execute` is blocking. The streaming executor moves each call onto the
/// blocking worker pool, so implementations may do slow I/O directly.
pub trait Tool: Send + Sync {
    /// Tool name (the action name plan steps refer to)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Declared parameters
    fn parameters(&self) -> Vec<ToolParameter> {
        Vec::new()
    }

    /// Execute the tool with given parameters
    fn execute(&self, params: &ToolParams) -> anyhow::Result<ToolOutcome>;

    /// Get the full spec for plan drafting
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
