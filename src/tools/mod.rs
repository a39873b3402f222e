pub mod dry_run;
pub mod registry;
pub mod traits;
pub mod types;

pub use dry_run::DryRunTool;
pub use registry::ToolRegistry;
pub use traits::Tool;
pub use types::{ToolOutcome, ToolParameter, ToolParams, ToolSpec};
