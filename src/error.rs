use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `stepgate`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; tool implementations and ad-hoc paths
/// continue to use `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum Error {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Plan / Executor ─────────────────────────────────────────────────
    #[error("plan: {0}")]
    Plan(#[from] PlanError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    // ── Plan persistence ────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Plan errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PlanError {
    /// Pre-execution validation failures, collected before any step runs.
    #[error("plan validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("step {step_id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        step_id: String,
        from: String,
        to: String,
    },

    #[error("plan {plan_id}: illegal transition {from} -> {to}")]
    InvalidPlanTransition {
        plan_id: String,
        from: String,
        to: String,
    },

    #[error("plan {plan_id} is not waiting for a confirmation")]
    NotWaiting { plan_id: String },

    #[error("plan {plan_id} cannot be started from status {status}")]
    NotStartable { plan_id: String, status: String },

    #[error("plan could not be parsed: {0}")]
    Parse(String),
}

// ─── Tool errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {name} not found")]
    NotFound { name: String },

    #[error("tool {name} rejected parameters: {message}")]
    InvalidParams { name: String, message: String },

    #[error("tool {name} execution failed: {message}")]
    Execution { name: String, message: String },
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot for plan {0} not found")]
    NotFound(String),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;
