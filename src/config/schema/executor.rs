use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Blocking tool calls allowed in flight at once across all streaming runs.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Capacity of the per-run event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// User id the trust model is consulted for when the caller names none.
    #[serde(default = "default_user_id")]
    pub default_user_id: String,
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_event_buffer() -> usize {
    64
}

fn default_user_id() -> String {
    "default".into()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            event_buffer: default_event_buffer(),
            default_user_id: default_user_id(),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            anyhow::bail!("executor.worker_pool_size must be >= 1");
        }
        if self.event_buffer == 0 {
            anyhow::bail!("executor.event_buffer must be >= 1");
        }
        Ok(())
    }
}
