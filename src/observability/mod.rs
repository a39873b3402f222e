pub mod log;
pub mod noop;
pub mod traits;

pub use self::log::LogObserver;
pub use noop::NoopObserver;
pub use traits::{Observer, ObserverEvent, ObserverMetric};

use crate::config::ObservabilityConfig;
use std::sync::Arc;

/// Observer for the configured backend. Unknown names degrade to [`NoopObserver`].
pub fn create_observer(config: &ObservabilityConfig) -> Arc<dyn Observer> {
    let backend = config.backend.trim().to_ascii_lowercase();
    if backend == "log" {
        return Arc::new(LogObserver::new());
    }
    if !matches!(backend.as_str(), "none" | "noop" | "") {
        tracing::warn!(backend = %config.backend, "unknown observer backend; events will be dropped");
    }
    Arc::new(NoopObserver)
}
