use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("STEPGATE_LOG")
            && !level.is_empty()
        {
            self.log_level = level;
        }

        if let Ok(limit) = std::env::var("STEPGATE_MAX_ACTIONS_PER_MINUTE")
            && let Ok(limit) = limit.parse::<u32>()
            && limit > 0
        {
            self.guardrails.max_actions_per_minute = limit;
        }

        if let Ok(size) = std::env::var("STEPGATE_WORKER_POOL_SIZE")
            && let Ok(size) = size.parse::<usize>()
            && size > 0
        {
            self.executor.worker_pool_size = size;
        }

        if let Ok(backend) = std::env::var("STEPGATE_OBSERVER")
            && !backend.is_empty()
        {
            self.observability.backend = backend;
        }
    }
}
