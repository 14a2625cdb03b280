use std::time::Duration;

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Caller-supplied knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long the API may hold a wait request when an operation waits
    /// on the caller's behalf (create, start, stop, destroy).
    pub default_wait_timeout: Duration,
    /// Upper bound on in-flight machines during a batch. `None` runs every
    /// member at once.
    pub max_concurrency: Option<usize>,
}

impl OrchestratorConfig {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = timeout;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout: DEFAULT_WAIT_TIMEOUT,
            max_concurrency: None,
        }
    }
}
