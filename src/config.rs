//! Engine configuration.

use std::time::Duration;

use crate::kernel::Kernel;

/// Spawned workers used when nothing else is asked for. The caller computes
/// one more partition itself, giving 4-way parallelism.
pub const DEFAULT_WORKERS: usize = 3;

/// Upper bound on spawned workers accepted by either engine.
pub const MAX_WORKERS: usize = 1024;

/// Settings shared by the thread and process engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of spawned workers, not counting the caller.
    pub workers: usize,
    /// Upper bound on waiting for workers. `None` waits forever.
    pub timeout: Option<Duration>,
    pub kernel: Kernel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout: None,
            kernel: Kernel::Standard,
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_split() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.timeout, None);
        assert_eq!(cfg.kernel, Kernel::Standard);
    }

    #[test]
    fn test_builder() {
        let cfg = EngineConfig::default()
            .with_workers(7)
            .with_timeout(Duration::from_millis(250))
            .with_kernel(Kernel::Transposed);
        assert_eq!(cfg.workers, 7);
        assert_eq!(cfg.timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.kernel, Kernel::Transposed);
    }
}
