use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a statement waits on a locked database before failing (default: 5s).
    pub busy_timeout: Duration,
    /// Enforce the observation -> metric and dimension -> observation
    /// references (default: true).
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }
}
