//! Pool configuration.

/// Configuration for an [`crate::InMemoryPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of live object bytes (`None` = unlimited).
    pub capacity: Option<usize>,

    /// Whether writes to pre-existing objects must be covered by a snapshot.
    pub enforce_snapshots: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            enforce_snapshots: true,
        }
    }
}

impl PoolConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity limit in bytes.
    #[must_use]
    pub const fn capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Sets whether unlogged writes are rejected.
    #[must_use]
    pub const fn enforce_snapshots(mut self, value: bool) -> Self {
        self.enforce_snapshots = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PoolConfig::default();
        assert!(config.capacity.is_none());
        assert!(config.enforce_snapshots);
    }

    #[test]
    fn builder_pattern() {
        let config = PoolConfig::new().capacity(4096).enforce_snapshots(false);
        assert_eq!(config.capacity, Some(4096));
        assert!(!config.enforce_snapshots);
    }
}
