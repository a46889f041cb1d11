//! Map configuration.

/// Default maximum key size (64 KiB).
pub const DEFAULT_MAX_KEY_SIZE: usize = 64 * 1024;

/// Configuration for creating or opening a [`crate::RadixTreeMap`].
#[derive(Debug, Clone)]
pub struct TrieConfig {
    /// Keys longer than this are rejected before any transaction is opened.
    pub max_key_size: usize,

    /// Whether mutating calls through one map handle are serialized.
    pub writer_lock: bool,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            writer_lock: true,
        }
    }
}

impl TrieConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum key size in bytes.
    #[must_use]
    pub const fn max_key_size(mut self, size: usize) -> Self {
        self.max_key_size = size;
        self
    }

    /// Sets whether the per-handle writer lock is taken.
    #[must_use]
    pub const fn writer_lock(mut self, value: bool) -> Self {
        self.writer_lock = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TrieConfig::default();
        assert_eq!(config.max_key_size, DEFAULT_MAX_KEY_SIZE);
        assert!(config.writer_lock);
    }

    #[test]
    fn builder_pattern() {
        let config = TrieConfig::new().max_key_size(16).writer_lock(false);
        assert_eq!(config.max_key_size, 16);
        assert!(!config.writer_lock);
    }
}
