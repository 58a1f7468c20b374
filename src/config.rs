//! Storage configuration
//!
//! Read from the environment, with defaults suitable for local use.

use tracing::warn;

/// Configuration for on-disk containers
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// zstd level used when writing a container back to disk
    pub compression_level: i32,
    /// Write through a temporary sibling file and rename over the target
    pub atomic_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            atomic_writes: true,
        }
    }
}

impl StorageConfig {
    /// Build from `H5_COMPRESSION_LEVEL` and `H5_ATOMIC_WRITES`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("H5_COMPRESSION_LEVEL") {
            match level.parse::<i32>() {
                Ok(l) if (1..=22).contains(&l) => config.compression_level = l,
                _ => warn!("Ignoring invalid H5_COMPRESSION_LEVEL={}", level),
            }
        }

        if let Ok(atomic) = std::env::var("H5_ATOMIC_WRITES") {
            config.atomic_writes = !matches!(atomic.as_str(), "0" | "false" | "no");
        }

        config
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level.clamp(1, 22);
        self
    }
}
