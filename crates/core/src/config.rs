//! Configuration types shared across crates.

use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RECORD_BYTES, Error, RECORD_OVERHEAD_MARGIN};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Chunking and I/O behaviour of the vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Characters of base64 text per chunk record.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Per-record size ceiling of the target store.
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,
    /// Maximum chunk writes in flight for one store operation.
    #[serde(default = "default_max_parallel_writes")]
    pub max_parallel_writes: u32,
    /// Documents reconstructed concurrently by batch operations.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: u32,
    /// Optional bound on a single reconstruct call, in seconds.
    #[serde(default)]
    pub reconstruct_timeout_secs: Option<u64>,
    /// Directory used by local downloads when none is given.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}

fn default_max_parallel_writes() -> u32 {
    16
}

fn default_batch_concurrency() -> u32 {
    4
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_record_bytes: default_max_record_bytes(),
            max_parallel_writes: default_max_parallel_writes(),
            batch_concurrency: default_batch_concurrency(),
            reconstruct_timeout_secs: None,
            download_dir: default_download_dir(),
        }
    }
}

impl VaultConfig {
    /// Largest chunk size that still fits a record with its other fields.
    pub fn max_chunk_size(&self) -> usize {
        self.max_record_bytes.saturating_sub(RECORD_OVERHEAD_MARGIN)
    }

    /// Validate chunking invariants.
    pub fn validate(&self) -> crate::Result<()> {
        let max = self.max_chunk_size();
        if self.chunk_size == 0 || self.chunk_size > max {
            return Err(Error::InvalidChunkSize {
                size: self.chunk_size,
                max,
            });
        }
        if self.max_parallel_writes == 0 {
            return Err(Error::Config(
                "vault.max_parallel_writes must be at least 1".to_string(),
            ));
        }
        if self.batch_concurrency == 0 {
            return Err(Error::Config(
                "vault.batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.reconstruct_timeout_secs == Some(0) {
            return Err(Error::Config(
                "vault.reconstruct_timeout_secs must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Reconstruct timeout as a Duration, if configured.
    pub fn reconstruct_timeout(&self) -> Option<Duration> {
        self.reconstruct_timeout_secs.map(Duration::from_secs)
    }
}

/// Record store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local store; contents are lost on exit.
    Memory,
    /// SQLite database file.
    Sqlite {
        /// Database file path (`:memory:` for an in-process database).
        path: PathBuf,
    },
    /// One JSON file per record under a root directory.
    Filesystem {
        /// Root directory.
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/docvault.db"),
        }
    }
}

impl StoreConfig {
    /// Validate store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Sqlite { path } | StoreConfig::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    Err("store.path cannot be empty".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Short human-readable description, e.g. `sqlite:./data/docvault.db`.
    pub fn describe(&self) -> String {
        match self {
            StoreConfig::Memory => "memory".to_string(),
            StoreConfig::Sqlite { path } => format!("sqlite:{}", path.display()),
            StoreConfig::Filesystem { path } => format!("filesystem:{}", path.display()),
        }
    }
}

/// Reconstructed-document cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the cache (default: true).
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Maximum number of cached documents.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Entry time-to-live in seconds (default: 300).
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    64
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Orphaned chunk sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Minimum age in seconds before chunks without metadata are deleted.
    #[serde(default = "default_sweep_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Report what would be deleted without deleting (default: false).
    #[serde(default)]
    pub dry_run: bool,
}

fn default_sweep_grace_period_secs() -> u64 {
    3600
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_sweep_grace_period_secs(),
            dry_run: false,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Create a test configuration backed by the in-memory store.
    pub fn for_testing() -> Self {
        Self {
            store: StoreConfig::Memory,
            ..Self::default()
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> crate::Result<()> {
        self.vault.validate()?;
        self.store.validate().map_err(Error::Config)?;
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(Error::Config(
                "cache.capacity must be at least 1 when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.vault.chunk_size, 800 * 1024);
        assert_eq!(config.vault.max_record_bytes, 1024 * 1024);
    }

    #[test]
    fn test_chunk_size_must_leave_headroom() {
        let config = VaultConfig {
            chunk_size: DEFAULT_MAX_RECORD_BYTES,
            ..VaultConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidChunkSize { .. })
        ));

        let config = VaultConfig {
            chunk_size: 0,
            ..VaultConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_tagged_deserialize() {
        let json = r#"{"type":"filesystem","path":"/var/lib/docvault"}"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();
        match config {
            StoreConfig::Filesystem { path } => {
                assert_eq!(path, PathBuf::from("/var/lib/docvault"));
            }
            _ => panic!("expected filesystem config"),
        }

        let config: StoreConfig = serde_json::from_str(r#"{"type":"memory"}"#).unwrap();
        assert!(matches!(config, StoreConfig::Memory));
    }

    #[test]
    fn test_store_config_rejects_empty_path() {
        let config = StoreConfig::Sqlite {
            path: PathBuf::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sections_default_when_missing() {
        let config: AppConfig =
            serde_json::from_str(r#"{"vault":{"chunk_size":1024}}"#).unwrap();
        assert_eq!(config.vault.chunk_size, 1024);
        assert_eq!(config.vault.max_parallel_writes, 16);
        assert!(config.cache.enabled);
        assert_eq!(config.sweep.grace_period_secs, 3600);
        assert!(matches!(config.store, StoreConfig::Sqlite { .. }));
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let mut config = AppConfig::for_testing();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }
}
