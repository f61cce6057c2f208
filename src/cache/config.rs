//! Tile cache configuration.

use std::path::PathBuf;

const MEBI: u64 = 1024 * 1024;

/// Default disk-index budget (path-string bytes, see `TileCache`).
pub const DEFAULT_MAX_DISK_USAGE: u64 = 20 * MEBI;
/// Default encoded-bytes budget.
pub const DEFAULT_MAX_MEMORY_USAGE: u64 = 3 * MEBI;
/// Default extra texture budget on top of the reserved minimum.
pub const DEFAULT_EXTRA_TEXTURE_USAGE: u64 = 6 * MEBI;

/// Configuration for [`TileCache`](crate::cache::TileCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache root directory holding tile files and queue manifests.
    pub directory: PathBuf,
    /// Disk-index tier budget.
    pub max_disk_usage: u64,
    /// Encoded-bytes tier budget.
    pub max_memory_usage: u64,
    /// Texture budget added on top of `min_texture_usage`.
    pub extra_texture_usage: u64,
    /// Reserved texture amount; the texture tier cap is `min + extra`.
    pub min_texture_usage: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let directory = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tilekeeper");
        Self {
            directory,
            max_disk_usage: DEFAULT_MAX_DISK_USAGE,
            max_memory_usage: DEFAULT_MAX_MEMORY_USAGE,
            extra_texture_usage: DEFAULT_EXTRA_TEXTURE_USAGE,
            min_texture_usage: 0,
        }
    }
}

impl CacheConfig {
    /// Configuration with defaults rooted at `directory`.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }
}
