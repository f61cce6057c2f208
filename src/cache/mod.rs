//! Tile caching.
//!
//! The cache is built from a generic segmented eviction queue and a tiered
//! tile store layered on top of it:
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!   get(key) ──────► │  texture tier (decoded RGBA)│ ──► Arc<TileTexture>
//!                    ├─────────────────────────────┤
//!        miss ─────► │  memory tier (encoded bytes)│ ──► decode + promote
//!                    ├─────────────────────────────┤
//!        miss ─────► │  disk tier (tile files)     │ ──► read + decode
//!                    └─────────────────────────────┘
//!                       queue1..queue4 manifests
//! ```
//!
//! [`Cache3Q`] is the segmented queue: entries start as newbies, earn their
//! way into the regulars on repeated hits, and popular entries are spared
//! into a hobos queue instead of being evicted outright. Evicted keys leave
//! a ghost tombstone behind so a returning tile can skip the probation.
//!
//! [`TileCache`] composes three independent `Cache3Q` tiers and persists the
//! disk tier's queue membership across restarts.

mod config;
mod path;
mod queue3;
mod tile_cache;

pub use config::{
    CacheConfig, DEFAULT_EXTRA_TEXTURE_USAGE, DEFAULT_MAX_DISK_USAGE, DEFAULT_MAX_MEMORY_USAGE,
};
pub use path::{parse_tile_filename, tile_filename, tile_path};
pub use queue3::{Cache3Q, EvictionHandler, NoEviction, Segment};
pub use tile_cache::{CacheError, CacheErrorHandler, DiskTile, MemoryTile, TileCache};
