//! Tiered tile cache.
//!
//! Three independent [`Cache3Q`] instances back the cache: a decoded-texture
//! tier, an encoded-bytes tier and a disk-index tier whose entries point at
//! tile files in the cache directory. Lookups fall through the tiers in that
//! order, promoting on the way back up. The disk tier's queue membership is
//! persisted across restarts via the `queue1..queue4` manifest files.
//!
//! The cache never triggers a network fetch itself; absence is always a
//! normal miss.

use crate::cache::config::CacheConfig;
use crate::cache::path::{parse_tile_filename, tile_path};
use crate::cache::queue3::{Cache3Q, EvictionHandler, Segment};
use crate::codec::{ImageCodec, RasterCodec, TileTexture};
use crate::tile::TileKey;
use bytes::Bytes;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from tile cache construction.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error while preparing the cache directory.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Callback invoked for per-tile cache errors (decode or read failures).
pub type CacheErrorHandler = Box<dyn FnMut(&TileKey, &str) + Send>;

/// Encoded tile bytes held by the memory tier.
#[derive(Debug, Clone)]
pub struct MemoryTile {
    key: TileKey,
    bytes: Bytes,
    format: String,
}

impl MemoryTile {
    /// The tile these bytes encode.
    pub fn key(&self) -> &TileKey {
        &self.key
    }

    /// The encoded payload.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Encoded format name ("png", "jpg", ...).
    pub fn format(&self) -> &str {
        &self.format
    }
}

/// Disk-index tier entry pointing at a tile file in the cache directory.
#[derive(Debug, Clone)]
pub struct DiskTile {
    key: TileKey,
    path: PathBuf,
    format: String,
}

impl DiskTile {
    /// The tile the file encodes.
    pub fn key(&self) -> &TileKey {
        &self.key
    }

    /// Full path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoded format name, taken from the file extension.
    pub fn format(&self) -> &str {
        &self.format
    }
}

/// Disk-tier eviction hooks.
///
/// A genuine eviction deletes the backing file; an orderly removal (shutdown,
/// clear before manifest rewrite) leaves it for the next session.
struct DiskEviction;

impl EvictionHandler<TileKey, Arc<DiskTile>> for DiskEviction {
    fn on_evicted(&mut self, key: &TileKey, value: &Arc<DiskTile>) {
        debug!(%key, path = %value.path.display(), "evicting tile file from disk");
        if let Err(e) = fs::remove_file(&value.path) {
            warn!(%key, error = %e, "failed to delete evicted tile file");
        }
    }
}

/// Multi-tier cache for map tiles with on-disk persistence.
///
/// Default budgets: texture tier `min + 6 MiB`, encoded-bytes tier 3 MiB,
/// disk-index tier 20 MiB. The disk tier's cost unit is the byte length of
/// the file's path string, not the file size - a quirk inherited from the
/// origin design, kept until the eviction economics are reconsidered.
pub struct TileCache {
    directory: PathBuf,
    texture_cache: Cache3Q<TileKey, Arc<TileTexture>>,
    memory_cache: Cache3Q<TileKey, Arc<MemoryTile>>,
    disk_cache: Cache3Q<TileKey, Arc<DiskTile>, DiskEviction>,
    codec: Arc<dyn ImageCodec>,
    min_texture_usage: u64,
    extra_texture_usage: u64,
    on_error: Option<CacheErrorHandler>,
}

impl TileCache {
    /// Open (or create) a tile cache with the default raster codec.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        Self::with_codec(config, Arc::new(RasterCodec::new()))
    }

    /// Open (or create) a tile cache with a custom image codec.
    ///
    /// Creates the cache directory if needed and reloads the disk index from
    /// the queue manifests, reconciling any tile file left unreferenced by a
    /// previous unclean shutdown.
    pub fn with_codec(config: CacheConfig, codec: Arc<dyn ImageCodec>) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.directory)?;

        let mut cache = Self {
            directory: config.directory,
            texture_cache: Cache3Q::new(config.min_texture_usage + config.extra_texture_usage),
            memory_cache: Cache3Q::new(config.max_memory_usage),
            disk_cache: Cache3Q::with_handler(config.max_disk_usage, DiskEviction),
            codec,
            min_texture_usage: config.min_texture_usage,
            extra_texture_usage: config.extra_texture_usage,
            on_error: None,
        };
        cache.load_tiles();
        Ok(cache)
    }

    /// The cache root directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Replace the per-tile error callback (default: log a warning).
    pub fn set_error_handler(&mut self, handler: impl FnMut(&TileKey, &str) + Send + 'static) {
        self.on_error = Some(Box::new(handler));
    }

    /// Look up a decoded texture for `key`.
    ///
    /// Falls through texture, encoded-bytes and disk tiers, decoding and
    /// promoting on the way back up. Decode and read failures are reported
    /// through the error callback and treated as a miss. Never fetches.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<TileTexture>> {
        if let Some(texture) = self.texture_cache.get(key) {
            return Some(texture);
        }

        if let Some(memory_tile) = self.memory_cache.get(key) {
            return match self.codec.decode(memory_tile.bytes()) {
                Ok(image) => Some(self.add_to_texture_cache(key.clone(), image)),
                Err(e) => {
                    self.report_error(key, &format!("problem with tile image: {e}"));
                    None
                }
            };
        }

        if let Some(disk_tile) = self.disk_cache.get(key) {
            let bytes = match fs::read(&disk_tile.path) {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    self.report_error(key, &format!("failed to read tile file: {e}"));
                    return None;
                }
            };
            return match self.codec.decode(&bytes) {
                Ok(image) => {
                    self.add_to_memory_cache(key.clone(), bytes, disk_tile.format.clone());
                    Some(self.add_to_texture_cache(key.clone(), image))
                }
                Err(e) => {
                    self.report_error(key, &format!("problem with tile image: {e}"));
                    None
                }
            };
        }

        None
    }

    /// Register freshly fetched tile bytes.
    ///
    /// Writes the bytes to a file named after the key, registers the file in
    /// the disk tier and the bytes in the memory tier. A write failure is
    /// logged and the cache continues in-memory only.
    ///
    /// Inserts do not hit the texture cache: many tiles arrive after the
    /// viewport has moved on and would act as poison there.
    pub fn insert(&mut self, key: &TileKey, bytes: Bytes, format: &str) {
        if bytes.is_empty() {
            return;
        }

        let path = tile_path(&self.directory, key, format);
        match fs::write(&path, &bytes) {
            Ok(()) => {
                self.add_to_disk_cache(key.clone(), path, format.to_string());
            }
            Err(e) => {
                warn!(%key, error = %e, "failed to write tile file, caching in memory only");
            }
        }

        self.add_to_memory_cache(key.clone(), bytes, format.to_string());
    }

    /// Clear all tiers and delete tile files and manifests on disk.
    pub fn clear_all(&mut self) {
        self.texture_cache.clear();
        self.memory_cache.clear();
        self.disk_cache.clear();

        let Ok(entries) = fs::read_dir(&self.directory) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if parse_tile_filename(name).is_some() || is_queue_manifest(name) {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(file = name, error = %e, "failed to remove cache file");
                }
            }
        }
    }

    /// Write the disk tier's queue membership to the `queue1..queue4`
    /// manifests, one bare filename per line, front-to-back.
    ///
    /// Also runs on drop. Write failures are logged; the cache simply will
    /// not be durable across this restart.
    pub fn persist_index(&self) {
        for (i, segment) in Segment::ALL.iter().enumerate() {
            let manifest = self.queue_path(i + 1);
            let mut contents = String::new();
            for (_, value, _) in self.disk_cache.segment_entries(*segment) {
                let Some(tile) = value else { continue };
                if let Some(name) = tile.path.file_name().and_then(|n| n.to_str()) {
                    contents.push_str(name);
                    contents.push('\n');
                }
            }
            if let Err(e) = fs::write(&manifest, contents) {
                warn!(manifest = %manifest.display(), error = %e, "unable to write tile cache manifest");
            }
        }
    }

    /// Set the disk-index budget (path-string bytes).
    pub fn set_max_disk_usage(&mut self, usage: u64) {
        self.disk_cache.set_max_cost(usage, None, None);
    }

    /// Disk-index budget.
    pub fn max_disk_usage(&self) -> u64 {
        self.disk_cache.max_cost()
    }

    /// Current disk-index usage.
    pub fn disk_usage(&self) -> u64 {
        self.disk_cache.total_cost()
    }

    /// Set the encoded-bytes budget.
    pub fn set_max_memory_usage(&mut self, usage: u64) {
        self.memory_cache.set_max_cost(usage, None, None);
    }

    /// Encoded-bytes budget.
    pub fn max_memory_usage(&self) -> u64 {
        self.memory_cache.max_cost()
    }

    /// Current encoded-bytes usage.
    pub fn memory_usage(&self) -> u64 {
        self.memory_cache.total_cost()
    }

    /// Set the texture budget added on top of the reserved minimum.
    pub fn set_extra_texture_usage(&mut self, usage: u64) {
        self.extra_texture_usage = usage;
        self.texture_cache
            .set_max_cost(self.min_texture_usage + self.extra_texture_usage, None, None);
    }

    /// Set the reserved texture amount; the texture cap is `min + extra`.
    pub fn set_min_texture_usage(&mut self, usage: u64) {
        self.min_texture_usage = usage;
        self.texture_cache
            .set_max_cost(self.min_texture_usage + self.extra_texture_usage, None, None);
    }

    /// Texture-tier budget (`min + extra`).
    pub fn max_texture_usage(&self) -> u64 {
        self.texture_cache.max_cost()
    }

    /// Reserved texture amount.
    pub fn min_texture_usage(&self) -> u64 {
        self.min_texture_usage
    }

    /// Current texture-tier usage.
    pub fn texture_usage(&self) -> u64 {
        self.texture_cache.total_cost()
    }

    /// Log hit/miss statistics for all three tiers at debug level.
    pub fn log_stats(&self) {
        self.texture_cache.log_stats();
        self.memory_cache.log_stats();
        self.disk_cache.log_stats();
    }

    /// Rebuild the disk index from the queue manifests.
    ///
    /// Each manifest line names a tile file; lines whose file vanished or
    /// whose name does not parse are skipped. Restored entries get the
    /// file's current byte size as cost. Any tile file on disk that no
    /// manifest references (previous crash) is registered through the normal
    /// disk-insert path, so no orphaned file stays invisible to the cache.
    fn load_tiles(&mut self) {
        let mut files: HashSet<String> = match fs::read_dir(&self.directory) {
            Ok(entries) => entries
                .flatten()
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect(),
            Err(e) => {
                warn!(directory = %self.directory.display(), error = %e, "cannot list cache directory");
                return;
            }
        };

        for (i, segment) in Segment::ALL.iter().enumerate() {
            let Ok(contents) = fs::read_to_string(self.queue_path(i + 1)) else {
                continue;
            };
            let mut entries = Vec::new();
            for line in contents.lines() {
                let name = line.trim();
                if name.is_empty() || !files.remove(name) {
                    continue;
                }
                let Some((key, format)) = parse_tile_filename(name) else {
                    continue;
                };
                let path = self.directory.join(name);
                let cost = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                debug!(%key, "restoring tile from cache manifest");
                entries.push((
                    key.clone(),
                    Arc::new(DiskTile { key, path, format }),
                    cost,
                ));
            }
            self.disk_cache.restore_segment(*segment, entries);
        }

        // files not referenced by any manifest get pushed into the cache
        // here, in case the manifests were deleted or left out of sync by an
        // unclean shutdown
        for name in files {
            let Some((key, format)) = parse_tile_filename(&name) else {
                continue;
            };
            let path = self.directory.join(&name);
            self.add_to_disk_cache(key, path, format);
        }
    }

    fn add_to_disk_cache(&mut self, key: TileKey, path: PathBuf, format: String) -> Arc<DiskTile> {
        // cost is the path-string length, not the file size (see type docs)
        let cost = path.to_string_lossy().len() as u64;
        let tile = Arc::new(DiskTile {
            key: key.clone(),
            path,
            format,
        });
        self.disk_cache.insert(key, tile.clone(), cost);
        tile
    }

    fn add_to_memory_cache(&mut self, key: TileKey, bytes: Bytes, format: String) -> Arc<MemoryTile> {
        let cost = bytes.len() as u64;
        let tile = Arc::new(MemoryTile {
            key: key.clone(),
            bytes,
            format,
        });
        self.memory_cache.insert(key, tile.clone(), cost);
        tile
    }

    fn add_to_texture_cache(&mut self, key: TileKey, image: image::RgbaImage) -> Arc<TileTexture> {
        let texture = Arc::new(TileTexture::new(key.clone(), image));
        let cost = texture.byte_size();
        self.texture_cache.insert(key, texture.clone(), cost);
        texture
    }

    fn report_error(&mut self, key: &TileKey, message: &str) {
        match &mut self.on_error {
            Some(handler) => handler(key, message),
            None => warn!(%key, message, "tile cache error"),
        }
    }

    fn queue_path(&self, number: usize) -> PathBuf {
        self.directory.join(format!("queue{number}"))
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.persist_index();
    }
}

fn is_queue_manifest(name: &str) -> bool {
    matches!(name, "queue1" | "queue2" | "queue3" | "queue4")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::path::tile_filename;

    fn png_bytes() -> Bytes {
        let image = image::RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        Bytes::from(bytes)
    }

    fn open_cache(directory: &Path) -> TileCache {
        TileCache::new(CacheConfig::with_directory(directory)).unwrap()
    }

    #[test]
    fn test_insert_then_get_decodes_texture() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);

        cache.insert(&key, png_bytes(), "png");
        let texture = cache.get(&key).unwrap();
        assert_eq!(texture.key(), &key);
        assert_eq!(texture.image().width(), 8);
    }

    #[test]
    fn test_insert_does_not_populate_texture_tier() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);

        cache.insert(&key, png_bytes(), "png");
        assert_eq!(cache.texture_usage(), 0);
        assert!(cache.memory_usage() > 0);

        cache.get(&key);
        assert_eq!(cache.texture_usage(), 8 * 8 * 4);
    }

    #[test]
    fn test_insert_writes_tile_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);

        cache.insert(&key, png_bytes(), "png");
        assert!(dir.path().join(tile_filename(&key, "png")).exists());
    }

    #[test]
    fn test_empty_bytes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);

        cache.insert(&key, Bytes::new(), "png");
        assert_eq!(cache.memory_usage(), 0);
        assert_eq!(cache.disk_usage(), 0);
    }

    #[test]
    fn test_disk_cost_is_path_length_not_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);

        let bytes = png_bytes();
        assert_ne!(
            bytes.len() as u64,
            tile_path(dir.path(), &key, "png").to_string_lossy().len() as u64
        );
        cache.insert(&key, bytes, "png");
        assert_eq!(
            cache.disk_usage(),
            tile_path(dir.path(), &key, "png").to_string_lossy().len() as u64
        );
    }

    #[test]
    fn test_decode_failure_is_a_miss_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);

        let reported = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = reported.clone();
        cache.set_error_handler(move |key, message| {
            sink.lock().unwrap().push((key.clone(), message.to_string()));
        });

        cache.insert(&key, Bytes::from_static(b"not an image"), "png");
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.texture_usage(), 0);
        assert_eq!(reported.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_persist_writes_four_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);
        cache.insert(&key, png_bytes(), "png");
        drop(cache);

        for i in 1..=4 {
            assert!(dir.path().join(format!("queue{i}")).exists(), "queue{i}");
        }
        let newbies = fs::read_to_string(dir.path().join("queue1")).unwrap();
        assert_eq!(newbies.trim(), tile_filename(&key, "png"));
    }

    #[test]
    fn test_clear_all_removes_files_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        let key = TileKey::new("osm", 1, 5, 3, 4);
        cache.insert(&key, png_bytes(), "png");
        cache.persist_index();

        cache.clear_all();
        assert!(!dir.path().join(tile_filename(&key, "png")).exists());
        assert!(!dir.path().join("queue1").exists());
        assert_eq!(cache.disk_usage(), 0);
    }

    #[test]
    fn test_texture_budget_is_min_plus_extra() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = open_cache(dir.path());
        cache.set_min_texture_usage(1024);
        cache.set_extra_texture_usage(2048);
        assert_eq!(cache.max_texture_usage(), 3072);
        assert_eq!(cache.min_texture_usage(), 1024);
    }
}
