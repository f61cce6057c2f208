//! Cache filename construction and parsing.
//!
//! Tile files are stored flat in the cache directory as
//! `{provider}-{map_id}-{level}-{column}-{row}.{format}`, so a directory
//! listing alone is enough to rebuild the disk index after a crash.

use crate::tile::TileKey;
use std::path::{Path, PathBuf};

/// Bare filename for a tile in the given encoded format.
///
/// # Example
///
/// ```
/// use tilekeeper::cache::tile_filename;
/// use tilekeeper::tile::TileKey;
///
/// let key = TileKey::new("osm", 1, 5, 3, 4);
/// assert_eq!(tile_filename(&key, "png"), "osm-1-5-3-4.png");
/// ```
pub fn tile_filename(key: &TileKey, format: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}.{}",
        key.provider(),
        key.map_id(),
        key.level(),
        key.column(),
        key.row(),
        format
    )
}

/// Full path for a tile file inside `directory`.
pub fn tile_path(directory: &Path, key: &TileKey, format: &str) -> PathBuf {
    directory.join(tile_filename(key, format))
}

/// Parse a bare cache filename back into a tile key and format.
///
/// Returns `None` for anything that is not a tile file: the name must split
/// into exactly one name part and one extension, and the name part into a
/// provider followed by exactly four dash-delimited integers.
pub fn parse_tile_filename(filename: &str) -> Option<(TileKey, String)> {
    let mut dot_parts = filename.split('.');
    let name = dot_parts.next()?;
    let format = dot_parts.next()?;
    if dot_parts.next().is_some() || format.is_empty() {
        return None;
    }

    let fields: Vec<&str> = name.split('-').collect();
    if fields.len() != 5 {
        return None;
    }
    let map_id: u32 = fields[1].parse().ok()?;
    let level: u8 = fields[2].parse().ok()?;
    let column: u32 = fields[3].parse().ok()?;
    let row: u32 = fields[4].parse().ok()?;

    Some((
        TileKey::new(fields[0], map_id, level, column, row),
        format.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_round_trip() {
        let key = TileKey::new("osm", 1, 5, 3, 4);
        let filename = tile_filename(&key, "jpg");
        assert_eq!(filename, "osm-1-5-3-4.jpg");
        let (parsed, format) = parse_tile_filename(&filename).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(format, "jpg");
    }

    #[test]
    fn test_tile_path_joins_directory() {
        let key = TileKey::new("osm", 1, 5, 3, 4);
        let path = tile_path(Path::new("/cache"), &key, "png");
        assert_eq!(path, PathBuf::from("/cache/osm-1-5-3-4.png"));
    }

    #[test]
    fn test_parse_rejects_non_tile_names() {
        // wrong field count
        assert!(parse_tile_filename("osm-1-5-3.png").is_none());
        assert!(parse_tile_filename("osm-1-5-3-4-9.png").is_none());
        // non-numeric fields
        assert!(parse_tile_filename("osm-a-5-3-4.png").is_none());
        // missing or doubled extension
        assert!(parse_tile_filename("osm-1-5-3-4").is_none());
        assert!(parse_tile_filename("osm-1-5-3-4.png.bak").is_none());
        // manifest files must not parse as tiles
        assert!(parse_tile_filename("queue1").is_none());
    }

    #[test]
    fn test_parse_rejects_out_of_range_numbers() {
        // level is u8
        assert!(parse_tile_filename("osm-1-300-3-4.png").is_none());
    }
}
