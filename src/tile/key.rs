//! Tile key type.

use std::fmt;

/// Identity of one map tile.
///
/// A tile is one cell of a power-of-two subdivision of the map at a given
/// zoom level, served by a named provider. Equality is structural and the
/// type is hashable, so it can key the caches and the coordinator's
/// bookkeeping maps directly.
///
/// # Example
///
/// ```
/// use tilekeeper::tile::TileKey;
///
/// let key = TileKey::new("osm", 1, 5, 3, 4);
/// assert_eq!(key.level(), 5);
/// assert_eq!(key.to_string(), "osm-1-5-3-4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Provider name (e.g., "osm")
    provider: String,
    /// Map identifier within the provider
    map_id: u32,
    /// Zoom level
    level: u8,
    /// Tile column (X coordinate in the tile matrix)
    column: u32,
    /// Tile row (Y coordinate in the tile matrix)
    row: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(provider: impl Into<String>, map_id: u32, level: u8, column: u32, row: u32) -> Self {
        Self {
            provider: provider.into(),
            map_id,
            level,
            column,
            row,
        }
    }

    /// Get the provider name.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Get the map identifier.
    pub fn map_id(&self) -> u32 {
        self.map_id
    }

    /// Get the zoom level.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Get the tile column.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Get the tile row.
    pub fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.provider, self.map_id, self.level, self.column, self.row
        )
    }
}
