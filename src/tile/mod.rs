//! Tile identity types.
//!
//! Provides the [`TileKey`] type used as the cache key and as the dictionary
//! key for in-flight request bookkeeping everywhere in the crate.

mod key;

pub use key::TileKey;
