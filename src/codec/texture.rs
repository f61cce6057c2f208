//! Decoded tile texture value.

use crate::tile::TileKey;
use image::RgbaImage;

/// A decoded tile image, ready for upload by the rendering layer.
///
/// Shared between the texture cache tier and consumers through `Arc`, so a
/// texture evicted from the cache stays valid for any viewport still holding
/// it.
#[derive(Debug, Clone)]
pub struct TileTexture {
    key: TileKey,
    image: RgbaImage,
}

impl TileTexture {
    /// Create a texture for `key` from a decoded image.
    pub fn new(key: TileKey, image: RgbaImage) -> Self {
        Self { key, image }
    }

    /// The tile this texture belongs to.
    pub fn key(&self) -> &TileKey {
        &self.key
    }

    /// The decoded RGBA image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Byte size of the decoded pixels (width × height × 4).
    pub fn byte_size(&self) -> u64 {
        u64::from(self.image.width()) * u64::from(self.image.height()) * 4
    }
}
