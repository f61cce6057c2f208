//! Image decoding abstraction.
//!
//! The cache never decodes tile bytes itself; it goes through the
//! [`ImageCodec`] trait so the concrete decoder can be swapped out (or mocked
//! in tests). [`RasterCodec`] is the default implementation, backed by the
//! `image` crate, and tolerates arbitrary byte content: a malformed payload
//! is a [`CodecError`], never a panic.

mod raster;
mod texture;

pub use raster::RasterCodec;
pub use texture::TileTexture;

use thiserror::Error;

/// Errors produced while decoding tile bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The byte content could not be decoded as a raster image.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The payload was empty.
    #[error("empty tile payload")]
    Empty,
}

/// Decodes encoded tile bytes into RGBA images.
///
/// Implementors must report decode failures as errors rather than panicking,
/// whatever the byte content.
pub trait ImageCodec: Send + Sync {
    /// Decode `bytes` into an RGBA image.
    fn decode(&self, bytes: &[u8]) -> Result<image::RgbaImage, CodecError>;

    /// Byte size of a decoded image (used as the texture-tier cost).
    fn image_byte_size(&self, image: &image::RgbaImage) -> u64 {
        u64::from(image.width()) * u64::from(image.height()) * 4
    }
}
