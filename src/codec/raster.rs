//! Default image codec backed by the `image` crate.

use super::{CodecError, ImageCodec};
use image::RgbaImage;

/// Decoder for the raster formats tile providers actually serve (PNG, JPEG).
///
/// Format detection is done by content sniffing, so the caller does not need
/// to trust the file extension.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterCodec;

impl RasterCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }
        image::load_from_memory(bytes)
            .map(|image| image.to_rgba8())
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}
