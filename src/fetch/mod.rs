//! Tile fetching.
//!
//! [`TileFetcher`] is the network collaborator of the request coordinator:
//! one call per outstanding tile, cancellable through a token. The crate
//! ships an HTTP implementation ([`HttpTileFetcher`]); tests and embedders
//! can provide their own.

mod http;

pub use http::HttpTileFetcher;

use crate::tile::TileKey;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors produced by a tile fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the transfer broke off.
    #[error("request failed: {0}")]
    Http(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The server answered with an empty body.
    #[error("empty response body")]
    Empty,

    /// The fetch was cancelled before completing.
    #[error("fetch cancelled")]
    Cancelled,
}

/// A successfully fetched tile payload.
#[derive(Debug, Clone)]
pub struct FetchedTile {
    /// Encoded image bytes.
    pub bytes: Bytes,
    /// Encoded format name ("png", "jpg", ...).
    pub format: String,
}

/// Network collaborator fetching encoded tile bytes.
///
/// The coordinator invokes `fetch` at most once per outstanding tile and
/// cancels it through the token when no viewport remains interested. A
/// cancelled fetch should resolve to [`FetchError::Cancelled`] promptly; if
/// it completes anyway the result is discarded by the caller.
pub trait TileFetcher: Send + Sync {
    /// Fetch the encoded bytes for `key`.
    fn fetch(
        &self,
        key: &TileKey,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedTile, FetchError>> + Send>>;
}
