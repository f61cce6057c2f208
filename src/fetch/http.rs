//! HTTP tile fetcher built on reqwest.

use crate::fetch::{FetchError, FetchedTile, TileFetcher};
use crate::tile::TileKey;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const DEFAULT_USER_AGENT: &str =
    concat!("tilekeeper/", env!("CARGO_PKG_VERSION"));

/// Maps a tile key to its URL on the tile server.
pub type UrlBuilder = Box<dyn Fn(&TileKey) -> String + Send + Sync>;

/// [`TileFetcher`] implementation fetching tiles over HTTP.
///
/// The URL layout is supplied as a closure so one fetcher type serves any
/// slippy-map tile server:
///
/// ```no_run
/// use tilekeeper::fetch::HttpTileFetcher;
///
/// let fetcher = HttpTileFetcher::new(
///     |key| {
///         format!(
///             "https://tile.openstreetmap.org/{}/{}/{}.png",
///             key.level(),
///             key.column(),
///             key.row()
///         )
///     },
///     "png",
/// ).unwrap();
/// ```
///
/// No per-request timeout is set; a stuck transfer is bounded only by the
/// coordinator's cancellation.
pub struct HttpTileFetcher {
    client: reqwest::Client,
    build_url: UrlBuilder,
    format: String,
}

impl HttpTileFetcher {
    /// Create a fetcher for a tile server described by `build_url`.
    ///
    /// `format` is the encoded format the server returns, recorded alongside
    /// the fetched bytes.
    pub fn new(
        build_url: impl Fn(&TileKey) -> String + Send + Sync + 'static,
        format: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            build_url: Box::new(build_url),
            format: format.into(),
        })
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch(
        &self,
        key: &TileKey,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedTile, FetchError>> + Send>> {
        let client = self.client.clone();
        let url = (self.build_url)(key);
        let format = self.format.clone();
        let key = key.clone();

        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%key, "tile fetch cancelled");
                    Err(FetchError::Cancelled)
                }
                result = get_tile(client, url, format) => result,
            }
        })
    }
}

async fn get_tile(
    client: reqwest::Client,
    url: String,
    format: String,
) -> Result<FetchedTile, FetchError> {
    trace!(url, "tile GET starting");

    let response = client.get(&url).send().await.map_err(|e| {
        warn!(url, error = %e, "tile request failed");
        FetchError::Http(format!("request failed: {e}"))
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "tile server error status");
        return Err(FetchError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let bytes: Bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Http(format!("failed to read response: {e}")))?;
    trace!(url, bytes = bytes.len(), "tile response body read");

    if bytes.is_empty() {
        return Err(FetchError::Empty);
    }

    Ok(FetchedTile { bytes, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_builder_receives_key_fields() {
        let fetcher = HttpTileFetcher::new(
            |key| {
                format!(
                    "https://tiles.example/{}/{}/{}/{}.png",
                    key.provider(),
                    key.level(),
                    key.column(),
                    key.row()
                )
            },
            "png",
        )
        .unwrap();

        let key = TileKey::new("osm", 1, 5, 3, 4);
        assert_eq!(
            (fetcher.build_url)(&key),
            "https://tiles.example/osm/5/3/4.png"
        );
    }
}
