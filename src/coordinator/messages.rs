//! Coordinator message types.

use crate::codec::TileTexture;
use crate::fetch::FetchedTile;
use crate::tile::TileKey;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Identifies one registered viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub(crate) u64);

impl std::fmt::Display for ViewportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewport-{}", self.0)
    }
}

/// Asynchronous notification delivered to a viewport's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileEvent {
    /// The tile was fetched and cached; the texture is available via
    /// a fresh `request_tiles` call or directly from the cache.
    Ready(TileKey),
    /// The tile was permanently abandoned after exhausting its retries.
    Failed(TileKey, String),
}

/// Messages driving the coordinator actor.
pub(crate) enum CoordinatorMessage {
    RegisterViewport {
        reply: oneshot::Sender<(ViewportId, mpsc::UnboundedReceiver<TileEvent>)>,
    },
    RequestTiles {
        viewport: ViewportId,
        desired: HashSet<TileKey>,
        reply: oneshot::Sender<Vec<Arc<TileTexture>>>,
    },
    FetchSucceeded {
        key: TileKey,
        tile: FetchedTile,
    },
    FetchFailed {
        key: TileKey,
        error: String,
    },
    RetryDue {
        key: TileKey,
    },
    ViewportReleased {
        viewport: ViewportId,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
