//! The tile request coordinator actor.

use crate::cache::TileCache;
use crate::codec::TileTexture;
use crate::coordinator::fetch_worker::{FetchWorker, WorkerCommand};
use crate::coordinator::messages::{CoordinatorMessage, TileEvent, ViewportId};
use crate::fetch::{FetchedTile, TileFetcher};
use crate::tile::TileKey;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default retry ceiling; the sixth failure abandons the tile.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default backoff base; the n-th retry waits `(1 << n) × base`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Retry/backoff tuning for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Retries per tile before it is abandoned.
    pub max_retries: u32,
    /// Base delay; retry n waits `(1 << n) × retry_base_delay`.
    pub retry_base_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

/// Errors surfaced by [`CoordinatorHandle`] calls.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The coordinator task has stopped.
    #[error("coordinator stopped")]
    Stopped,
}

/// Cloneable handle to a running coordinator actor.
///
/// The actor owns the [`TileCache`] and all request bookkeeping; every
/// mutation flows through its message channel, so callers never need a lock.
///
/// Typical viewport flow: [`register_viewport`](Self::register_viewport)
/// once, then [`request_tiles`](Self::request_tiles) with the full desired
/// set every time the viewport moves (deltas are computed inside), consuming
/// [`TileEvent`]s from the returned channel as fetches complete.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    /// Spawn the coordinator actor and its fetch worker.
    pub fn spawn(
        cache: TileCache,
        fetcher: Arc<dyn TileFetcher>,
        config: CoordinatorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();

        let worker = FetchWorker::new(worker_rx, tx.clone(), fetcher);
        tokio::spawn(worker.run());

        let coordinator = TileCoordinator {
            cache,
            config,
            viewports: HashMap::new(),
            interest: HashMap::new(),
            retries: HashMap::new(),
            retry_timers: HashMap::new(),
            next_viewport: 0,
            worker: worker_tx,
            self_tx: tx.clone(),
        };
        tokio::spawn(coordinator.run(rx));

        Self { tx }
    }

    /// Register a viewport, returning its id and event channel.
    pub async fn register_viewport(
        &self,
    ) -> Result<(ViewportId, mpsc::UnboundedReceiver<TileEvent>), CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(CoordinatorMessage::RegisterViewport { reply })
            .map_err(|_| CoordinatorError::Stopped)?;
        response.await.map_err(|_| CoordinatorError::Stopped)
    }

    /// Declare the viewport's full desired tile set.
    ///
    /// Returns the textures available from the cache right away; the rest
    /// is fetched in the background and announced via [`TileEvent`]s.
    /// Previously requested tiles absent from `desired` are cancelled.
    pub async fn request_tiles(
        &self,
        viewport: ViewportId,
        desired: HashSet<TileKey>,
    ) -> Result<Vec<Arc<TileTexture>>, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(CoordinatorMessage::RequestTiles {
                viewport,
                desired,
                reply,
            })
            .map_err(|_| CoordinatorError::Stopped)?;
        response.await.map_err(|_| CoordinatorError::Stopped)
    }

    /// Drop a viewport and all of its outstanding requests.
    pub fn release_viewport(&self, viewport: ViewportId) {
        let _ = self
            .tx
            .send(CoordinatorMessage::ViewportReleased { viewport });
    }

    /// Stop the actor, persisting the cache index first.
    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(CoordinatorMessage::Shutdown { reply })
            .map_err(|_| CoordinatorError::Stopped)?;
        response.await.map_err(|_| CoordinatorError::Stopped)
    }
}

struct ViewportState {
    requested: HashSet<TileKey>,
    events: mpsc::UnboundedSender<TileEvent>,
}

/// Single-owner actor: all cache access and request bookkeeping happens on
/// this task, serialized by the message channel.
struct TileCoordinator {
    cache: TileCache,
    config: CoordinatorConfig,
    viewports: HashMap<ViewportId, ViewportState>,
    /// Which viewports currently want each outstanding tile.
    interest: HashMap<TileKey, HashSet<ViewportId>>,
    /// Failures so far per outstanding tile.
    retries: HashMap<TileKey, u32>,
    /// Tokens aborting pending backoff timers.
    retry_timers: HashMap<TileKey, CancellationToken>,
    next_viewport: u64,
    worker: mpsc::UnboundedSender<WorkerCommand>,
    self_tx: mpsc::UnboundedSender<CoordinatorMessage>,
}

impl TileCoordinator {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CoordinatorMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                CoordinatorMessage::RegisterViewport { reply } => {
                    let _ = reply.send(self.register_viewport());
                }
                CoordinatorMessage::RequestTiles {
                    viewport,
                    desired,
                    reply,
                } => {
                    let _ = reply.send(self.request_tiles(viewport, desired));
                }
                CoordinatorMessage::FetchSucceeded { key, tile } => {
                    self.fetch_succeeded(key, tile);
                }
                CoordinatorMessage::FetchFailed { key, error } => {
                    self.fetch_failed(key, error);
                }
                CoordinatorMessage::RetryDue { key } => {
                    self.retry_due(key);
                }
                CoordinatorMessage::ViewportReleased { viewport } => {
                    self.release_viewport(viewport);
                }
                CoordinatorMessage::Shutdown { reply } => {
                    info!("coordinator shutting down");
                    let _ = self.worker.send(WorkerCommand::Shutdown);
                    for token in self.retry_timers.values() {
                        token.cancel();
                    }
                    self.cache.persist_index();
                    let _ = reply.send(());
                    return;
                }
            }
        }
    }

    fn register_viewport(&mut self) -> (ViewportId, mpsc::UnboundedReceiver<TileEvent>) {
        let id = ViewportId(self.next_viewport);
        self.next_viewport += 1;
        let (events, receiver) = mpsc::unbounded_channel();
        self.viewports.insert(
            id,
            ViewportState {
                requested: HashSet::new(),
                events,
            },
        );
        debug!(%id, "viewport registered");
        (id, receiver)
    }

    fn request_tiles(
        &mut self,
        viewport: ViewportId,
        desired: HashSet<TileKey>,
    ) -> Vec<Arc<TileTexture>> {
        let Some(state) = self.viewports.get(&viewport) else {
            warn!(%viewport, "request from unknown viewport");
            return Vec::new();
        };

        let to_cancel: Vec<TileKey> = state.requested.difference(&desired).cloned().collect();
        let to_request: Vec<TileKey> = desired.difference(&state.requested).cloned().collect();

        let mut available = Vec::new();
        let mut outbound = Vec::new();
        for key in to_request {
            match self.cache.get(&key) {
                Some(texture) => available.push(texture),
                None => outbound.push(key),
            }
        }
        debug!(
            %viewport,
            cached = available.len(),
            added = outbound.len(),
            cancelled = to_cancel.len(),
            "tile request delta"
        );

        if let Some(state) = self.viewports.get_mut(&viewport) {
            state.requested.retain(|key| desired.contains(key));
            state.requested.extend(outbound.iter().cloned());
        }

        for key in &to_cancel {
            self.remove_interest(key, viewport);
        }
        for key in outbound {
            let interested = self.interest.entry(key.clone()).or_default();
            let first_interest = interested.is_empty();
            interested.insert(viewport);
            // a tile goes to the worker only on first interest, so there is
            // never more than one outstanding fetch per tile
            if first_interest {
                let _ = self.worker.send(WorkerCommand::Enqueue(key));
            }
        }

        available
    }

    fn fetch_succeeded(&mut self, key: TileKey, tile: FetchedTile) {
        self.retries.remove(&key);
        self.cancel_retry_timer(&key);
        self.cache.insert(&key, tile.bytes, &tile.format);

        let Some(interested) = self.interest.remove(&key) else {
            return;
        };
        for viewport in interested {
            if let Some(state) = self.viewports.get_mut(&viewport) {
                state.requested.remove(&key);
                let _ = state.events.send(TileEvent::Ready(key.clone()));
            }
        }
    }

    fn fetch_failed(&mut self, key: TileKey, error: String) {
        if !self.interest.contains_key(&key) {
            // everyone cancelled while the failure was in transit
            return;
        }

        let count = *self.retries.get(&key).unwrap_or(&0);
        if count >= self.config.max_retries {
            warn!(%key, error = %error, "abandoning tile after {count} failed retries");
            self.retries.remove(&key);
            let Some(interested) = self.interest.remove(&key) else {
                return;
            };
            for viewport in interested {
                if let Some(state) = self.viewports.get_mut(&viewport) {
                    state.requested.remove(&key);
                    let _ = state
                        .events
                        .send(TileEvent::Failed(key.clone(), error.clone()));
                }
            }
            return;
        }

        let delay = self
            .config
            .retry_base_delay
            .saturating_mul(1u32.checked_shl(count).unwrap_or(u32::MAX));
        self.retries.insert(key.clone(), count + 1);
        debug!(%key, error = %error, attempt = count + 1, ?delay, "scheduling tile retry");

        let token = CancellationToken::new();
        self.retry_timers.insert(key.clone(), token.clone());
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(CoordinatorMessage::RetryDue { key });
                }
            }
        });
    }

    fn retry_due(&mut self, key: TileKey) {
        self.retry_timers.remove(&key);
        if self.interest.get(&key).is_some_and(|set| !set.is_empty()) {
            let _ = self.worker.send(WorkerCommand::Enqueue(key));
        } else {
            self.retries.remove(&key);
        }
    }

    fn release_viewport(&mut self, viewport: ViewportId) {
        let Some(state) = self.viewports.remove(&viewport) else {
            return;
        };
        debug!(%viewport, outstanding = state.requested.len(), "viewport released");
        for key in state.requested {
            self.remove_interest(&key, viewport);
        }
    }

    /// Drop one viewport's interest in a tile; the last interest cancels the
    /// fetch and purges the retry bookkeeping.
    fn remove_interest(&mut self, key: &TileKey, viewport: ViewportId) {
        let Some(interested) = self.interest.get_mut(key) else {
            return;
        };
        interested.remove(&viewport);
        if interested.is_empty() {
            self.interest.remove(key);
            self.retries.remove(key);
            self.cancel_retry_timer(key);
            let _ = self.worker.send(WorkerCommand::Cancel(key.clone()));
        }
    }

    fn cancel_retry_timer(&mut self, key: &TileKey) {
        if let Some(token) = self.retry_timers.remove(key) {
            token.cancel();
        }
    }
}
