//! Sequential tile fetch worker.
//!
//! A single task drains a FIFO queue one tile at a time. Sequential by
//! design: outbound concurrency stays bounded at one and the coordinator's
//! per-tile retry bookkeeping never races a second in-flight fetch for the
//! same tile.

use crate::coordinator::messages::CoordinatorMessage;
use crate::fetch::{FetchError, TileFetcher};
use crate::tile::TileKey;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Commands from the coordinator to the worker.
pub(crate) enum WorkerCommand {
    /// Append a tile to the back of the fetch queue.
    Enqueue(TileKey),
    /// Drop a queued tile, or abort it if it is the one in flight.
    Cancel(TileKey),
    /// Stop the worker, aborting any in-flight fetch.
    Shutdown,
}

pub(crate) struct FetchWorker {
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    results: mpsc::UnboundedSender<CoordinatorMessage>,
    fetcher: Arc<dyn TileFetcher>,
}

impl FetchWorker {
    pub(crate) fn new(
        commands: mpsc::UnboundedReceiver<WorkerCommand>,
        results: mpsc::UnboundedSender<CoordinatorMessage>,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Self {
        Self {
            commands,
            results,
            fetcher,
        }
    }

    /// Drain the queue until shutdown or until the coordinator goes away.
    pub(crate) async fn run(mut self) {
        let mut queue: VecDeque<TileKey> = VecDeque::new();

        loop {
            let Some(key) = queue.pop_front() else {
                match self.commands.recv().await {
                    Some(WorkerCommand::Enqueue(key)) => queue.push_back(key),
                    Some(WorkerCommand::Cancel(key)) => queue.retain(|queued| *queued != key),
                    Some(WorkerCommand::Shutdown) | None => return,
                }
                continue;
            };

            trace!(%key, queued = queue.len(), "starting tile fetch");
            let cancel = CancellationToken::new();
            let mut fetch = self.fetcher.fetch(&key, cancel.clone());
            let mut discarded = false;

            loop {
                tokio::select! {
                    result = &mut fetch => {
                        match result {
                            _ if discarded => {
                                // interest was lost mid-flight; whatever
                                // arrived is dropped without notification
                                debug!(%key, "discarding result of cancelled fetch");
                            }
                            Ok(tile) => {
                                let _ = self.results.send(CoordinatorMessage::FetchSucceeded {
                                    key: key.clone(),
                                    tile,
                                });
                            }
                            Err(FetchError::Cancelled) => {}
                            Err(error) => {
                                let _ = self.results.send(CoordinatorMessage::FetchFailed {
                                    key: key.clone(),
                                    error: error.to_string(),
                                });
                            }
                        }
                        break;
                    }
                    command = self.commands.recv() => match command {
                        Some(WorkerCommand::Enqueue(queued)) => queue.push_back(queued),
                        Some(WorkerCommand::Cancel(cancelled)) => {
                            if cancelled == key {
                                cancel.cancel();
                                discarded = true;
                            } else {
                                queue.retain(|queued| *queued != cancelled);
                            }
                        }
                        Some(WorkerCommand::Shutdown) | None => {
                            cancel.cancel();
                            return;
                        }
                    }
                }
            }
        }
    }
}
