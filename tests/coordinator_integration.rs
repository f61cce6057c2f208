//! End-to-end tests for the tile request coordinator.

use bytes::Bytes;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tilekeeper::cache::{CacheConfig, TileCache};
use tilekeeper::coordinator::{CoordinatorConfig, CoordinatorHandle, TileEvent};
use tilekeeper::fetch::{FetchError, FetchedTile, TileFetcher};
use tilekeeper::tile::TileKey;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

fn png_bytes() -> Bytes {
    let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([9, 9, 9, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
    Bytes::from(bytes)
}

fn key(column: u32) -> TileKey {
    TileKey::new("osm", 1, 5, column, 0)
}

fn tile_set(columns: &[u32]) -> HashSet<TileKey> {
    columns.iter().map(|c| key(*c)).collect()
}

/// Counts invocations; each fetch waits for a gate permit before resolving.
struct GatedFetcher {
    fetches: AtomicUsize,
    gate: Arc<Semaphore>,
}

impl GatedFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            gate: Arc::new(Semaphore::new(0)),
        })
    }

    fn open_gate(&self) {
        self.gate.add_permits(1000);
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl TileFetcher for GatedFetcher {
    fn fetch(
        &self,
        _key: &TileKey,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedTile, FetchError>> + Send>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.clone();
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                permit = gate.acquire_owned() => {
                    permit.unwrap().forget();
                    Ok(FetchedTile { bytes: png_bytes(), format: "png".into() })
                }
            }
        })
    }
}

/// Fails every fetch with a transient error.
struct FailingFetcher {
    fetches: AtomicUsize,
}

impl TileFetcher for FailingFetcher {
    fn fetch(
        &self,
        _key: &TileKey,
        _cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<FetchedTile, FetchError>> + Send>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(FetchError::Http("connection refused".into())) })
    }
}

fn open_coordinator(
    directory: &std::path::Path,
    fetcher: Arc<dyn TileFetcher>,
) -> CoordinatorHandle {
    let cache = TileCache::new(CacheConfig::with_directory(directory)).unwrap();
    CoordinatorHandle::spawn(cache, fetcher, CoordinatorConfig::default())
}

#[tokio::test]
async fn test_fetch_success_notifies_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = GatedFetcher::new();
    fetcher.open_gate();
    let coordinator = open_coordinator(dir.path(), fetcher.clone());

    let (viewport, mut events) = coordinator.register_viewport().await.unwrap();
    let available = coordinator
        .request_tiles(viewport, tile_set(&[0]))
        .await
        .unwrap();
    assert!(available.is_empty());

    assert_eq!(events.recv().await, Some(TileEvent::Ready(key(0))));

    // now in the cache, so a repeat request returns it immediately
    let available = coordinator
        .request_tiles(viewport, tile_set(&[0]))
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].key(), &key(0));
    assert_eq!(fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_overlapping_requests_fetch_each_tile_once() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = GatedFetcher::new();
    let coordinator = open_coordinator(dir.path(), fetcher.clone());

    let (viewport_a, mut events_a) = coordinator.register_viewport().await.unwrap();
    let (viewport_b, mut events_b) = coordinator.register_viewport().await.unwrap();

    // both viewports want tile 1 while its fetch is still gated
    coordinator
        .request_tiles(viewport_a, tile_set(&[0, 1]))
        .await
        .unwrap();
    coordinator
        .request_tiles(viewport_b, tile_set(&[1, 2]))
        .await
        .unwrap();

    fetcher.open_gate();

    let mut ready_a = HashSet::new();
    for _ in 0..2 {
        match events_a.recv().await {
            Some(TileEvent::Ready(key)) => {
                ready_a.insert(key);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    let mut ready_b = HashSet::new();
    for _ in 0..2 {
        match events_b.recv().await {
            Some(TileEvent::Ready(key)) => {
                ready_b.insert(key);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    assert_eq!(ready_a, tile_set(&[0, 1]));
    assert_eq!(ready_b, tile_set(&[1, 2]));
    // three distinct tiles, three fetches, despite four requests
    assert_eq!(fetcher.fetch_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failing_tile_is_abandoned_after_backed_off_retries() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FailingFetcher {
        fetches: AtomicUsize::new(0),
    });
    let coordinator = open_coordinator(dir.path(), fetcher.clone());

    let (viewport_a, mut events_a) = coordinator.register_viewport().await.unwrap();
    let (viewport_b, mut events_b) = coordinator.register_viewport().await.unwrap();
    coordinator
        .request_tiles(viewport_a, tile_set(&[0]))
        .await
        .unwrap();
    coordinator
        .request_tiles(viewport_b, tile_set(&[0]))
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let failed_a = events_a.recv().await;
    let failed_b = events_b.recv().await;
    let elapsed = started.elapsed();

    // exactly one failure notification per interested viewport
    assert!(matches!(failed_a, Some(TileEvent::Failed(ref key_a, _)) if *key_a == key(0)));
    assert!(matches!(failed_b, Some(TileEvent::Failed(ref key_b, _)) if *key_b == key(0)));
    assert!(events_a.try_recv().is_err());
    assert!(events_b.try_recv().is_err());

    // initial attempt plus five retries
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 6);

    // scheduled backoff: 500 + 1000 + 2000 + 4000 + 8000 ms
    assert!(elapsed >= Duration::from_millis(15_500), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(17_000), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_cancelled_tile_delivers_no_events() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = GatedFetcher::new();
    let coordinator = open_coordinator(dir.path(), fetcher.clone());

    let (viewport, mut events) = coordinator.register_viewport().await.unwrap();
    coordinator
        .request_tiles(viewport, tile_set(&[0]))
        .await
        .unwrap();
    // drop interest before the gated fetch can complete
    coordinator
        .request_tiles(viewport, tile_set(&[]))
        .await
        .unwrap();

    fetcher.open_gate();
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_released_viewport_gets_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = GatedFetcher::new();
    let coordinator = open_coordinator(dir.path(), fetcher.clone());

    let (viewport_a, mut events_a) = coordinator.register_viewport().await.unwrap();
    let (viewport_b, mut events_b) = coordinator.register_viewport().await.unwrap();
    coordinator
        .request_tiles(viewport_a, tile_set(&[0]))
        .await
        .unwrap();
    coordinator
        .request_tiles(viewport_b, tile_set(&[0]))
        .await
        .unwrap();

    coordinator.release_viewport(viewport_a);
    fetcher.open_gate();

    // the remaining viewport is still served
    assert_eq!(events_b.recv().await, Some(TileEvent::Ready(key(0))));
    assert!(events_a.try_recv().is_err());
}

#[tokio::test]
async fn test_shutdown_persists_cache_manifests() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = GatedFetcher::new();
    fetcher.open_gate();
    let coordinator = open_coordinator(dir.path(), fetcher.clone());

    let (viewport, mut events) = coordinator.register_viewport().await.unwrap();
    coordinator
        .request_tiles(viewport, tile_set(&[0]))
        .await
        .unwrap();
    assert_eq!(events.recv().await, Some(TileEvent::Ready(key(0))));

    coordinator.shutdown().await.unwrap();
    for i in 1..=4 {
        assert!(dir.path().join(format!("queue{i}")).exists());
    }
}
