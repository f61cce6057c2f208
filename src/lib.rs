//! Tilekeeper - tile caching and fetch coordination for slippy-map clients.
//!
//! Given a viewport polygon at a zoom level, this library determines which
//! map tiles are visible, serves them from a multi-tier cache when possible,
//! and otherwise fetches them from a remote tile provider exactly once per
//! tile regardless of how many on-screen views requested it, with bounded
//! retries and exponential backoff on failure.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  request_tiles   ┌───────────────────┐
//! │ Viewport A │─────────────────►│                   │
//! └────────────┘                  │  TileCoordinator  │   ┌─────────────┐
//! ┌────────────┐  request_tiles   │  (actor, owns the │──►│ FetchWorker │
//! │ Viewport B │─────────────────►│  TileCache + all  │◄──│ (sequential │
//! └────────────┘   TileEvent      │   bookkeeping)    │   │  FIFO)      │
//!       ▲          Ready/Failed   └─────────┬─────────┘   └──────┬──────┘
//!       └──────────────────────────         │                    │
//!                                 ┌─────────▼─────────┐   ┌──────▼──────┐
//!                                 │     TileCache     │   │ TileFetcher │
//!                                 │ texture/memory/   │   │ (network)   │
//!                                 │ disk, 3Q eviction │   └─────────────┘
//!                                 └───────────────────┘
//! ```
//!
//! The [`grid`] module rasterizes a (possibly rotated) viewport polygon into
//! the exact set of tile rows/columns it overlaps and diffs two such sets to
//! produce incremental add/remove deltas as the viewport pans.

pub mod cache;
pub mod codec;
pub mod coordinator;
pub mod fetch;
pub mod grid;
pub mod logging;
pub mod tile;

/// Version of the tilekeeper library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
