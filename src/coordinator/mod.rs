//! Tile request coordination.
//!
//! One actor task owns the tile cache and every piece of request
//! bookkeeping; viewports talk to it through a cloneable handle:
//!
//! ```text
//!   viewport ──request_tiles──► ┌─────────────────┐      ┌──────────────┐
//!   viewport ──request_tiles──► │ TileCoordinator │◄────►│ FetchWorker  │
//!            ◄──TileEvent────── │  (owns cache)   │      │ (FIFO, 1 at  │
//!                               └─────────────────┘      │  a time)     │
//!                                      ▲                 └──────┬───────┘
//!                                      └── retry timers ◄───────┘ failures
//! ```
//!
//! Per-tile lifecycle: `Idle → Requested → Dispatched → (Succeeded |
//! Failed → Retrying → Dispatched) → Idle`, with an early exit back to
//! `Idle` whenever every interested viewport cancels. At most one fetch is
//! outstanding per tile regardless of how many viewports want it.

mod actor;
mod fetch_worker;
mod messages;

pub use actor::{
    CoordinatorConfig, CoordinatorError, CoordinatorHandle, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_BASE_DELAY,
};
pub use messages::{TileEvent, ViewportId};
