//! Viewport-to-tile-grid projection.
//!
//! Pure geometry, independent of the cache and coordinator layers:
//!
//! ```text
//!   Polygon ──rasterize──► TiledPolygon ──diff──► { same, new, old } runs
//!      │
//!      └── contains(point)   (even-odd, exact)
//! ```
//!
//! The coordinator turns `new`/`old` run sets into tile request and cancel
//! deltas as the viewport moves, instead of recomputing the full visible
//! set from scratch.

mod interval;
mod polygon;
mod tiled;
mod vector;

pub use interval::{IntervalCut, IntervalI};
pub use polygon::{Bounds, Polygon};
pub use tiled::{TiledPolygon, TiledPolygonDiff, TiledPolygonRun};
pub use vector::Vec2;
