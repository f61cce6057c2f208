//! Viewport polygons and exact point containment.

use crate::grid::vector::Vec2;

/// Axis-aligned bounding box of a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Smallest x coordinate.
    pub x_min: f64,
    /// Largest x coordinate.
    pub x_max: f64,
    /// Smallest y coordinate.
    pub y_min: f64,
    /// Largest y coordinate.
    pub y_max: f64,
}

/// A simple or complex polygon given by its vertex ring.
///
/// Vertices are taken in order with an implicit closing edge from the last
/// vertex back to the first. Self-intersecting rings are allowed; containment
/// follows the even-odd rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Vec2>,
    bounds: Option<Bounds>,
}

impl Polygon {
    /// Build a polygon from its vertex ring.
    pub fn new(vertices: Vec<Vec2>) -> Self {
        let bounds = compute_bounds(&vertices);
        Self { vertices, bounds }
    }

    /// Build a polygon from a flat `[x0, y0, x1, y1, ...]` coordinate list.
    ///
    /// A trailing odd coordinate is ignored.
    pub fn from_coordinates(coordinates: &[f64]) -> Self {
        let vertices = coordinates
            .chunks_exact(2)
            .map(|pair| Vec2::new(pair[0], pair[1]))
            .collect();
        Self::new(vertices)
    }

    /// The vertex ring.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Bounding box, `None` for a polygon without vertices.
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    /// The polygon rotated counter-clockwise around the origin.
    pub fn rotate_counter_clockwise(&self, angle: f64) -> Polygon {
        Polygon::new(
            self.vertices
                .iter()
                .map(|v| v.rotate_counter_clockwise(angle))
                .collect(),
        )
    }

    /// Even-odd containment test.
    ///
    /// Implements the Galetzka-Glauner algorithm for complex polygons
    /// (<https://arxiv.org/abs/1207.3502>): the polygon is translated so the
    /// test point sits at the origin, then crossings of the positive x axis
    /// are counted, skipping runs of vertices lying exactly on the axis. A
    /// point on a vertex or an edge counts as contained.
    pub fn contains(&self, test_point: Vec2) -> bool {
        let n = self.vertices.len();
        if n == 0 {
            return false;
        }

        let origin = Vec2::default();
        let mut translated = Vec::with_capacity(n);
        let mut start_point = origin;
        let mut start_index = None;
        let mut x_axis_min = 0.0_f64;
        let mut x_axis_max = 0.0_f64;

        for (i, vertex) in self.vertices.iter().enumerate() {
            if *vertex == test_point {
                return true;
            }
            let v = *vertex - test_point;
            // remember a start vertex off the x axis
            if v.y != 0.0 {
                start_point = v;
                start_index = Some(i);
            }
            x_axis_max = x_axis_max.max(v.x);
            x_axis_min = x_axis_min.min(v.x);
            translated.push(v);
        }

        for i in 0..n {
            let edge = (translated[i], translated[next_index(n, i)]);
            if segments_intersect((origin, origin), edge) {
                return true;
            }
        }

        // every vertex on the x axis and the point not on an edge
        let Some(mut i) = start_index else {
            return false;
        };

        let x_axis = (Vec2::new(x_axis_min, 0.0), Vec2::new(x_axis_max, 0.0));
        let x_axis_positive = (origin, Vec2::new(x_axis_max, 0.0));

        let mut count = 0_u32;
        let mut seen = 0_usize;

        while seen < n {
            let successor = next_index(n, i);
            let successor_x = translated[successor].x;

            // skip vertices lying exactly on the x axis
            loop {
                i = next_index(n, i);
                seen += 1;
                if translated[i].y != 0.0 {
                    break;
                }
            }
            let end_point = translated[i];

            if start_point.y * end_point.y < 0.0 {
                let edge = (start_point, end_point);
                if i == successor {
                    if segments_intersect(edge, x_axis_positive) {
                        count += 1;
                    }
                } else if successor_x > 0.0 {
                    // skipped axis vertices on the right: the original edge
                    // would have crossed, so test against the full axis
                    if segments_intersect(edge, x_axis) {
                        count += 1;
                    }
                }
            }

            start_point = end_point;
        }

        count % 2 == 1
    }
}

fn compute_bounds(vertices: &[Vec2]) -> Option<Bounds> {
    let first = vertices.first()?;
    let mut bounds = Bounds {
        x_min: first.x,
        x_max: first.x,
        y_min: first.y,
        y_max: first.y,
    };
    for v in &vertices[1..] {
        bounds.x_min = bounds.x_min.min(v.x);
        bounds.x_max = bounds.x_max.max(v.x);
        bounds.y_min = bounds.y_min.min(v.y);
        bounds.y_max = bounds.y_max.max(v.y);
    }
    Some(bounds)
}

fn next_index(n: usize, current: usize) -> usize {
    if current == n - 1 {
        0
    } else {
        current + 1
    }
}

/// Orientation of the walk `p0 -> p1 -> p2`.
///
/// Returns 1 for counter-clockwise, -1 for clockwise, and distinguishes the
/// collinear cases: 0 when `p2` lies on the segment `p0..p1`, otherwise the
/// sign encodes which point lies between the others.
fn triangle_orientation(p0: Vec2, p1: Vec2, p2: Vec2) -> i32 {
    let dx1 = p1.x - p0.x;
    let dy1 = p1.y - p0.y;
    let dx2 = p2.x - p0.x;
    let dy2 = p2.y - p0.y;

    let cross = dx1 * dy2 - dx2 * dy1;
    if cross > 0.0 {
        1
    } else if cross < 0.0 {
        -1
    } else if dx1 * dx2 < 0.0 || dy1 * dy2 < 0.0 {
        // p0 lies between p1 and p2
        -1
    } else if dx1 * dx1 + dy1 * dy1 >= dx2 * dx2 + dy2 * dy2 {
        // p2 lies on the segment p0..p1
        0
    } else {
        // p1 lies between p0 and p2
        1
    }
}

/// Segment intersection test, inclusive of touching endpoints and
/// collinear overlap.
fn segments_intersect(a: (Vec2, Vec2), b: (Vec2, Vec2)) -> bool {
    let ccw11 = triangle_orientation(a.0, a.1, b.0);
    let ccw12 = triangle_orientation(a.0, a.1, b.1);
    let ccw21 = triangle_orientation(b.0, b.1, a.0);
    let ccw22 = triangle_orientation(b.0, b.1, a.1);

    (ccw11 * ccw12 < 0 && ccw21 * ccw22 < 0) || ccw11 * ccw12 * ccw21 * ccw22 == 0
}
