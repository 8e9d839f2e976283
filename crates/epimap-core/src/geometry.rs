//! Planar point and bounding-box helpers for centroids and cartogram layouts.
//! All coordinate math uses f64.

use serde::{Deserialize, Serialize};

/// A point in whatever planar space the producer works in (engine layout
/// units, projected centroids, render space).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned extent of a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Returns None for an empty slice.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self { min_x: first.x, max_x: first.x, min_y: first.y, max_y: first.y };
        Some(points.iter().fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Linearly map `p` so this box lands on `[0, target_w] × [0, target_h]`.
    /// A zero-extent axis maps to 0.
    pub fn rescale(&self, p: Point, target_w: f64, target_h: f64) -> Point {
        let sx = if self.width() > 0.0 { target_w / self.width() } else { 0.0 };
        let sy = if self.height() > 0.0 { target_h / self.height() } else { 0.0 };
        Point::new((p.x - self.min_x) * sx, (p.y - self.min_y) * sy)
    }
}
