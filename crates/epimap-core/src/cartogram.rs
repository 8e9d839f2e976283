//! Fit an engine cartogram layout into render space.

use serde::Serialize;

use crate::engine::CartogramLayout;
use crate::error::ProjectionError;
use crate::geometry::{BoundingBox, Point};

pub const TARGET_WIDTH: f64 = 100.0;
pub const TARGET_HEIGHT: f64 = 45.0;

/// One circle of the rendered cartogram, indexed by feature id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CartogramNode {
    pub position: Point,
    /// Engine units, unscaled.
    pub radius: f64,
}

/// Rescale x into `[0, TARGET_WIDTH]` and y into `[0, TARGET_HEIGHT]` over the
/// bounding box of `positions`. Radii pass through.
pub fn project(positions: &[Point], radii: &[f64]) -> Result<Vec<CartogramNode>, ProjectionError> {
    if positions.len() != radii.len() {
        return Err(ProjectionError::LengthMismatch { positions: positions.len(), radii: radii.len() });
    }
    let bounds = BoundingBox::from_points(positions).ok_or(ProjectionError::EmptyInput)?;
    Ok(positions
        .iter()
        .zip(radii)
        .map(|(&p, &radius)| CartogramNode { position: bounds.rescale(p, TARGET_WIDTH, TARGET_HEIGHT), radius })
        .collect())
}

pub fn project_layout(layout: &CartogramLayout) -> Result<Vec<CartogramNode>, ProjectionError> {
    if layout.x.len() != layout.y.len() {
        return Err(ProjectionError::LengthMismatch { positions: layout.x.len().min(layout.y.len()), radii: layout.radius.len() });
    }
    project(&layout.positions(), &layout.radius)
}
