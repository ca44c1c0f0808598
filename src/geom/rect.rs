use serde::{Deserialize, Serialize};

use crate::geom::EPS;

/// Axis-aligned rectangle in physical coordinates [m].
///
/// Used for solid obstacles (battery cells) placed inside the duct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x_start: f64,
    pub x_end: f64,
    pub y_start: f64,
    pub y_end: f64,
}

impl Rect {
    pub fn new(x_start: f64, x_end: f64, y_start: f64, y_end: f64) -> Self {
        Self {
            x_start,
            x_end,
            y_start,
            y_end,
        }
    }

    /// Creates a rectangle of size `width` x `height` centered at `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            x_start: cx - width / 2.0,
            x_end: cx + width / 2.0,
            y_start: cy - height / 2.0,
            y_end: cy + height / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_end - self.x_start
    }

    pub fn height(&self) -> f64 {
        self.y_end - self.y_start
    }

    /// Checks whether `(x, y)` lies inside the rectangle, boundary included.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_start - EPS
            && x <= self.x_end + EPS
            && y >= self.y_start - EPS
            && y <= self.y_end + EPS
    }

    /// Returns true if both extents are finite and non-inverted.
    pub fn is_valid(&self) -> bool {
        [self.x_start, self.x_end, self.y_start, self.y_end]
            .iter()
            .all(|v| v.is_finite())
            && self.width() >= 0.0
            && self.height() >= 0.0
    }
}
