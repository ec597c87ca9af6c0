// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene-space coordinates.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A 2D point in scene coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Centroid of a set of points, `None` when empty
    pub fn centroid(points: impl IntoIterator<Item = Point>) -> Option<Point> {
        let mut sum = Point::default();
        let mut count = 0usize;
        for p in points {
            sum = sum + p;
            count += 1;
        }
        (count > 0).then(|| Point::new(sum.x / count as f64, sum.y / count as f64))
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid() {
        let c = Point::centroid([Point::new(0.0, 0.0), Point::new(4.0, 2.0)]);
        assert_eq!(c, Some(Point::new(2.0, 1.0)));
        assert_eq!(Point::centroid(Vec::new()), None);
    }
}
