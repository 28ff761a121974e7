use serde::{Deserialize, Serialize};

/// A point in normalized frame coordinates: `(0,0)` is the top-left corner,
/// `(1,1)` the bottom-right, regardless of the sensor resolution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// The frame centre every alignment decision is measured against.
pub const FRAME_CENTRE: Point = Point { x: 0.5, y: 0.5 };

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Clamp both coordinates into `[0, 1]`.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

/// Axis-aligned bounding box in normalized frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn centre(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.3, 0.4);
        assert!((a.distance_to(b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Point::new(0.1, 0.9);
        let b = Point::new(0.7, 0.2);
        assert_eq!(a.distance_to(b), b.distance_to(a));
    }

    #[test]
    fn clamped_limits_to_unit_square() {
        let p = Point::new(-0.5, 1.5).clamped();
        assert_eq!(p, Point::new(0.0, 1.0));
    }

    #[test]
    fn box_centre_and_area() {
        let b = BoundingBox::new(0.4, 0.4, 0.2, 0.2);
        assert_eq!(b.centre(), Point::new(0.5, 0.5));
        assert!((b.area() - 0.04).abs() < 1e-6);
    }
}
