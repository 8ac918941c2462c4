use super::regular::Point2D;

/// An axis aligned rectangle in world coordinates. Any bound may be infinite, meaning the
/// rectangle is unbounded in that direction. Zero area rectangles (lines and points) are valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    bottom: f64,
    top: f64,
    left: f64,
    right: f64,
}

impl Rectangle {
    pub const UNBOUNDED: f64 = f64::INFINITY;

    pub fn new(bottom: f64, top: f64, left: f64, right: f64) -> Self {
        assert!(
            bottom <= top && left <= right,
            "Malformed rectangle: bottom={bottom}, top={top}, left={left}, right={right}"
        );
        Self {
            bottom,
            top,
            left,
            right,
        }
    }

    /// A square with side `side` centered at `center`.
    pub fn centered(center: Point2D, side: f64) -> Self {
        let half = side / 2.0;
        Self::new(
            center.y - half,
            center.y + half,
            center.x - half,
            center.x + half,
        )
    }

    /// Rectangle covering the whole plane.
    pub fn unbounded() -> Self {
        Self::new(
            -Self::UNBOUNDED,
            Self::UNBOUNDED,
            -Self::UNBOUNDED,
            Self::UNBOUNDED,
        )
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }
}
