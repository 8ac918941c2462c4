use std::ops::{Add, RangeInclusive};

use nalgebra::Point2;
use serde::Deserialize;

/// A continuous position in world coordinates.
pub type Point2D = Point2<f64>;

/// Integer coordinate of a grid cell. No inherent bounds, validity depends on the grid it is used with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscretePoint2D {
    pub x: i32,
    pub y: i32,
}

impl DiscretePoint2D {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for DiscretePoint2D {
    type Output = DiscretePoint2D;

    fn add(self, rhs: DiscretePoint2D) -> Self::Output {
        DiscretePoint2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl From<(i32, i32)> for DiscretePoint2D {
    fn from((x, y): (i32, i32)) -> Self {
        DiscretePoint2D::new(x, y)
    }
}

/// Parameters used to construct the map of every particle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridMapParams {
    /// Number of cells along the x axis.
    pub width: usize,

    /// Number of cells along the y axis.
    pub height: usize,

    /// Side length of a cell in meters.
    pub scale: f64,
}

impl Default for GridMapParams {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            scale: 0.1,
        }
    }
}

impl GridMapParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.width > 0 && self.height > 0,
            "map must have at least one cell, got {}x{}",
            self.width,
            self.height
        );
        anyhow::ensure!(
            self.scale.is_finite() && self.scale > 0.0,
            "map scale must be positive, got {}",
            self.scale
        );
        Ok(())
    }
}

/// A grid of square cells with side `scale`, centered on the world origin.
///
/// Cell `(x, y)` covers the half-open area `[x*scale, (x+1)*scale) x [y*scale, (y+1)*scale)`.
/// The grid holds `width` columns starting at `-(width / 2)` and `height` rows starting at
/// `-(height / 2)`, so a 3x2 grid spans the columns -1..=1 and the rows -1..=0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularSquaresGrid {
    width: usize,
    height: usize,
    scale: f64,
}

impl RegularSquaresGrid {
    pub fn new(width: usize, height: usize, scale: f64) -> Self {
        assert!(
            scale.is_finite() && scale > 0.0,
            "Grid scale must be positive, got {scale}"
        );
        assert!(width > 0 && height > 0, "Grid must contain at least one cell");
        Self {
            width,
            height,
            scale,
        }
    }

    pub fn from_params(params: &GridMapParams) -> Self {
        Self::new(params.width, params.height, params.scale)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The storage index of the cell at grid coordinate `(0, 0)`.
    pub fn origin(&self) -> DiscretePoint2D {
        DiscretePoint2D::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    /// All valid x coordinates.
    pub fn x_range(&self) -> RangeInclusive<i32> {
        let min = -self.origin().x;
        min..=min + self.width as i32 - 1
    }

    /// All valid y coordinates.
    pub fn y_range(&self) -> RangeInclusive<i32> {
        let min = -self.origin().y;
        min..=min + self.height as i32 - 1
    }

    pub fn has_cell(&self, coord: DiscretePoint2D) -> bool {
        self.x_range().contains(&coord.x) && self.y_range().contains(&coord.y)
    }

    /// Translates a grid coordinate into the zero based coordinate used by the cell storage.
    pub fn internal(&self, coord: DiscretePoint2D) -> DiscretePoint2D {
        coord + self.origin()
    }

    /// Converts a world position into continuous grid units (cells).
    pub fn world_to_grid(&self, world: Point2D) -> Point2D {
        world / self.scale
    }

    /// The cell whose area contains the world position.
    pub fn world_to_cell(&self, world: Point2D) -> DiscretePoint2D {
        DiscretePoint2D::new(
            (world.x / self.scale).floor() as i32,
            (world.y / self.scale).floor() as i32,
        )
    }

    /// The reference (lower left) corner of a cell.
    pub fn cell_to_world(&self, coord: DiscretePoint2D) -> Point2D {
        Point2D::new(coord.x as f64 * self.scale, coord.y as f64 * self.scale)
    }

    pub fn cell_center(&self, coord: DiscretePoint2D) -> Point2D {
        Point2D::new(
            (coord.x as f64 + 0.5) * self.scale,
            (coord.y as f64 + 0.5) * self.scale,
        )
    }
}
