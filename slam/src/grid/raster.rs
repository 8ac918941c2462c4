use std::ops::RangeInclusive;

use itertools::{Itertools, Product};

use super::{
    rectangle::Rectangle,
    regular::{DiscretePoint2D, RegularSquaresGrid},
};

/// Iterates the cells of a grid whose area overlaps a rectangle.
///
/// A cell is produced if the overlap with the rectangle has a non-zero area. Edges that only
/// touch a cell from below/left do not pull that cell in, so `[0, 1] x [0, 1]` on a grid with
/// scale 1 results in the single cell `(0, 0)`. Degenerate (zero extent) sides produce the cell
/// that contains them. Infinite bounds are clamped to the extent of the grid, finite ones are not,
/// so callers have to check the produced coordinates against their map.
pub struct GridRasterizedRectangle {
    cells: Product<RangeInclusive<i32>, RangeInclusive<i32>>,
}

impl GridRasterizedRectangle {
    pub fn new(grid: &RegularSquaresGrid, rect: &Rectangle) -> Self {
        let xs = cell_span(rect.left(), rect.right(), grid.scale(), grid.x_range());
        let ys = cell_span(rect.bottom(), rect.top(), grid.scale(), grid.y_range());

        Self {
            cells: xs.cartesian_product(ys),
        }
    }
}

impl Iterator for GridRasterizedRectangle {
    type Item = DiscretePoint2D;

    fn next(&mut self) -> Option<Self::Item> {
        self.cells.next().map(DiscretePoint2D::from)
    }
}

/// The inclusive range of cell indices along one axis covered by `[lo, hi]`.
fn cell_span(lo: f64, hi: f64, scale: f64, extent: RangeInclusive<i32>) -> RangeInclusive<i32> {
    let (min, max) = extent.into_inner();

    let first = if lo == f64::NEG_INFINITY {
        min
    } else if lo == f64::INFINITY {
        max
    } else {
        (lo / scale).floor() as i32
    };

    let last = if hi == f64::INFINITY {
        max
    } else if hi == f64::NEG_INFINITY {
        min
    } else {
        // an exact multiple of the scale maps to itself, so a touching edge is excluded
        let upper = ((hi / scale).ceil() as i32).saturating_sub(1);

        // hi/scale may round onto lo/scale for tiny rectangles, treat those as points
        if lo == hi || (lo.is_finite() && upper < first) {
            first
        } else {
            upper
        }
    };

    first..=last
}
