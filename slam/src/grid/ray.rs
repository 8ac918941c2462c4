use std::ops::RangeInclusive;

use nalgebra::Vector2;

use super::regular::{DiscretePoint2D, Point2D, RegularSquaresGrid};

/// Visits every cell a line segment passes through, in order from the start to the end point.
pub struct GridRayIterator {
    /// Valid cells, the iterator stops as soon as the ray leaves them.
    x_range: RangeInclusive<i32>,
    y_range: RangeInclusive<i32>,

    delta: Vector2<f64>,
    increment: Vector2<i32>,
    error: f64,
    x: i32,
    y: i32,
    remaining_cells: usize,
}

impl GridRayIterator {
    /// Create an iterator to iterate over the line specified. The start and end points are specified in
    /// continuous grid units (see [`RegularSquaresGrid::world_to_grid`]). The iterator values are the
    /// visited cells together with their centers, in grid units.
    pub fn new(grid: &RegularSquaresGrid, start: Point2D, end: Point2D) -> Self {
        let (x0, y0, x1, y1) = (start.x, start.y, end.x, end.y);
        let delta = Vector2::new(x1 - x0, y1 - y0).abs();

        let x = x0.floor() as i32;
        let y = y0.floor() as i32;

        // start with at least one
        let mut n: i64 = 1;
        let x_inc;
        let y_inc;
        let mut error;

        // decide based on case
        if delta.x == 0.0 {
            x_inc = 0;
            error = f64::INFINITY;
        } else if x1 > x0 {
            x_inc = 1;
            n += x1.floor() as i64 - x as i64;
            error = (x0.floor() + 1.0 - x0) * delta.y;
        } else {
            x_inc = -1;
            n += x as i64 - x1.floor() as i64;
            error = (x0 - x0.floor()) * delta.y;
        }

        if delta.y == 0.0 {
            y_inc = 0;
            error -= f64::INFINITY;
        } else if y1 > y0 {
            y_inc = 1;
            n += y1.floor() as i64 - y as i64;
            error -= (y0.floor() + 1.0 - y0) * delta.x;
        } else {
            y_inc = -1;
            n += y as i64 - y1.floor() as i64;
            error -= (y0 - y0.floor()) * delta.x;
        }

        Self {
            x_range: grid.x_range(),
            y_range: grid.y_range(),
            delta,
            increment: Vector2::new(x_inc, y_inc),
            error,
            x,
            y,
            remaining_cells: n.max(0) as usize,
        }
    }
}

impl Iterator for GridRayIterator {
    type Item = (DiscretePoint2D, Point2D);

    fn next(&mut self) -> Option<Self::Item> {
        // make sure we do not leave the allowed range of x,y values
        let one_more = self.remaining_cells > 0
            && self.x_range.contains(&self.x)
            && self.y_range.contains(&self.y);

        if !one_more {
            return None;
        }

        let cell = DiscretePoint2D::new(self.x, self.y);
        let cell_center = Point2D::new(self.x as f64 + 0.5, self.y as f64 + 0.5);

        // move to next position
        if self.error > 0.0 {
            self.y += self.increment.y;
            self.error -= self.delta.x;
        } else {
            self.x += self.increment.x;
            self.error += self.delta.y;
        }

        // decrease number of cells
        self.remaining_cells -= 1;
        Some((cell, cell_center))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cells(grid: &RegularSquaresGrid, start: (f64, f64), end: (f64, f64)) -> Vec<(i32, i32)> {
        GridRayIterator::new(
            grid,
            Point2D::new(start.0, start.1),
            Point2D::new(end.0, end.1),
        )
        .map(|(c, _)| (c.x, c.y))
        .collect()
    }

    #[test]
    fn horizontal_ray() {
        let grid = RegularSquaresGrid::new(20, 20, 1.0);
        assert_eq!(
            cells(&grid, (0.5, 0.5), (3.5, 0.5)),
            vec![(0, 0), (1, 0), (2, 0), (3, 0)]
        );
        assert_eq!(
            cells(&grid, (0.5, 0.5), (-2.5, 0.5)),
            vec![(0, 0), (-1, 0), (-2, 0), (-3, 0)]
        );
    }

    #[test]
    fn vertical_ray() {
        let grid = RegularSquaresGrid::new(20, 20, 1.0);
        assert_eq!(
            cells(&grid, (0.5, 0.5), (0.5, -1.5)),
            vec![(0, 0), (0, -1), (0, -2)]
        );
    }

    #[test]
    fn single_cell_ray() {
        let grid = RegularSquaresGrid::new(20, 20, 1.0);
        assert_eq!(cells(&grid, (0.2, 0.2), (0.7, 0.9)), vec![(0, 0)]);
        assert_eq!(cells(&grid, (0.2, 0.2), (0.2, 0.2)), vec![(0, 0)]);
    }

    #[test]
    fn diagonal_ray_is_connected() {
        let grid = RegularSquaresGrid::new(20, 20, 1.0);
        let visited = cells(&grid, (0.5, 0.5), (3.7, 2.2));

        assert_eq!(visited.first(), Some(&(0, 0)));
        assert_eq!(visited.last(), Some(&(3, 2)));

        // every step moves to a 4-connected neighbour
        for w in visited.windows(2) {
            let (a, b) = (w[0], w[1]);
            assert_eq!((a.0 - b.0).abs() + (a.1 - b.1).abs(), 1);
        }
    }

    #[test]
    fn ray_stops_at_grid_border() {
        let grid = RegularSquaresGrid::new(4, 4, 1.0);
        // the grid spans -2..=1 in both directions
        assert_eq!(
            cells(&grid, (0.5, 0.5), (10.5, 0.5)),
            vec![(0, 0), (1, 0)]
        );
    }
}
