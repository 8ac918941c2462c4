use std::sync::Arc;

use super::regular::DiscretePoint2D;

/// A rectangular block of cells addressed by zero based coordinates.
///
/// The cells live in one row-major buffer behind an `Arc`. Cloning a `GridMap` is cheap, the
/// buffer is copied the first time one of the clones is mutated, so two clones never observe
/// each other's changes.
#[derive(Debug, Clone)]
pub struct GridMap<T> {
    width: usize,
    height: usize,

    /// Vector containing all the data values
    data: Arc<Vec<T>>,
}

impl<T> GridMap<T> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// True if the coordinate addresses a cell, i.e. `0 <= x < width` and `0 <= y < height`.
    pub fn has_cell(&self, coord: DiscretePoint2D) -> bool {
        (0..self.width as i64).contains(&(coord.x as i64))
            && (0..self.height as i64).contains(&(coord.y as i64))
    }

    fn index(&self, coord: DiscretePoint2D) -> usize {
        assert!(
            self.has_cell(coord),
            "Cell {coord:?} is outside of the {}x{} grid",
            self.width,
            self.height
        );

        // Row-major order
        coord.y as usize * self.width + coord.x as usize
    }

    fn coord(&self, index: usize) -> DiscretePoint2D {
        DiscretePoint2D::new((index % self.width) as i32, (index / self.width) as i32)
    }

    pub fn get(&self, coord: DiscretePoint2D) -> &T {
        &self.data[self.index(coord)]
    }

    /// Iterates all cells together with their coordinate, row by row.
    pub fn iter_cells(&self) -> impl Iterator<Item = (DiscretePoint2D, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (self.coord(i), v))
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Returns a copy of this GridMap with each element converted to `S` using the provided function.
    pub fn transform_map<S>(&self, f: impl Fn(&T) -> S) -> GridMap<S> {
        GridMap {
            width: self.width,
            height: self.height,
            data: Arc::new(self.data.iter().map(f).collect()),
        }
    }

    /// True if both maps still share the same storage.
    pub fn shares_storage_with(&self, other: &GridMap<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T: Clone> GridMap<T> {
    /// Creates a `width` x `height` map where every cell is a clone of `prototype`.
    pub fn new(prototype: &T, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: Arc::new(vec![prototype.clone(); width * height]),
        }
    }

    pub fn get_mut(&mut self, coord: DiscretePoint2D) -> &mut T {
        let index = self.index(coord);
        &mut Arc::make_mut(&mut self.data)[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter(u32);

    #[test]
    fn has_cell_bounds() {
        let map = GridMap::new(&Counter(0), 3, 2);
        assert!(map.has_cell(DiscretePoint2D::new(0, 0)));
        assert!(map.has_cell(DiscretePoint2D::new(2, 1)));
        assert!(!map.has_cell(DiscretePoint2D::new(3, 0)));
        assert!(!map.has_cell(DiscretePoint2D::new(0, 2)));
        assert!(!map.has_cell(DiscretePoint2D::new(-1, 0)));
        assert!(!map.has_cell(DiscretePoint2D::new(0, -1)));
    }

    #[test]
    fn cells_are_independent() {
        let prototype = Counter(1);
        let mut map = GridMap::new(&prototype, 4, 3);

        map.get_mut(DiscretePoint2D::new(1, 2)).0 = 5;

        assert_eq!(prototype, Counter(1));
        assert_eq!(map.get(DiscretePoint2D::new(1, 2)), &Counter(5));
        let changed = map.values().iter().filter(|c| c.0 != 1).count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn clones_copy_on_write() {
        let mut a = GridMap::new(&Counter(0), 2, 2);
        let b = a.clone();
        assert!(a.shares_storage_with(&b));

        a.get_mut(DiscretePoint2D::new(0, 0)).0 = 7;

        assert!(!a.shares_storage_with(&b));
        assert_eq!(b.get(DiscretePoint2D::new(0, 0)), &Counter(0));
        assert_eq!(a.get(DiscretePoint2D::new(0, 0)), &Counter(7));
    }

    #[test]
    fn iter_cells_is_row_major() {
        let mut map = GridMap::new(&Counter(0), 3, 2);
        map.get_mut(DiscretePoint2D::new(2, 0)).0 = 1;
        map.get_mut(DiscretePoint2D::new(0, 1)).0 = 2;

        let coords: Vec<_> = map.iter_cells().filter(|(_, c)| c.0 > 0).collect();
        assert_eq!(
            coords,
            vec![
                (DiscretePoint2D::new(2, 0), &Counter(1)),
                (DiscretePoint2D::new(0, 1), &Counter(2))
            ]
        );
    }

    #[test]
    #[should_panic(expected = "outside of the 3x2 grid")]
    fn access_out_of_bounds_panics() {
        let map = GridMap::new(&Counter(0), 3, 2);
        map.get(DiscretePoint2D::new(0, 2));
    }

    #[test]
    #[should_panic(expected = "outside of the 3x2 grid")]
    fn mutable_access_out_of_bounds_panics() {
        let mut map = GridMap::new(&Counter(0), 3, 2);
        map.get_mut(DiscretePoint2D::new(-1, 0));
    }
}
