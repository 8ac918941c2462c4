use std::collections::HashSet;

use common::{
    math::{LogProbability, Probability},
    robot::{Pose, TransformedLaserScan},
};
use serde::Deserialize;

use super::{
    cell::GridCell,
    data::GridMap,
    raster::GridRasterizedRectangle,
    ray::GridRayIterator,
    rectangle::Rectangle,
    regular::{DiscretePoint2D, GridMapParams, RegularSquaresGrid},
};

/// Parameters of the inverse sensor model used to update a map, and of the beam model used to
/// score a scan against it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorModel {
    /// Occupancy assigned to the cells around a beam endpoint.
    pub p_occupied: Probability,

    /// Occupancy assigned to the cells a beam passed through.
    pub p_free: Probability,

    /// Side (meters) of the square around a beam endpoint that is marked as occupied.
    pub hit_area: f64,

    /// Probability that a beam endpoint is explained by the map rather than by random noise.
    pub z_hit: f64,
}

impl Default for SensorModel {
    fn default() -> Self {
        Self {
            p_occupied: Probability::new_unchecked(0.9),
            p_free: Probability::new_unchecked(0.3),
            hit_area: 0.05,
            z_hit: 0.9,
        }
    }
}

impl SensorModel {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.hit_area.is_finite() && self.hit_area >= 0.0,
            "hit area must be a non-negative length, got {}",
            self.hit_area
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.z_hit),
            "z_hit must be a probability, got {}",
            self.z_hit
        );
        Ok(())
    }
}

/// An occupancy grid map: a [`RegularSquaresGrid`] with one cell of type `C` for each of its
/// coordinates.
#[derive(Debug, Clone)]
pub struct Map<C> {
    grid: RegularSquaresGrid,
    cells: GridMap<C>,
}

impl<C: GridCell> Map<C> {
    pub fn new(params: &GridMapParams, prototype: &C) -> Self {
        let grid = RegularSquaresGrid::from_params(params);
        Self {
            cells: GridMap::new(prototype, grid.width(), grid.height()),
            grid,
        }
    }

    pub fn grid(&self) -> &RegularSquaresGrid {
        &self.grid
    }

    pub fn has_cell(&self, coord: DiscretePoint2D) -> bool {
        self.grid.has_cell(coord)
    }

    /// The cell at a grid coordinate. Panics if the coordinate is not part of the map.
    pub fn cell(&self, coord: DiscretePoint2D) -> &C {
        self.cells.get(self.grid.internal(coord))
    }

    /// The cell at a grid coordinate. Panics if the coordinate is not part of the map.
    pub fn cell_mut(&mut self, coord: DiscretePoint2D) -> &mut C {
        self.cells.get_mut(self.grid.internal(coord))
    }

    /// Occupancy of a cell, or the unknown prior for coordinates outside the map.
    pub fn occupancy(&self, coord: DiscretePoint2D) -> Probability {
        if self.has_cell(coord) {
            self.cell(coord).occupancy()
        } else {
            Probability::UNKNOWN
        }
    }

    /// Integrates a scan taken at `pose`: cells a beam passed through are observed as free and
    /// the area around each valid endpoint as occupied. Parts of the scan outside the map are
    /// ignored.
    pub fn integrate(&mut self, scan: &TransformedLaserScan, pose: Pose, model: &SensorModel) {
        let start = self.grid.world_to_grid(pose.xy());

        for m in &scan.measurements {
            let end = m.endpoint(pose);

            let occupied: HashSet<DiscretePoint2D> = if m.valid {
                GridRasterizedRectangle::new(&self.grid, &Rectangle::centered(end, model.hit_area))
                    .filter(|&c| self.has_cell(c))
                    .collect()
            } else {
                HashSet::new()
            };

            let free: Vec<DiscretePoint2D> =
                GridRayIterator::new(&self.grid, start, self.grid.world_to_grid(end))
                    .map(|(c, _)| c)
                    .filter(|c| !occupied.contains(c))
                    .collect();

            for c in free {
                self.cell_mut(c).observe(model.p_free, scan.quality);
            }
            for c in occupied {
                self.cell_mut(c).observe(model.p_occupied, scan.quality);
            }
        }
    }

    /// Computes the probability of the observation given the map and the pose: p(z | m, x)
    pub fn log_likelihood(
        &self,
        scan: &TransformedLaserScan,
        pose: Pose,
        model: &SensorModel,
    ) -> LogProbability {
        let mut product = LogProbability::ONE;

        for m in scan.measurements.iter().filter(|m| m.valid) {
            let cell = self.grid.world_to_cell(m.endpoint(pose));
            let occupancy = self.occupancy(cell).value();

            product *= model.z_hit * occupancy + (1.0 - model.z_hit);
        }

        product
    }

    /// Snapshot of the occupancy of every cell, stored by zero based coordinates.
    pub fn likelihood(&self) -> GridMap<Probability> {
        self.cells.transform_map(|c| c.occupancy())
    }

    /// Number of cells that have been observed at least once.
    pub fn known_cells(&self) -> usize {
        self.cells.values().iter().filter(|c| c.is_known()).count()
    }

    /// True if both maps still share their cell storage (nothing was written since cloning).
    pub fn shares_storage_with(&self, other: &Map<C>) -> bool {
        self.cells.shares_storage_with(&other.cells)
    }
}
