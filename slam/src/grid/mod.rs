//! Occupancy grid maps and the geometry needed to address them from world coordinates.

pub mod cell;
pub mod data;
pub mod map;
pub mod raster;
pub mod ray;
pub mod rectangle;
pub mod regular;

pub use cell::{CellStrategy, CountingCell, GridCell, LogOddsCell};
pub use data::GridMap;
pub use map::{Map, SensorModel};
pub use raster::GridRasterizedRectangle;
pub use ray::GridRayIterator;
pub use rectangle::Rectangle;
pub use regular::{DiscretePoint2D, GridMapParams, Point2D, RegularSquaresGrid};
