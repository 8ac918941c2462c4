//! Grid based FastSLAM in the GMapping flavour.

mod filter;
mod params;
mod world;

pub use filter::{GmappingParticleFilter, SlamObserver};
pub use params::{FilterParams, GmappingParams, PoseSigma, ScanMatcherParams};
pub use world::GmappingWorld;
