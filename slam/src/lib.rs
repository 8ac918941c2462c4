pub mod gmapping;
pub mod grid;
mod node;
mod particle;

pub use gmapping::{
    FilterParams, GmappingParams, GmappingParticleFilter, GmappingWorld, SlamObserver,
};
pub use node::{GmappingSlamNode, GmappingSlamNodeConfig, GridMapMessage};
pub use particle::ParticleFilter;
