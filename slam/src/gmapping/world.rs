use std::sync::Arc;

use common::{
    math::LogProbability,
    robot::{Pose, PoseDelta, TransformedLaserScan},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use statrs::distribution::Normal;

use super::params::{GmappingParams, PoseSigma};
use crate::grid::{GridCell, Map};

/// One hypothesis of the filter: a pose estimate together with the map built along the
/// trajectory that led to it.
#[derive(Clone)]
pub struct GmappingWorld<C> {
    pose: Pose,
    map: Map<C>,
    params: Arc<GmappingParams>,
    rng: StdRng,

    /// Number of scans integrated into the map.
    scans: usize,
}

impl<C: GridCell> GmappingWorld<C> {
    pub fn new(params: Arc<GmappingParams>, prototype: &C, seed: u64) -> Self {
        Self {
            pose: params.initial_pose,
            map: Map::new(&params.map, prototype),
            params,
            rng: StdRng::seed_from_u64(seed),
            scans: 0,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn map(&self) -> &Map<C> {
        &self.map
    }

    /// Draws the initial pose of this particle around the configured initial pose.
    pub fn sample(&mut self) {
        let sigma = self.params.initial_sigma;
        self.pose = self.params.initial_pose + perturbation(&mut self.rng, sigma);
    }

    /// Moves the particle by `delta`, disturbed by odometry noise proportional to the motion.
    pub fn update_robot_pose(&mut self, delta: PoseDelta) {
        let noise = self.params.motion_noise;
        let sigma = PoseSigma::new(
            noise.xy * delta.sq_dist().sqrt(),
            noise.theta * delta.theta.abs(),
        );
        self.pose += delta;
        self.pose += perturbation(&mut self.rng, sigma);
    }

    /// Corrects the pose by matching the scan against the map, integrates the scan at the
    /// corrected pose and returns the likelihood of the scan at that pose.
    pub fn handle_observation(&mut self, scan: &TransformedLaserScan) -> LogProbability {
        // nothing to match against until the first scan has been integrated
        let likelihood = if self.scans == 0 {
            LogProbability::ONE
        } else {
            let (pose, likelihood) = self.match_scan(scan);
            self.pose = pose;
            likelihood
        };

        self.map.integrate(scan, self.pose, &self.params.sensor);
        self.scans += 1;
        likelihood
    }

    /// Hill climbing: perturbs the best pose so far and keeps any improvement.
    fn match_scan(&mut self, scan: &TransformedLaserScan) -> (Pose, LogProbability) {
        let sensor = &self.params.sensor;
        let matcher = &self.params.scan_matcher;

        let mut best_pose = self.pose;
        let mut best = self.map.log_likelihood(scan, best_pose, sensor);

        for _ in 0..matcher.iterations {
            let candidate = best_pose + perturbation(&mut self.rng, matcher.sigma);
            let score = self.map.log_likelihood(scan, candidate, sensor);
            if score > best {
                best = score;
                best_pose = candidate;
            }
        }

        (best_pose, best)
    }

    /// Gives this particle a fresh random stream. Clones made by resampling share the state of
    /// their parent's generator and would otherwise draw identical noise.
    pub fn reseed(&mut self, salt: u64) {
        let seed = self.rng.gen::<u64>() ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        self.rng = StdRng::seed_from_u64(seed);
    }
}

fn perturbation(rng: &mut StdRng, sigma: PoseSigma) -> PoseDelta {
    PoseDelta::new(
        gaussian(rng, sigma.xy),
        gaussian(rng, sigma.xy),
        gaussian(rng, sigma.theta),
    )
}

fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    // a zero spread is a valid configuration but not a valid normal distribution
    match Normal::new(0.0, sigma) {
        Ok(n) if sigma > 0.0 => rng.sample(n),
        _ => 0.0,
    }
}
