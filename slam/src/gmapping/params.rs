use common::robot::Pose;
use serde::Deserialize;

use crate::grid::{GridMapParams, SensorModel};

/// Standard deviations of a gaussian perturbation of a pose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoseSigma {
    /// Applied independently to x and y, in meters.
    pub xy: f64,

    /// In radians.
    pub theta: f64,
}

impl PoseSigma {
    pub fn new(xy: f64, theta: f64) -> Self {
        Self { xy, theta }
    }

    fn validate(&self, what: &str) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.xy.is_finite() && self.xy >= 0.0 && self.theta.is_finite() && self.theta >= 0.0,
            "{what} must be non-negative, got {self:?}"
        );
        Ok(())
    }
}

/// Monte-Carlo hill climbing around the odometry estimate of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanMatcherParams {
    /// Number of perturbed poses that are scored per scan. Zero disables scan matching.
    pub iterations: usize,

    /// Spread of the perturbations around the best pose found so far.
    pub sigma: PoseSigma,
}

impl Default for ScanMatcherParams {
    fn default() -> Self {
        Self {
            iterations: 30,
            sigma: PoseSigma::new(0.05, 0.05),
        }
    }
}

/// Parameters shared by every particle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GmappingParams {
    pub map: GridMapParams,
    pub sensor: SensorModel,
    pub scan_matcher: ScanMatcherParams,

    /// Pose every particle starts from.
    pub initial_pose: Pose,

    /// Spread of the initial poses drawn by [`super::GmappingWorld::sample`].
    pub initial_sigma: PoseSigma,

    /// Odometry noise, proportional to the magnitude of each motion.
    pub motion_noise: PoseSigma,
}

impl Default for GmappingParams {
    fn default() -> Self {
        Self {
            map: GridMapParams::default(),
            sensor: SensorModel::default(),
            scan_matcher: ScanMatcherParams::default(),
            initial_pose: Pose::default(),
            initial_sigma: PoseSigma::default(),
            motion_noise: PoseSigma::new(0.05, 0.05),
        }
    }
}

impl GmappingParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.map.validate()?;
        self.sensor.validate()?;
        self.scan_matcher.sigma.validate("scan matcher sigma")?;
        self.initial_sigma.validate("initial sigma")?;
        self.motion_noise.validate("motion noise")?;
        Ok(())
    }
}

/// Parameters of the particle population and its resampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub particles: usize,

    /// Resampling is considered once the squared distance travelled since the last resample
    /// exceeds this value...
    pub resample_sq_distance: f64,

    /// ...or once the accumulated rotation (radians) exceeds this value.
    pub resample_rotation: f64,

    /// Resample when the number of effective particles drops below `neff_ratio * particles`.
    pub neff_ratio: f64,

    /// Seed of all random number generators. Runs are reproducible when set.
    pub seed: Option<u64>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            particles: 30,
            resample_sq_distance: 0.25,
            resample_rotation: 0.2,
            neff_ratio: 0.5,
            seed: None,
        }
    }
}

impl FilterParams {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.particles > 0, "at least one particle is required");
        anyhow::ensure!(
            self.resample_sq_distance >= 0.0 && self.resample_rotation >= 0.0,
            "resample thresholds must be non-negative"
        );
        anyhow::ensure!(
            self.neff_ratio > 0.0 && self.neff_ratio <= 1.0,
            "neff ratio must be in (0, 1], got {}",
            self.neff_ratio
        );
        Ok(())
    }
}
