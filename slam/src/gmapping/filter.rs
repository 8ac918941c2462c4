use std::sync::Arc;

use common::robot::{Pose, PoseDelta, TransformedLaserScan};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info};

use super::{
    params::{FilterParams, GmappingParams},
    world::GmappingWorld,
};
use crate::{
    grid::{GridCell, Map},
    particle::ParticleFilter,
};

/// Receives the state of the best hypothesis after every processed scan.
pub trait SlamObserver<C> {
    fn on_pose_update(&mut self, _pose: Pose) {}
    fn on_map_update(&mut self, _map: &Map<C>) {}
}

/// GMapping: a Rao-Blackwellized particle filter where every particle carries its own map.
pub struct GmappingParticleFilter<C> {
    filter: ParticleFilter<GmappingWorld<C>>,
    params: FilterParams,
    rng: StdRng,

    /// Motion accumulated (in absolute values) since the last resample.
    odometer: PoseDelta,

    /// Particle whose lineage is followed across resampling.
    master: usize,

    resample_count: usize,
    observers: Vec<Box<dyn SlamObserver<C>>>,
}

impl<C: GridCell> GmappingParticleFilter<C> {
    pub fn new(params: FilterParams, gmapping: GmappingParams, prototype: &C) -> Self {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let gmapping = Arc::new(gmapping);
        let mut filter = ParticleFilter::from_fn(params.particles, |_| {
            GmappingWorld::new(gmapping.clone(), prototype, rng.gen())
        });

        for world in filter.values_mut() {
            world.sample();
        }

        info!(
            "Created GMapping filter with {} particles on a {}x{} map",
            params.particles, gmapping.map.width, gmapping.map.height
        );

        Self {
            master: filter.strongest_particle_idx(),
            filter,
            params,
            rng,
            odometer: PoseDelta::default(),
            resample_count: 0,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn SlamObserver<C>>) {
        self.observers.push(observer);
    }

    /// Advances the filter by one scan, using the motion the scan carries.
    pub fn handle_sensor_data(&mut self, scan: &TransformedLaserScan) {
        self.process_observation(scan.pose_delta, scan);
    }

    /// Moves every particle by `delta`, integrates `scan` into every particle, updates the
    /// weights, resamples when the policy allows it and notifies the observers.
    pub fn process_observation(&mut self, delta: PoseDelta, scan: &TransformedLaserScan) {
        self.update_robot_pose(delta);
        self.handle_observation(scan);

        let pose = self.current_pose();
        for o in &mut self.observers {
            o.on_pose_update(pose);
        }

        let map = self.filter.particle_value(self.filter.strongest_particle_idx()).map();
        for o in &mut self.observers {
            o.on_map_update(map);
        }
    }

    fn update_robot_pose(&mut self, delta: PoseDelta) {
        for world in self.filter.values_mut() {
            world.update_robot_pose(delta);
        }
        self.odometer += delta.abs();
    }

    fn handle_observation(&mut self, scan: &TransformedLaserScan) {
        // weights are folded in and normalized by the filter
        self.filter.update(|world| world.handle_observation(scan));

        debug!(
            scan = scan.id,
            neff = self.filter.number_of_effective_particles(),
            "Integrated scan"
        );

        self.try_resample();
    }

    /// True once the robot moved or turned enough since the last resample.
    fn has_moved_enough(&self) -> bool {
        self.odometer.sq_dist() > self.params.resample_sq_distance
            || self.odometer.theta.abs() > self.params.resample_rotation
    }

    fn try_resample(&mut self) -> bool {
        if !self.has_moved_enough() {
            return false;
        }

        let heaviest = self.filter.strongest_particle_idx();
        let Some(parents) = self.filter.try_resample(self.params.neff_ratio, &mut self.rng) else {
            return false;
        };

        self.odometer.reset();
        self.resample_count += 1;

        // follow the old master if it has children, otherwise the heaviest particle
        let old_master = self.master;
        self.master = parents
            .iter()
            .position(|&p| p == old_master)
            .or_else(|| parents.iter().position(|&p| p == heaviest))
            .unwrap_or(0);

        for (i, world) in self.filter.values_mut().enumerate() {
            world.reseed(i as u64);
        }

        debug!(
            count = self.resample_count,
            master_survived = parents.contains(&old_master),
            "Resampled particles"
        );
        true
    }

    /// Pose of the currently heaviest particle.
    pub fn current_pose(&self) -> Pose {
        self.heaviest().pose()
    }

    /// Map of the currently heaviest particle.
    pub fn current_map(&self) -> &Map<C> {
        self.heaviest().map()
    }

    pub fn heaviest(&self) -> &GmappingWorld<C> {
        self.filter
            .particle_value(self.filter.strongest_particle_idx())
    }

    pub fn heaviest_index(&self) -> usize {
        self.filter.strongest_particle_idx()
    }

    pub fn master_index(&self) -> usize {
        self.master
    }

    pub fn is_master(&self, index: usize) -> bool {
        index == self.master
    }

    pub fn particle(&self, index: usize) -> &GmappingWorld<C> {
        self.filter.particle_value(index)
    }

    pub fn particle_count(&self) -> usize {
        self.filter.len()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.filter.weights().collect()
    }

    pub fn odometer(&self) -> PoseDelta {
        self.odometer
    }

    pub fn resample_count(&self) -> usize {
        self.resample_count
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use approx::assert_relative_eq;
    use common::{math::LogProbability, robot::Measurement};

    use super::*;
    use crate::{
        gmapping::params::{PoseSigma, ScanMatcherParams},
        grid::{DiscretePoint2D, GridMapParams, LogOddsCell, Point2D},
    };

    fn gmapping(iterations: usize, sigma: PoseSigma) -> GmappingParams {
        GmappingParams {
            map: GridMapParams {
                width: 80,
                height: 80,
                scale: 0.1,
            },
            scan_matcher: ScanMatcherParams {
                iterations,
                sigma: PoseSigma::new(0.05, 0.02),
            },
            initial_pose: Pose::new(0.05, 0.05, 0.0),
            initial_sigma: sigma,
            motion_noise: sigma,
            ..Default::default()
        }
    }

    fn filter_params(particles: usize) -> FilterParams {
        FilterParams {
            particles,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn scan(id: usize, delta: PoseDelta) -> TransformedLaserScan {
        TransformedLaserScan::new(
            id,
            delta,
            (0..72)
                .map(|i| Measurement::hit(i as f64 * std::f64::consts::PI / 36.0, 2.0))
                .collect(),
        )
    }

    #[test]
    #[should_panic(expected = "Must have at least one particle")]
    fn zero_particles_panics() {
        GmappingParticleFilter::new(
            filter_params(0),
            gmapping(0, PoseSigma::default()),
            &LogOddsCell::default(),
        );
    }

    #[test]
    fn starts_with_a_master() {
        let slam = GmappingParticleFilter::new(
            filter_params(5),
            gmapping(0, PoseSigma::new(0.1, 0.05)),
            &LogOddsCell::default(),
        );
        assert_eq!(slam.particle_count(), 5);
        assert_eq!((0..5).filter(|&i| slam.is_master(i)).count(), 1);
    }

    #[test]
    fn weights_stay_normalized() {
        let mut slam = GmappingParticleFilter::new(
            filter_params(8),
            gmapping(5, PoseSigma::new(0.05, 0.02)),
            &LogOddsCell::default(),
        );

        for i in 0..10 {
            slam.handle_sensor_data(&scan(i, PoseDelta::new(0.1, 0.0, 0.05)));
            let sum: f64 = slam.weights().iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn stationary_robot_never_resamples() {
        let mut slam = GmappingParticleFilter::new(
            filter_params(8),
            gmapping(5, PoseSigma::new(0.2, 0.1)),
            &LogOddsCell::default(),
        );

        for i in 0..10 {
            slam.handle_sensor_data(&scan(i, PoseDelta::default()));
        }
        assert_eq!(slam.resample_count(), 0);
        assert!(slam.odometer().is_zero());
    }

    #[test]
    fn small_motions_below_thresholds_do_not_resample() {
        let mut slam = GmappingParticleFilter::new(
            filter_params(8),
            gmapping(5, PoseSigma::new(0.2, 0.1)),
            &LogOddsCell::default(),
        );

        // 0.4 m and 0.15 rad in total, squared distance 0.16
        for i in 0..4 {
            slam.handle_sensor_data(&scan(i, PoseDelta::new(0.1, 0.0, 0.0375)));
        }
        assert_eq!(slam.resample_count(), 0);
        assert_relative_eq!(slam.odometer().x, 0.4, epsilon = 1e-9);
        assert_relative_eq!(slam.odometer().theta, 0.15, epsilon = 1e-9);
    }

    #[test]
    fn resampling_keeps_a_single_master_and_resets_the_odometer() {
        let mut slam = GmappingParticleFilter::new(
            FilterParams {
                // always resample once the robot moved
                neff_ratio: 1.0,
                ..filter_params(6)
            },
            gmapping(5, PoseSigma::new(0.2, 0.1)),
            &LogOddsCell::default(),
        );

        for i in 0..12 {
            slam.handle_sensor_data(&scan(i, PoseDelta::new(0.2, 0.0, 0.0)));
            assert_eq!((0..6).filter(|&p| slam.is_master(p)).count(), 1);
            assert!(slam.master_index() < slam.particle_count());
        }

        assert!(slam.resample_count() > 0);
        assert!(slam.odometer().sq_dist() <= 0.25 + 1e-9);
    }

    /// Four particles with distinct poses, weighted by `likelihoods` and resampled with the
    /// old master at index 3. Returns the filter and the poses the particles had before.
    fn resample_with(likelihoods: [f64; 4]) -> (GmappingParticleFilter<LogOddsCell>, Vec<Pose>) {
        let mut slam = GmappingParticleFilter::new(
            filter_params(4),
            gmapping(0, PoseSigma::new(0.5, 0.2)),
            &LogOddsCell::default(),
        );
        let poses: Vec<Pose> = (0..4).map(|i| slam.particle(i).pose()).collect();

        slam.filter.update(|world| {
            let i = poses
                .iter()
                .position(|&p| p == world.pose())
                .unwrap_or_default();
            LogProbability::new(likelihoods[i])
        });
        slam.master = 3;
        slam.odometer = PoseDelta::new(1.0, 0.0, 0.0);

        assert!(slam.try_resample());
        (slam, poses)
    }

    fn first_child_of(slam: &GmappingParticleFilter<LogOddsCell>, pose: Pose) -> Option<usize> {
        (0..slam.particle_count()).find(|&i| slam.particle(i).pose() == pose)
    }

    #[test]
    fn master_lineage_follows_its_surviving_children() {
        // the master is not the heaviest, but strong enough to survive
        let (slam, poses) = resample_with([0.0, 0.7, 0.0, 0.3]);

        assert_eq!(slam.particle(slam.master_index()).pose(), poses[3]);
        assert_eq!(Some(slam.master_index()), first_child_of(&slam, poses[3]));

        assert_eq!(slam.heaviest().pose(), poses[1]);
        assert_ne!(slam.master_index(), slam.heaviest_index());
    }

    #[test]
    fn master_moves_to_heaviest_when_its_lineage_dies() {
        let (slam, poses) = resample_with([0.3, 0.7, 0.0, 0.0]);

        assert_eq!(first_child_of(&slam, poses[3]), None);
        assert_eq!(slam.particle(slam.master_index()).pose(), poses[1]);
        assert_eq!(Some(slam.master_index()), first_child_of(&slam, poses[1]));
        assert_eq!(slam.master_index(), slam.heaviest_index());
        assert!(slam.odometer().is_zero());
    }

    #[test]
    fn reports_the_heaviest_particle() {
        let mut slam = GmappingParticleFilter::new(
            filter_params(6),
            gmapping(5, PoseSigma::new(0.2, 0.1)),
            &LogOddsCell::default(),
        );
        slam.handle_sensor_data(&scan(0, PoseDelta::default()));
        slam.handle_sensor_data(&scan(1, PoseDelta::new(0.05, 0.0, 0.0)));

        let weights = slam.weights();
        let heaviest = slam.heaviest_index();
        assert!(weights.iter().all(|&w| w <= weights[heaviest]));
        assert_eq!(slam.current_pose(), slam.particle(heaviest).pose());
        assert!(std::ptr::eq(slam.current_map(), slam.particle(heaviest).map()));
    }

    #[test]
    fn single_particle_converges() {
        let mut slam = GmappingParticleFilter::new(
            filter_params(1),
            gmapping(0, PoseSigma::default()),
            &LogOddsCell::default(),
        );

        slam.handle_sensor_data(&scan(0, PoseDelta::default()));
        let first = slam.current_map().likelihood();

        for i in 1..5 {
            slam.handle_sensor_data(&scan(i, PoseDelta::default()));
        }
        let last = slam.current_map().likelihood();

        // identical observations from the same pose keep every cell on the same side of 0.5
        let classify = |p: f64| (p > 0.5, p < 0.5);
        for (a, b) in first.values().iter().zip(last.values()) {
            assert_eq!(classify(a.value()), classify(b.value()));
        }

        assert_eq!(slam.current_pose(), Pose::new(0.05, 0.05, 0.0));
        assert!(slam.odometer().is_zero());
        assert_eq!(slam.resample_count(), 0);
        assert_relative_eq!(slam.weights()[0], 1.0);

        let hit = slam.current_map().grid().world_to_cell(Point2D::new(2.05, 0.05));
        assert_eq!(hit, DiscretePoint2D::new(20, 0));
        assert!(slam.current_map().occupancy(hit).value() > 0.5);
    }

    struct Recorder(Arc<Mutex<Vec<(Pose, usize)>>>);

    impl<C: GridCell> SlamObserver<C> for Recorder {
        fn on_pose_update(&mut self, pose: Pose) {
            if let Ok(mut v) = self.0.lock() {
                v.push((pose, 0));
            }
        }

        fn on_map_update(&mut self, map: &Map<C>) {
            if let Ok(mut v) = self.0.lock() {
                if let Some(last) = v.last_mut() {
                    last.1 = map.known_cells();
                }
            }
        }
    }

    #[test]
    fn observers_are_notified_after_every_scan() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slam = GmappingParticleFilter::new(
            filter_params(2),
            gmapping(0, PoseSigma::default()),
            &LogOddsCell::default(),
        );
        slam.add_observer(Box::new(Recorder(log.clone())));

        slam.handle_sensor_data(&scan(0, PoseDelta::default()));
        slam.handle_sensor_data(&scan(1, PoseDelta::new(0.1, 0.0, 0.0)));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_relative_eq!(log[1].0.x, 0.15, epsilon = 1e-9);
        assert!(log.iter().all(|(_, known)| *known > 0));
    }
}
