use std::sync::Arc;

use common::{
    math::normalize_angle,
    robot::{Command, Measurement, Pose, TransformedLaserScan},
};
use nalgebra::Vector2;
use pubsub::{Publisher, Subscription};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use statrs::distribution::Normal;
use tracing::debug;

use crate::scene::{Intersect, Ray, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimParameters {
    /// The wheel base (in meters) of the differential robot used in the simulator, i.e,
    /// the distance between the wheels.
    pub wheel_base: f64,

    /// The update period (in seconds) of the laser range scanner, i.e., 1/Hz.
    pub update_period: f64,

    /// Laser range scanner maximum distance in meters.
    pub scanner_range: f64,

    /// Number of beams in one revolution of the scanner.
    pub scanner_beams: usize,

    /// Standard deviation (meters) of the noise added to every range reading.
    pub range_sigma: f64,
}

impl Default for SimParameters {
    fn default() -> Self {
        Self {
            wheel_base: 0.1,
            update_period: 0.2,
            scanner_range: 4.0,
            scanner_beams: 360,
            range_sigma: 0.0,
        }
    }
}

impl SimParameters {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.wheel_base.is_finite() && self.wheel_base > 0.0,
            "wheel base must be positive, got {}",
            self.wheel_base
        );
        anyhow::ensure!(
            self.update_period.is_finite() && self.update_period > 0.0,
            "scanner update period must be positive, got {}",
            self.update_period
        );
        anyhow::ensure!(
            self.scanner_range.is_finite() && self.scanner_range > 0.0,
            "scanner range must be positive, got {}",
            self.scanner_range
        );
        anyhow::ensure!(self.scanner_beams > 0, "scanner needs at least one beam");
        anyhow::ensure!(
            self.range_sigma.is_finite() && self.range_sigma >= 0.0,
            "range noise must be non-negative, got {}",
            self.range_sigma
        );
        Ok(())
    }
}

pub struct Simulator {
    pub_scan: Option<Publisher<TransformedLaserScan>>,
    pub_pose: Option<Publisher<Pose>>,
    sub_cmd: Option<Subscription<Command>>,
    scene: Scene,
    parameters: SimParameters,
    pose: Pose,

    /// Pose of the robot when the previous scan was taken.
    last_scan_pose: Pose,
    wheel_velocity: Vector2<f64>,
    scan_update_timer: f64,
    scan_counter: usize,
    range_noise: Option<Normal>,
    rng: StdRng,
}

impl Simulator {
    pub fn new(
        pub_scan: Option<Publisher<TransformedLaserScan>>,
        pub_pose: Option<Publisher<Pose>>,
        sub_cmd: Option<Subscription<Command>>,
        scene: Scene,
        parameters: SimParameters,
        seed: u64,
    ) -> Self {
        Self {
            pub_scan,
            pub_pose,
            sub_cmd,
            scene,
            parameters,
            pose: Pose::default(),
            last_scan_pose: Pose::default(),
            wheel_velocity: Vector2::zeros(),
            scan_update_timer: 0.0,
            scan_counter: 0,
            range_noise: Normal::new(0.0, parameters.range_sigma).ok(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.last_scan_pose = pose;
    }

    pub fn get_pose(&self) -> Pose {
        self.pose
    }

    pub fn set_command(&mut self, command: Command) {
        self.wheel_velocity = Vector2::new(command.speed_left, command.speed_right);
    }

    pub fn scan_count(&self) -> usize {
        self.scan_counter
    }

    pub fn tick(&mut self, dt: f64) {
        // consume any incoming motion commands
        let mut latest = None;
        if let Some(sub_cmd) = &mut self.sub_cmd {
            while let Some(c) = sub_cmd.try_recv() {
                latest = Some(*c);
            }
        }
        if let Some(c) = latest {
            self.set_command(c);
        }

        // make the robot move
        self.motion_model(self.wheel_velocity.x * dt, self.wheel_velocity.y * dt);

        // if it's time for a scan, perform it!
        self.scan_update_timer += dt;
        if self.scan_update_timer >= self.parameters.update_period {
            self.scan_update_timer -= self.parameters.update_period;

            if let Some(pub_pose) = &mut self.pub_pose {
                pub_pose.publish(Arc::new(self.pose));
            }

            let scan = self.take_scan();
            debug!(id = scan.id, delta = ?scan.pose_delta, "Simulated scan");

            if let Some(pub_scan) = &mut self.pub_scan {
                pub_scan.publish(Arc::new(scan));
            }
        }
    }

    /// Takes a full revolution scan from the current pose. The scan carries the motion since the
    /// previous one.
    pub fn take_scan(&mut self) -> TransformedLaserScan {
        let beams = self.parameters.scanner_beams;
        let range = self.parameters.scanner_range;
        let origin = self.pose.xy();

        let measurements = (0..beams)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / beams as f64;
                let ray = Ray::from_origin_angle(origin, angle + self.pose.theta);

                match self.scene.intersect(&ray) {
                    Some(d) if d < range => {
                        let noise = self.range_noise.map_or(0.0, |n| self.rng.sample(n));
                        Measurement::hit(angle, (d + noise).max(0.0))
                    }
                    // Treat the valid flag as a hit/no hit
                    _ => Measurement::miss(angle, range),
                }
            })
            .collect();

        let delta = self.last_scan_pose.delta_to(&self.pose);
        self.last_scan_pose = self.pose;

        let scan = TransformedLaserScan::new(self.scan_counter, delta, measurements);
        self.scan_counter += 1;
        scan
    }

    fn motion_model(&mut self, sl: f64, sr: f64) {
        // from https://rossum.sourceforge.net/papers/DiffSteer/DiffSteer.html
        let sbar = (sr + sl) / 2.0;
        self.pose.theta =
            normalize_angle(self.pose.theta + (sr - sl) / self.parameters.wheel_base);
        self.pose.x += sbar * self.pose.theta.cos();
        self.pose.y += sbar * self.pose.theta.sin();
    }
}
