use common::{
    node::{Node, NodeConfig},
    robot::{Command, Pose},
};
use nalgebra::{Point2, Vector2};
use serde::Deserialize;
use tracing::info;

pub use scene::{Intersect, LineSegment, Ray, Scene};
pub use sim::{SimParameters, Simulator};

mod scene;
mod sim;

/// Drives a simulated differential robot in a scene of walls and publishes its laser scans.
pub struct SimulatorNode {
    simulator: Simulator,
    time_step: f64,
    running: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorNodeConfig {
    topic_scan: Option<String>,
    topic_pose: Option<String>,
    topic_command: Option<String>,

    #[serde(default = "_default_true")]
    running: bool,

    /// Simulated time advanced by each update, in seconds.
    #[serde(default = "_default_time_step")]
    time_step: f64,

    /// Wheel speeds used until a command is received.
    #[serde(default)]
    command: Command,

    #[serde(default)]
    initial_pose: Pose,

    #[serde(default)]
    seed: u64,

    #[serde(default)]
    scene: Vec<SceneObject>,

    #[serde(default)]
    parameters: SimParameters,
}

const fn _default_true() -> bool {
    true
}

const fn _default_time_step() -> f64 {
    1.0 / 30.0
}

#[derive(Debug, Clone, Deserialize)]
enum SceneObject {
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl SimulatorNodeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.time_step.is_finite() && self.time_step > 0.0,
            "time step must be positive, got {}",
            self.time_step
        );
        self.parameters.validate()
    }

    fn build_scene(&self) -> Scene {
        let mut scene = Scene::new();

        for o in &self.scene {
            match *o {
                SceneObject::Line { x1, y1, x2, y2 } => {
                    scene.add(LineSegment::new(x1, y1, x2, y2));
                }
                SceneObject::Rectangle {
                    x,
                    y,
                    width,
                    height,
                } => {
                    scene.add_rect(Point2::new(x, y), Vector2::new(width, height));
                }
            }
        }
        scene
    }
}

impl NodeConfig for SimulatorNodeConfig {
    fn instantiate(&self, pubsub: &mut pubsub::PubSub) -> Box<dyn Node> {
        let scene = self.build_scene();
        info!("Simulating a scene of {} walls", scene.len());

        let mut simulator = Simulator::new(
            self.topic_scan.as_ref().map(|topic| pubsub.publish(topic)),
            self.topic_pose.as_ref().map(|topic| pubsub.publish(topic)),
            self.topic_command
                .as_ref()
                .map(|topic| pubsub.subscribe(topic)),
            scene,
            self.parameters,
            self.seed,
        );
        simulator.set_pose(self.initial_pose);
        simulator.set_command(self.command);

        Box::new(SimulatorNode {
            simulator,
            time_step: self.time_step,
            running: self.running,
        })
    }
}

impl Node for SimulatorNode {
    fn update(&mut self) {
        if self.running {
            self.simulator.tick(self.time_step);
        }
    }

    fn terminate(&mut self) {
        info!(
            pose = ?self.simulator.get_pose(),
            scans = self.simulator.scan_count(),
            "Simulator stopped"
        );
    }
}

#[cfg(test)]
mod test {
    use common::robot::TransformedLaserScan;
    use pubsub::PubSub;

    use super::*;

    #[test]
    fn rejects_degenerate_motion() {
        let config: SimulatorNodeConfig = serde_yaml::from_str("time_step: 0.0").unwrap();
        assert!(config.validate().is_err());

        let config: SimulatorNodeConfig =
            serde_yaml::from_str("parameters:\n  wheel_base: 0.0").unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("wheel base"));

        let config: SimulatorNodeConfig = serde_yaml::from_str("seed: 3").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn node_from_yaml() {
        let config: SimulatorNodeConfig = serde_yaml::from_str(
            r#"
topic_scan: "robot/scan"
topic_pose: null
topic_command: null
time_step: 0.1
command:
  speed_left: 0.2
  speed_right: 0.2
scene:
  - !Rectangle
    x: -2.0
    y: -2.0
    width: 4.0
    height: 4.0
  - !Line
    x1: 1.0
    y1: -1.0
    x2: 1.0
    y2: 1.0
parameters:
  scanner_beams: 8
"#,
        )
        .unwrap();

        assert_eq!(config.build_scene().len(), 5);

        let mut pubsub = PubSub::new();
        let mut node = config.instantiate(&mut pubsub);
        let mut sub = pubsub.subscribe::<TransformedLaserScan>("robot/scan");

        // default scan period is 0.2 s
        for _ in 0..4 {
            node.update();
        }
        pubsub.tick();

        let scans = sub.drain();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].measurements.len(), 8);

        // the inner wall is the closest obstacle straight ahead
        let ahead = scans[1].measurements[0];
        assert!(ahead.valid);
        assert!((ahead.distance - (1.0 - 0.08)).abs() < 1e-9);
    }
}
