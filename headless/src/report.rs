use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use common::{
    node::{Node, NodeConfig},
    robot::Pose,
};
use pubsub::{PubSub, Subscription};
use serde::Deserialize;
use slam::GridMapMessage;
use tracing::{error, info};

/// Collects the output of the SLAM node and summarizes it on shutdown.
pub struct ReportNode {
    sub_pose: Subscription<Pose>,
    sub_map: Subscription<GridMapMessage>,
    sub_truth: Option<Subscription<Pose>>,
    pgm: Option<PathBuf>,

    pose: Option<Pose>,
    truth: Option<Pose>,
    map: Option<Arc<GridMapMessage>>,
    updates: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportNodeConfig {
    topic_pose: String,
    topic_map: String,

    /// Ground truth pose, if available the final error is reported as well.
    #[serde(default)]
    topic_truth: Option<String>,

    /// Where to write the final map as a PGM image.
    #[serde(default)]
    pgm: Option<PathBuf>,
}

impl NodeConfig for ReportNodeConfig {
    fn instantiate(&self, pubsub: &mut PubSub) -> Box<dyn Node> {
        Box::new(ReportNode {
            sub_pose: pubsub.subscribe(&self.topic_pose),
            sub_map: pubsub.subscribe(&self.topic_map),
            sub_truth: self.topic_truth.as_ref().map(|t| pubsub.subscribe(t)),
            pgm: self.pgm.clone(),
            pose: None,
            truth: None,
            map: None,
            updates: 0,
        })
    }
}

impl ReportNode {
    fn summary(&self) {
        let Some(pose) = self.pose else {
            info!("No pose was ever estimated");
            return;
        };

        info!(
            "Final pose x={:.3} y={:.3} theta={:.3} after {} updates",
            pose.x, pose.y, pose.theta, self.updates
        );

        if let Some(truth) = self.truth {
            let error = truth.delta_to(&pose);
            info!(
                "Distance to true pose {:.3} m, heading error {:.3} rad",
                error.sq_dist().sqrt(),
                error.theta.abs()
            );
        }

        if let Some(map) = &self.map {
            let stats = OccupancyStats::of(map);
            info!(
                "Map has {} occupied, {} free and {} unknown cells",
                stats.occupied, stats.free, stats.unknown
            );
        }
    }
}

impl Node for ReportNode {
    fn update(&mut self) {
        for pose in self.sub_pose.drain() {
            self.pose = Some(*pose);
            self.updates += 1;
        }

        if let Some(sub) = &mut self.sub_truth {
            if let Some(truth) = sub.drain().last() {
                self.truth = Some(**truth);
            }
        }

        if let Some(map) = self.sub_map.drain().pop() {
            self.map = Some(map);
        }
    }

    fn terminate(&mut self) {
        self.summary();

        if let (Some(path), Some(map)) = (&self.pgm, &self.map) {
            match write_pgm(path, map) {
                Ok(()) => info!("Wrote map to {}", path.display()),
                Err(e) => error!("Could not write map: {e:#}"),
            }
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct OccupancyStats {
    pub occupied: usize,
    pub free: usize,
    pub unknown: usize,
}

impl OccupancyStats {
    pub fn of(map: &GridMapMessage) -> Self {
        let mut stats = Self::default();
        for p in map.data.values() {
            match p.value() {
                v if v > 0.5 => stats.occupied += 1,
                v if v < 0.5 => stats.free += 1,
                _ => stats.unknown += 1,
            }
        }
        stats
    }
}

/// Writes the occupancy of every cell as a binary greymap, free space white and obstacles black.
/// The first row of the image is the top row of the map.
pub fn write_pgm(path: &Path, map: &GridMapMessage) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let (width, height) = (map.data.width(), map.data.height());
    write!(out, "P5\n{width} {height}\n255\n")?;

    let pixels: Vec<u8> = map
        .data
        .iter_cells()
        .map(|(_, p)| ((1.0 - p.value()) * 255.0).round() as u8)
        .collect();

    for row in pixels.chunks(width).rev() {
        out.write_all(row)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use common::math::Probability;
    use slam::grid::{DiscretePoint2D, GridMap, RegularSquaresGrid};

    use super::*;

    fn message() -> GridMapMessage {
        let mut data = GridMap::new(&Probability::UNKNOWN, 3, 2);
        *data.get_mut(DiscretePoint2D::new(0, 0)) = Probability::new(1.0);
        *data.get_mut(DiscretePoint2D::new(2, 1)) = Probability::new(0.0);
        GridMapMessage {
            grid: RegularSquaresGrid::new(3, 2, 0.5),
            data,
        }
    }

    #[test]
    fn counts_occupancy() {
        assert_eq!(
            OccupancyStats::of(&message()),
            OccupancyStats {
                occupied: 1,
                free: 1,
                unknown: 4
            }
        );
    }

    #[test]
    fn writes_pgm_top_row_first() {
        let path = std::env::temp_dir()
            .join(format!("headless-report-{}.pgm", std::process::id()));
        write_pgm(&path, &message()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let header = b"P5\n3 2\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(&bytes[header.len()..], &[128, 128, 255, 0, 128, 128]);
    }

    #[test]
    fn write_to_missing_directory_fails() {
        let path = Path::new("/nonexistent/dir/map.pgm");
        assert!(write_pgm(path, &message()).is_err());
    }
}
