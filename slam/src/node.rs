use std::sync::Arc;

use common::{
    math::Probability,
    node::{Node, NodeConfig},
    robot::{Pose, TransformedLaserScan},
};
use pubsub::{PubSub, Publisher, Subscription};
use serde::Deserialize;
use tracing::info;

use crate::{
    gmapping::{FilterParams, GmappingParams, GmappingParticleFilter, SlamObserver},
    grid::{CellStrategy, CountingCell, GridCell, GridMap, LogOddsCell, Map, RegularSquaresGrid},
};

/// Occupancy snapshot of the best map, published after every processed scan.
pub struct GridMapMessage {
    pub grid: RegularSquaresGrid,

    /// Occupancy of every cell, stored by zero based coordinates (see
    /// [`RegularSquaresGrid::internal`]).
    pub data: GridMap<Probability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmappingSlamNodeConfig {
    topic_scan: String,
    topic_pose: String,
    topic_map: String,

    #[serde(default)]
    cell: CellStrategy,

    #[serde(default)]
    filter: FilterParams,

    #[serde(default)]
    gmapping: GmappingParams,
}

impl GmappingSlamNodeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.filter.validate()?;
        self.gmapping.validate()
    }
}

impl NodeConfig for GmappingSlamNodeConfig {
    fn instantiate(&self, pubsub: &mut PubSub) -> Box<dyn Node> {
        match self.cell {
            CellStrategy::LogOdds => {
                Box::new(GmappingSlamNode::new(self, pubsub, &LogOddsCell::default()))
            }
            CellStrategy::Counting => {
                Box::new(GmappingSlamNode::new(self, pubsub, &CountingCell::default()))
            }
        }
    }
}

/// Feeds every received laser scan into a [`GmappingParticleFilter`].
pub struct GmappingSlamNode<C> {
    sub_scan: Subscription<TransformedLaserScan>,
    slam: GmappingParticleFilter<C>,
}

impl<C: GridCell> GmappingSlamNode<C> {
    fn new(config: &GmappingSlamNodeConfig, pubsub: &mut PubSub, prototype: &C) -> Self {
        let mut slam =
            GmappingParticleFilter::new(config.filter, config.gmapping.clone(), prototype);

        slam.add_observer(Box::new(MapPublisher {
            pub_pose: pubsub.publish(&config.topic_pose),
            pub_map: pubsub.publish(&config.topic_map),
        }));

        Self {
            sub_scan: pubsub.subscribe(&config.topic_scan),
            slam,
        }
    }
}

impl<C: GridCell> Node for GmappingSlamNode<C> {
    fn update(&mut self) {
        // scans are processed one after the other, never interleaved
        while let Some(scan) = self.sub_scan.try_recv() {
            self.slam.handle_sensor_data(&scan);
        }
    }

    fn terminate(&mut self) {
        info!(
            pose = ?self.slam.current_pose(),
            resamples = self.slam.resample_count(),
            known_cells = self.slam.current_map().known_cells(),
            "GMapping finished"
        );
    }
}

/// Forwards the state of the best hypothesis to the pubsub topics.
struct MapPublisher {
    pub_pose: Publisher<Pose>,
    pub_map: Publisher<GridMapMessage>,
}

impl<C: GridCell> SlamObserver<C> for MapPublisher {
    fn on_pose_update(&mut self, pose: Pose) {
        self.pub_pose.publish(Arc::new(pose));
    }

    fn on_map_update(&mut self, map: &Map<C>) {
        self.pub_map.publish(Arc::new(GridMapMessage {
            grid: *map.grid(),
            data: map.likelihood(),
        }));
    }
}
