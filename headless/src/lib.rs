#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod report;

use common::PerfStats;
use pubsub::PubSub;
use tracing::{debug, info};

use crate::config::Config;

/// Instantiates every configured node and runs them for `settings.steps` rounds. Each round
/// distributes the pending messages and then updates every node once.
pub fn run(config: &Config) -> anyhow::Result<()> {
    let mut pubsub = PubSub::new();
    let mut nodes = config.instantiate_nodes(&mut pubsub);
    info!("Running {} nodes for {} steps", nodes.len(), config.settings.steps);

    let mut stats = PerfStats::new();
    for step in 0..config.settings.steps {
        let start = std::time::Instant::now();

        let delivered = pubsub.tick();
        for n in &mut nodes {
            n.update();
        }

        stats.update(start.elapsed());
        if step % 100 == 0 {
            debug!(step, delivered, "step time {stats}");
        }
    }

    // deliver whatever the last round produced before shutting down
    pubsub.tick();
    for n in &mut nodes {
        n.update();
    }

    for n in &mut nodes {
        n.terminate();
    }

    info!("Finished, step time {stats}");
    Ok(())
}
