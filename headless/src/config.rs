use std::{fs, path::Path};

use anyhow::Context;
use common::node::{Node, NodeConfig as _};
use pubsub::PubSub;
use serde::Deserialize;
use simulator::SimulatorNodeConfig;
use slam::GmappingSlamNodeConfig;

use crate::report::ReportNodeConfig;

#[derive(Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of update rounds to run before shutting down.
    pub steps: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self { steps: 300 }
    }
}

#[derive(Deserialize)]
pub enum NodeConfig {
    Simulator(SimulatorNodeConfig),
    GmappingSlam(GmappingSlamNodeConfig),
    Report(ReportNodeConfig),
}

impl NodeConfig {
    fn instantiate(&self, pubsub: &mut PubSub) -> Box<dyn Node> {
        use NodeConfig::*;
        match self {
            Simulator(c) => c.instantiate(pubsub),
            GmappingSlam(c) => c.instantiate(pubsub),
            Report(c) => c.instantiate(pubsub),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        match self {
            NodeConfig::Simulator(c) => c.validate().context("invalid Simulator node"),
            NodeConfig::GmappingSlam(c) => c.validate().context("invalid GmappingSlam node"),
            NodeConfig::Report(_) => Ok(()),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        // read file contents
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading {}", path.as_ref().display()))?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(contents).context("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.nodes.iter().try_for_each(NodeConfig::validate)
    }

    pub fn instantiate_nodes(&self, pubsub: &mut PubSub) -> Vec<Box<dyn Node>> {
        self.nodes
            .iter()
            .map(|config| config.instantiate(pubsub))
            .collect()
    }
}
