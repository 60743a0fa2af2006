use std::sync::Arc;
use std::time::Duration;

use crate::consensus::behavior::{Behavior, Capricious, Flaky, Reliable};
use crate::consensus::codec::{JsonCodec, MessageCodec, TextCodec};
use crate::network::node::NodeSpec;

use super::error::ConfigError;

/// Winner codes are the node number, so the roster must stay below the RETRY code.
pub const MAX_NODES: usize = 98;

/// Longest wire line, newline included, either side will read.
pub const MAX_LINE: u64 = 64 * 1024;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CodecKind {
    #[default]
    Json,
    Text,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn MessageCodec> {
        match self {
            CodecKind::Json => Arc::new(JsonCodec),
            CodecKind::Text => Arc::new(TextCodec),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LinkConfig {
    /// Bound on one connect + write + read attempt.
    pub timeout: Duration,
    /// Total attempts made when an exchange times out.
    pub max_attempts: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ElectionConfig {
    pub nodes: usize,
    pub host: String,
    /// Node `Mi` listens on `base_port + i`. Zero binds every node to an ephemeral port.
    pub base_port: u16,
    pub delay_level: u32,
    /// Proposal rounds started per launch.
    pub concurrency: usize,
    pub retry_budget: usize,
    pub link: LinkConfig,
    pub settle_delay: Duration,
    pub poll_interval: Duration,
    pub codec: CodecKind,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        ElectionConfig {
            nodes: 9,
            host: "127.0.0.1".to_string(),
            base_port: 5000,
            delay_level: 0,
            concurrency: 1,
            retry_budget: 3,
            link: LinkConfig::default(),
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            codec: CodecKind::Json,
        }
    }
}

impl ElectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if self.nodes > MAX_NODES {
            return Err(ConfigError::TooManyNodes(self.nodes));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.link.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.base_port != 0 && usize::from(self.base_port) + self.nodes > usize::from(u16::MAX) {
            return Err(ConfigError::PortRange {
                base: self.base_port,
                nodes: self.nodes,
            });
        }
        Ok(())
    }

    pub fn node_id(index: usize) -> String {
        format!("M{}", index + 1)
    }

    /// Port node `index` (zero based) listens on.
    pub fn port_for(&self, index: usize) -> u16 {
        if self.base_port == 0 {
            0
        } else {
            // validate() keeps this in range
            self.base_port.saturating_add((index + 1) as u16)
        }
    }

    /// The standard council: M1 reliable, M2 capricious, M3 flaky, the rest fillers.
    pub fn default_roster(&self) -> Vec<NodeSpec> {
        (0..self.nodes)
            .map(|index| {
                let node_id = Self::node_id(index);
                let behavior: Arc<dyn Behavior> = match index {
                    0 => Arc::new(Reliable::new(node_id.clone())),
                    1 => Arc::new(Capricious::new(node_id.clone())),
                    2 => Arc::new(Flaky::draw(node_id.clone(), self.delay_level)),
                    _ => Arc::new(Capricious::filler(node_id.clone())),
                };
                NodeSpec { node_id, behavior }
            })
            .collect()
    }
}
