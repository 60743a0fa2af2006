use std::collections::HashSet;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::common::config::ElectionConfig;
use crate::common::error::ElectionError;
use crate::consensus::codec::MessageCodec;
use crate::consensus::peers::Peers;

use super::node::{Node, NodeIdentity, NodeSpec};

/// Every node of one election with its listener task.
///
/// All listeners are bound before any node is built so the peer list carries
/// the real addresses, including ephemeral ones. A disconnected node still
/// gets an address (bound, then released) that refuses connections.
pub struct Cluster {
    pub nodes: Vec<Arc<Node>>,
    codec: Arc<dyn MessageCodec>,
    listening: HashSet<String>,
    listeners: Vec<JoinHandle<()>>,
}

impl Cluster {
    pub async fn start(config: &ElectionConfig, specs: Vec<NodeSpec>) -> Result<Self, ElectionError> {
        let codec = config.codec.build();

        let mut bound = Vec::with_capacity(specs.len());
        for (index, spec) in specs.into_iter().enumerate() {
            let address = format!("{}:{}", config.host, config.port_for(index));
            let bind_error = |source| ElectionError::Bind {
                address: address.clone(),
                source,
            };
            let listener = TcpListener::bind(&address).await.map_err(bind_error)?;
            let local = listener.local_addr().map_err(bind_error)?.to_string();
            bound.push((spec, local, listener));
        }

        let peers = Peers::new(bound.iter().map(|(_, address, _)| address.clone()).collect());

        // Disconnected listeners are only released here, once every port is
        // taken, so no other node can be handed the same ephemeral port.
        let mut nodes = Vec::with_capacity(bound.len());
        let mut listening = HashSet::new();
        let mut listeners = Vec::new();
        for (spec, acceptor_addr, listener) in bound {
            let connected = spec.behavior.is_connected();
            let identity = NodeIdentity {
                node_id: spec.node_id,
                acceptor_addr,
                peers: peers.clone(),
            };
            let node = Arc::new(Node::new(
                identity,
                spec.behavior,
                codec.clone(),
                config.link.timeout,
            ));
            if connected {
                listening.insert(node.id().to_string());
                listeners.push(tokio::spawn(node.clone().serve(listener)));
            } else {
                info!(
                    node = %node.id(),
                    address = %node.identity.acceptor_addr,
                    "node is disconnected, not starting acceptor"
                );
                drop(listener);
            }
            nodes.push(node);
        }

        Ok(Cluster {
            nodes,
            codec,
            listening,
            listeners,
        })
    }

    pub fn codec(&self) -> Arc<dyn MessageCodec> {
        self.codec.clone()
    }

    pub fn node(&self, node_id: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|node| node.id() == node_id)
    }

    pub fn is_listening(&self, node_id: &str) -> bool {
        self.listening.contains(node_id)
    }

    /// Nodes that may stand for election, in roster order.
    pub fn candidates(&self) -> Vec<Arc<Node>> {
        self.nodes
            .iter()
            .filter(|node| node.behavior.status_code().is_some())
            .cloned()
            .collect()
    }

    pub fn winner_codes(&self) -> Vec<i64> {
        self.nodes
            .iter()
            .filter_map(|node| node.behavior.status_code())
            .collect()
    }

    /// Stops accepting connections. In-flight handlers finish on their own.
    pub fn shutdown(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.shutdown();
    }
}
