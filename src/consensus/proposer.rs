use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::network::link::NetworkLink;
use crate::network::node::Node;

use super::message::{Message, MessageType, ProposalId, ProposalIdGenerator};
use super::status::ElectionStatus;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RoundOutcome {
    /// Acceptor-only node, nothing was sent.
    NotCandidate,
    /// The node cannot reach anyone. The round was marked for retry.
    Disconnected,
    NoPromiseQuorum {
        proposal_id: ProposalId,
        agrees: usize,
        needed: usize,
    },
    NoAcceptQuorum {
        proposal_id: ProposalId,
        accepts: usize,
        needed: usize,
    },
    Chosen {
        proposal_id: ProposalId,
        value: String,
        accepts: usize,
        /// False when another winner was already recorded in the status cell.
        recorded: bool,
    },
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::NotCandidate => write!(f, "not a candidate"),
            RoundOutcome::Disconnected => write!(f, "disconnected"),
            RoundOutcome::NoPromiseQuorum { agrees, needed, .. } => {
                write!(f, "{agrees} agreement(s), {needed} needed")
            }
            RoundOutcome::NoAcceptQuorum { accepts, needed, .. } => {
                write!(f, "{accepts} acceptance(s), {needed} needed")
            }
            RoundOutcome::Chosen { value, .. } => write!(f, "chosen: {value}"),
        }
    }
}

/// Drives one PREPARE/ACCEPT round on behalf of its node.
#[derive(Clone)]
pub struct Proposer {
    node: Arc<Node>,
    link: NetworkLink,
    ids: Arc<ProposalIdGenerator>,
    status: Arc<ElectionStatus>,
    /// Launch this proposer was created in, checked when reporting a failure.
    launch: u32,
}

impl Proposer {
    pub fn new(
        node: Arc<Node>,
        link: NetworkLink,
        ids: Arc<ProposalIdGenerator>,
        status: Arc<ElectionStatus>,
    ) -> Self {
        Proposer {
            launch: status.launch(),
            node,
            link,
            ids,
            status,
        }
    }

    pub fn node_id(&self) -> &str {
        self.node.id()
    }

    pub async fn propose(&self) -> RoundOutcome {
        let Some(value) = self.node.behavior.proposed_value() else {
            return RoundOutcome::NotCandidate;
        };

        if !self.node.behavior.is_connected() {
            info!(node = %self.node_id(), "completely disconnected, cannot propose");
            self.fail_round();
            return RoundOutcome::Disconnected;
        }

        let peers = self.node.peers();
        let proposal_id = self.ids.next_id();

        let agrees = self
            .broadcast(&Message::prepare(proposal_id, value.clone()), MessageType::Agree)
            .await;
        info!(
            proposal_id,
            node = %self.node_id(),
            agrees,
            peers = peers.len(),
            "prepare phase finished"
        );
        if !peers.is_quorum(agrees) {
            self.fail_round();
            return RoundOutcome::NoPromiseQuorum {
                proposal_id,
                agrees,
                needed: peers.quorum_size(),
            };
        }

        let accepts = self
            .broadcast(&Message::accept(proposal_id, value.clone()), MessageType::Accepted)
            .await;
        info!(
            proposal_id,
            node = %self.node_id(),
            accepts,
            peers = peers.len(),
            "accept phase finished"
        );
        if !peers.is_quorum(accepts) {
            self.fail_round();
            return RoundOutcome::NoAcceptQuorum {
                proposal_id,
                accepts,
                needed: peers.quorum_size(),
            };
        }

        let recorded = match self.node.behavior.status_code() {
            Some(code) => self.status.declare_winner(code),
            None => false,
        };
        if !recorded {
            warn!(proposal_id, node = %self.node_id(), "quorum reached but a winner was already recorded");
        }
        RoundOutcome::Chosen {
            proposal_id,
            value,
            accepts,
            recorded,
        }
    }

    fn fail_round(&self) {
        if !self.status.fail_round(self.launch) {
            debug!(node = %self.node_id(), launch = self.launch, "retry not recorded, launch superseded or decided");
        }
    }

    /// Sends `request` to every peer in dial order and counts `wanted` replies.
    async fn broadcast(&self, request: &Message, wanted: MessageType) -> usize {
        let mut votes = 0;
        for address in self.node.peers().iter() {
            match self.link.send(address, request).await {
                Ok(reply) if reply.kind == wanted && reply.proposal_id == request.proposal_id => {
                    let previous = reply
                        .info()
                        .filter(|v| wanted == MessageType::Agree && Some(*v) != request.info());
                    if let Some(previous) = previous {
                        info!(%address, previous, "peer already accepted another value");
                    }
                    votes += 1;
                }
                Ok(reply) => {
                    debug!(%address, %reply, "no vote");
                }
                Err(err) => {
                    warn!(%address, kind = %request.kind, %err, "failed to send");
                }
            }
        }
        votes
    }
}
