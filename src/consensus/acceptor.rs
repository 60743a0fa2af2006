use tokio::sync::Mutex;
use tracing::info;

use super::behavior::Behavior;
use super::message::{Message, ProposalId, NO_PROPOSAL};

/*
    An acceptor can accept a proposal numbered n iff it has not responded to a
    prepare request having a number greater than n.

    The watermark is the highest number this acceptor has promised or
    accepted. It only ever grows. The watermark and the accepted value are
    read and written together under one lock, so concurrent connections to the
    same node are linearized.
*/

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AcceptorState {
    pub watermark: ProposalId,
    pub accepted: Option<String>,
}

impl Default for AcceptorState {
    fn default() -> Self {
        AcceptorState {
            watermark: NO_PROPOSAL,
            accepted: None,
        }
    }
}

pub struct Acceptor {
    node_id: String,
    state: Mutex<AcceptorState>,
}

impl Acceptor {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self::with_state(node_id, AcceptorState::default())
    }

    pub fn with_state(node_id: impl Into<String>, state: AcceptorState) -> Self {
        Acceptor {
            node_id: node_id.into(),
            state: Mutex::new(state),
        }
    }

    pub async fn snapshot(&self) -> AcceptorState {
        self.state.lock().await.clone()
    }

    pub async fn handle_prepare(
        &self,
        proposal_id: ProposalId,
        proposed: Option<&str>,
        behavior: &dyn Behavior,
    ) -> Message {
        let mut state = self.state.lock().await;

        if proposal_id < state.watermark {
            info!(
                node = %self.node_id,
                proposal_id,
                watermark = state.watermark,
                "rejected PREPARE: proposal outdated"
            );
            return Message::reject(proposal_id);
        }

        if !behavior.prepare_gate(proposed) {
            info!(
                node = %self.node_id,
                proposal_id,
                proposal = proposed.unwrap_or_default(),
                kind = behavior.kind(),
                "declined PREPARE"
            );
            return Message::reject(proposal_id);
        }

        state.watermark = proposal_id;
        info!(
            node = %self.node_id,
            proposal_id,
            proposal = proposed.unwrap_or_default(),
            "agreed to PREPARE"
        );
        Message::agree(proposal_id, state.accepted.clone())
    }

    pub async fn handle_accept(&self, proposal_id: ProposalId, value: Option<&str>) -> Message {
        let mut state = self.state.lock().await;

        let Some(value) = value.filter(|_| proposal_id >= state.watermark) else {
            info!(
                node = %self.node_id,
                proposal_id,
                watermark = state.watermark,
                "rejected ACCEPT"
            );
            return Message::reject(proposal_id);
        };

        state.watermark = proposal_id;
        state.accepted = Some(value.to_string());
        info!(node = %self.node_id, proposal_id, value, "accepted proposal");
        Message::accepted(proposal_id, value)
    }
}
