use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

/*
    A proposer chooses a new proposal number n and sends a prepare request to
    every acceptor, asking it to promise never again to accept a proposal
    numbered less than n. If it hears back from a majority it issues an accept
    request for (n, v). An acceptor accepts (n, v) unless it has already
    responded to a prepare request numbered greater than n.

    Each exchange is a single request and a single response. The response
    always echoes the proposal number it answers.
*/

pub type ProposalId = i64;

/// Watermark value of an acceptor that has not promised anything yet.
pub const NO_PROPOSAL: ProposalId = -1;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Prepare,
    Agree,
    Reject,
    Accept,
    Accepted,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Prepare => "PREPARE",
            MessageType::Agree => "AGREE",
            MessageType::Reject => "REJECT",
            MessageType::Accept => "ACCEPT",
            MessageType::Accepted => "ACCEPTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PREPARE" => Some(MessageType::Prepare),
            "AGREE" => Some(MessageType::Agree),
            "REJECT" => Some(MessageType::Reject),
            "ACCEPT" => Some(MessageType::Accept),
            "ACCEPTED" => Some(MessageType::Accepted),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub proposal_id: ProposalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl Message {
    pub fn new(kind: MessageType, proposal_id: ProposalId, info: Option<String>) -> Self {
        Message {
            kind,
            proposal_id,
            info,
        }
    }

    pub fn prepare(proposal_id: ProposalId, candidate: impl Into<String>) -> Self {
        Message::new(MessageType::Prepare, proposal_id, Some(candidate.into()))
    }

    pub fn accept(proposal_id: ProposalId, value: impl Into<String>) -> Self {
        Message::new(MessageType::Accept, proposal_id, Some(value.into()))
    }

    /// Promise reply. Carries whatever value the acceptor accepted before, if any.
    pub fn agree(proposal_id: ProposalId, previously_accepted: Option<String>) -> Self {
        Message::new(MessageType::Agree, proposal_id, previously_accepted)
    }

    pub fn reject(proposal_id: ProposalId) -> Self {
        Message::new(MessageType::Reject, proposal_id, None)
    }

    pub fn accepted(proposal_id: ProposalId, value: impl Into<String>) -> Self {
        Message::new(MessageType::Accepted, proposal_id, Some(value.into()))
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => write!(f, "{}({}, {:?})", self.kind, self.proposal_id, info),
            None => write!(f, "{}({})", self.kind, self.proposal_id),
        }
    }
}

/// Hands out proposal numbers to every proposer of one election.
///
/// Numbers are unique within a generator only. Two coordinators (or two
/// processes) draw overlapping numbers, and acceptors compare them raw.
#[derive(Debug)]
pub struct ProposalIdGenerator {
    last: AtomicI64,
}

impl ProposalIdGenerator {
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    pub fn starting_after(last: ProposalId) -> Self {
        ProposalIdGenerator {
            last: AtomicI64::new(last),
        }
    }

    pub fn next_id(&self) -> ProposalId {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn last_issued(&self) -> ProposalId {
        self.last.load(Ordering::SeqCst)
    }
}

impl Default for ProposalIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_generator_starts_at_one() {
        let ids = ProposalIdGenerator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.last_issued(), 2);
    }

    #[tokio::test]
    async fn test_generator_is_unique_across_tasks() {
        let ids = Arc::new(ProposalIdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = ids.clone();
            handles.push(tokio::spawn(async move {
                (0..50).map(|_| ids.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(*all.last().unwrap(), 400);
    }

    #[test]
    fn test_reply_constructors() {
        let agree = Message::agree(4, None);
        assert_eq!(agree.kind, MessageType::Agree);
        assert_eq!(agree.info(), None);

        let accepted = Message::accepted(4, "Suggest M1 to become chairman");
        assert_eq!(accepted.proposal_id, 4);
        assert_eq!(accepted.info(), Some("Suggest M1 to become chairman"));
    }

    #[test]
    fn test_type_names() {
        for kind in [
            MessageType::Prepare,
            MessageType::Agree,
            MessageType::Reject,
            MessageType::Accept,
            MessageType::Accepted,
        ] {
            assert_eq!(MessageType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageType::parse("PROMISE"), None);
    }
}
