use std::time::Duration;

use crate::consensus::message::MessageType;

/// Failure to turn a wire line into a [`Message`](crate::consensus::Message) or back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Errors raised by a single request/response exchange with one peer.
///
/// | Error | Retried by the link | Counted as |
/// |---|---|---|
/// | `Timeout` | yes, until the attempt ceiling | no vote |
/// | `Connect`, `Io`, `Closed` | no | no vote |
/// | `Codec`, `Unexpected`, `Oversized` | no | no vote |
///
/// `Idle` is only raised on the acceptor side, for a peer that never finishes
/// its request line.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("timed out talking to {address} after {attempts} attempt(s)")]
    Timeout { address: String, attempts: u32 },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before a reply was received")]
    Closed,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unexpected {0} message")]
    Unexpected(MessageType),

    #[error("line longer than {limit} bytes")]
    Oversized { limit: u64 },

    #[error("no request line within {0:?}")]
    Idle(Duration),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("an election needs at least one node")]
    NoNodes,

    #[error("{0} nodes requested, at most {max} are supported", max = crate::common::config::MAX_NODES)]
    TooManyNodes(usize),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("link attempts must be at least 1")]
    ZeroAttempts,

    #[error("base port {base} leaves no room for {nodes} nodes")]
    PortRange { base: u16, nodes: usize },
}

/// Errors that prevent an election from starting.
#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind acceptor on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("roster has no node able to stand as a candidate")]
    NoCandidates,
}
