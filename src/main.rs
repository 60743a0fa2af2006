/*
    Paxos lets a set of processes choose a single value despite message loss and crashed participants. A proposer picks a proposal number n and sends a prepare request to the acceptors. An acceptor that has not promised anything higher promises never to accept a proposal numbered below n and reports the highest-numbered proposal it has already accepted.

    If the proposer hears promises from a majority of acceptors it sends an accept request for n. An acceptor accepts it unless it has since promised a higher number. Once a majority has accepted, the value is chosen: any two majorities intersect, so no other value can gather a second accepting majority for the same round.

    Here the value is the council chairman. Every candidate proposes itself, members decide with their own temperament which prepare requests they promise, and a coordinator keeps launching rounds until a chairman is chosen or it runs out of retries.
*/

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::error;

use council_paxos::common::config::{CodecKind, ElectionConfig, LinkConfig};
use council_paxos::consensus::coordinator::ElectionCoordinator;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Codec {
    Json,
    Text,
}

impl From<Codec> for CodecKind {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Json => CodecKind::Json,
            Codec::Text => CodecKind::Text,
        }
    }
}

/// Elect a council chairman with Paxos over local TCP
#[derive(Parser, Debug)]
#[command(name = "council-paxos")]
struct Args {
    /// Number of council members, M1..Mn
    #[arg(long, env = "COUNCIL_NODES", default_value_t = 9)]
    nodes: usize,

    /// Host every acceptor listens on
    #[arg(long, env = "COUNCIL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Member Mi listens on base-port + i, 0 picks ephemeral ports
    #[arg(long, env = "COUNCIL_BASE_PORT", default_value_t = 5000)]
    base_port: u16,

    /// How unreliable M3 is
    #[arg(long, env = "COUNCIL_DELAY", default_value_t = 0)]
    delay: u32,

    /// Proposal rounds started per launch
    #[arg(long, env = "COUNCIL_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Elections retried after the first one fails
    #[arg(long, env = "COUNCIL_RETRIES", default_value_t = 3)]
    retries: usize,

    #[arg(long, env = "COUNCIL_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,

    #[arg(long, env = "COUNCIL_ATTEMPTS", default_value_t = 3)]
    attempts: u32,

    #[arg(long, env = "COUNCIL_SETTLE_MS", default_value_t = 2_000)]
    settle_ms: u64,

    #[arg(long, env = "COUNCIL_POLL_MS", default_value_t = 1_000)]
    poll_ms: u64,

    #[arg(long, env = "COUNCIL_CODEC", value_enum, default_value_t = Codec::Json)]
    codec: Codec,
}

impl From<Args> for ElectionConfig {
    fn from(args: Args) -> Self {
        ElectionConfig {
            nodes: args.nodes,
            host: args.host,
            base_port: args.base_port,
            delay_level: args.delay,
            concurrency: args.concurrency,
            retry_budget: args.retries,
            link: LinkConfig {
                timeout: Duration::from_millis(args.timeout_ms),
                max_attempts: args.attempts,
            },
            settle_delay: Duration::from_millis(args.settle_ms),
            poll_interval: Duration::from_millis(args.poll_ms),
            codec: args.codec.into(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ElectionConfig::from(Args::parse());

    let coordinator = match ElectionCoordinator::setup(config).await {
        Ok(coordinator) => coordinator,
        Err(err) => {
            error!(%err, "failed to set up the election");
            return ExitCode::FAILURE;
        }
    };

    let outcome = coordinator.run().await;
    println!("{outcome}");
    if outcome.is_elected() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
