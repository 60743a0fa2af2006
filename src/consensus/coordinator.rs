use std::fmt;
use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::common::config::ElectionConfig;
use crate::common::error::ElectionError;
use crate::network::cluster::Cluster;
use crate::network::link::NetworkLink;
use crate::network::node::{Node, NodeSpec};

use super::message::ProposalIdGenerator;
use super::proposer::Proposer;
use super::status::{ElectionStatus, Status};

/*
    INIT(-1) -> [round running] -> WINNER(code)            => elected
                                -> RETRY(99) -> INIT(-1)   => next round, while budget lasts
                                -> RETRY(99), no budget    => exhausted

    The coordinator never cancels a round in flight. The retry budget only
    decides whether another round is launched.
*/

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ElectionOutcome {
    Elected {
        chairman: String,
        code: i64,
        rounds: usize,
    },
    Exhausted {
        retries: usize,
        rounds: usize,
    },
}

impl ElectionOutcome {
    pub fn is_elected(&self) -> bool {
        matches!(self, ElectionOutcome::Elected { .. })
    }
}

impl fmt::Display for ElectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectionOutcome::Elected { chairman, .. } => {
                write!(f, "consensus reached, {chairman} is chairman")
            }
            ElectionOutcome::Exhausted { retries, .. } => {
                write!(f, "failed to elect a chairman after {retries} retries")
            }
        }
    }
}

pub struct ElectionCoordinator {
    config: ElectionConfig,
    cluster: Cluster,
    candidates: Vec<Arc<Node>>,
    link: NetworkLink,
    ids: Arc<ProposalIdGenerator>,
    status: Arc<ElectionStatus>,
    rounds: Vec<JoinHandle<()>>,
    launches: usize,
}

impl ElectionCoordinator {
    pub async fn setup(config: ElectionConfig) -> Result<Self, ElectionError> {
        let roster = config.default_roster();
        Self::setup_with_roster(config, roster).await
    }

    pub async fn setup_with_roster(
        config: ElectionConfig,
        roster: Vec<NodeSpec>,
    ) -> Result<Self, ElectionError> {
        config.validate()?;

        let cluster = Cluster::start(&config, roster).await?;
        let candidates = cluster.candidates();
        if candidates.is_empty() {
            return Err(ElectionError::NoCandidates);
        }

        let link = NetworkLink::new(cluster.codec(), config.link);
        let status = Arc::new(ElectionStatus::new(cluster.winner_codes()));
        info!(
            nodes = cluster.nodes.len(),
            candidates = candidates.len(),
            codec = cluster.codec().name(),
            "council assembled"
        );

        Ok(ElectionCoordinator {
            config,
            cluster,
            candidates,
            link,
            ids: Arc::new(ProposalIdGenerator::new()),
            status,
            rounds: Vec::new(),
            launches: 0,
        })
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn status(&self) -> Arc<ElectionStatus> {
        self.status.clone()
    }

    /// Runs rounds until a chairman is recorded or the retry budget is spent.
    pub async fn run(mut self) -> ElectionOutcome {
        let mut retries_left = self.config.retry_budget;
        let mut poll = time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        poll.tick().await;

        self.launch_rounds();

        let outcome = loop {
            poll.tick().await;
            match self.status.get() {
                Status::Winner(code) => {
                    break ElectionOutcome::Elected {
                        chairman: self.chairman(code),
                        code,
                        rounds: self.launches,
                    };
                }
                Status::Retry if retries_left == 0 => {
                    warn!(
                        retries = self.config.retry_budget,
                        "failed to elect a chairman, ending the election"
                    );
                    break ElectionOutcome::Exhausted {
                        retries: self.config.retry_budget,
                        rounds: self.launches,
                    };
                }
                Status::Retry => {
                    retries_left -= 1;
                    info!(retries_left, "no consensus, electing again");
                    self.launch_rounds();
                }
                status => debug!(%status, "current status"),
            }
        };

        self.shutdown();
        info!(%outcome, "election finished");
        outcome
    }

    fn launch_rounds(&mut self) {
        self.launches += 1;
        self.status.begin_round();
        self.rounds.retain(|round| !round.is_finished());

        for _ in 0..self.config.concurrency {
            let pick = rand::thread_rng().gen_range(0..self.candidates.len());
            let proposer = Proposer::new(
                self.candidates[pick].clone(),
                self.link.clone(),
                self.ids.clone(),
                self.status.clone(),
            );
            let settle = self.config.settle_delay;
            let launch = self.launches;

            self.rounds.push(tokio::spawn(async move {
                time::sleep(settle).await;
                let outcome = proposer.propose().await;
                info!(launch, node = %proposer.node_id(), %outcome, "round finished");
            }));
        }
    }

    fn chairman(&self, code: i64) -> String {
        self.candidates
            .iter()
            .find(|node| node.behavior.status_code() == Some(code))
            .map(|node| node.id().to_string())
            .unwrap_or_else(|| format!("M{code}"))
    }

    fn shutdown(&mut self) {
        for round in self.rounds.drain(..) {
            round.abort();
        }
        self.cluster.shutdown();
    }
}
