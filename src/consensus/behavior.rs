//! Per-node participation strategies.
//!
//! Every node runs the same acceptor and proposer. What differs is whether it
//! proposes at all, which PREPAREs it is willing to promise, and whether it is
//! reachable. Those decisions live behind [`Behavior`].

use std::fmt;

use rand::Rng;

const CLAIM_PREFIX: &str = "Suggest ";
const CLAIM_SUFFIX: &str = " to become chairman";

/// Candidacy claim a node proposes, e.g. `Suggest M1 to become chairman`.
pub fn claim(node_id: &str) -> String {
    format!("{CLAIM_PREFIX}{node_id}{CLAIM_SUFFIX}")
}

/// Node id named by a candidacy claim.
pub fn claimed_candidate(value: &str) -> Option<&str> {
    value
        .strip_prefix(CLAIM_PREFIX)?
        .strip_suffix(CLAIM_SUFFIX)
        .filter(|id| !id.is_empty())
}

/// Status code a node reports when it wins: the numeric suffix of `M<n>`.
pub fn winner_code(node_id: &str) -> Option<i64> {
    node_id.strip_prefix('M')?.parse().ok()
}

pub trait Behavior: Send + Sync + fmt::Debug {
    fn kind(&self) -> &'static str;

    /// Claim this node proposes, or `None` for acceptor-only nodes.
    fn proposed_value(&self) -> Option<String>;

    /// Whether a PREPARE whose number already qualifies gets a promise.
    fn prepare_gate(&self, proposed: Option<&str>) -> bool;

    fn status_code(&self) -> Option<i64>;

    fn is_connected(&self) -> bool {
        true
    }

    /// Drawn per inbound connection; true closes it without a reply.
    fn drops_inbound(&self) -> bool {
        false
    }
}

fn endorses(candidate: &str, proposed: Option<&str>) -> bool {
    proposed.and_then(claimed_candidate) == Some(candidate)
}

/// Always reachable. Only promises proposals naming the candidate it endorses.
#[derive(Debug, Clone)]
pub struct Reliable {
    node_id: String,
    endorses: String,
}

impl Reliable {
    pub fn new(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        Reliable {
            endorses: node_id.clone(),
            node_id,
        }
    }

    pub fn endorsing(node_id: impl Into<String>, candidate: impl Into<String>) -> Self {
        Reliable {
            node_id: node_id.into(),
            endorses: candidate.into(),
        }
    }
}

impl Behavior for Reliable {
    fn kind(&self) -> &'static str {
        "reliable"
    }

    fn proposed_value(&self) -> Option<String> {
        Some(claim(&self.node_id))
    }

    fn prepare_gate(&self, proposed: Option<&str>) -> bool {
        endorses(&self.endorses, proposed)
    }

    fn status_code(&self) -> Option<i64> {
        winner_code(&self.node_id)
    }
}

/// Connectivity is drawn once from the delay level and never changes.
///
/// | delay level | P(disconnected) | P(drop inbound) when connected |
/// |---|---|---|
/// | 0 | 0.0 | 0.0 |
/// | 1 | 0.2 | 0.1 |
/// | 3 | 0.6 | 0.3 |
/// | 5+ | 1.0 | n/a |
#[derive(Debug, Clone)]
pub struct Flaky {
    node_id: String,
    connected: bool,
    drop_probability: f64,
}

impl Flaky {
    pub fn new(node_id: impl Into<String>, connected: bool, drop_probability: f64) -> Self {
        Flaky {
            node_id: node_id.into(),
            connected,
            drop_probability: drop_probability.clamp(0.0, 1.0),
        }
    }

    pub fn draw(node_id: impl Into<String>, delay_level: u32) -> Self {
        let disconnect = Self::disconnect_probability(delay_level);
        let connected = !rand::thread_rng().gen_bool(disconnect);
        Self::new(node_id, connected, Self::drop_probability(delay_level))
    }

    pub fn disconnect_probability(delay_level: u32) -> f64 {
        (0.2 * f64::from(delay_level)).min(1.0)
    }

    pub fn drop_probability(delay_level: u32) -> f64 {
        (0.1 * f64::from(delay_level)).min(0.7)
    }
}

impl Behavior for Flaky {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    fn proposed_value(&self) -> Option<String> {
        Some(claim(&self.node_id))
    }

    fn prepare_gate(&self, proposed: Option<&str>) -> bool {
        endorses(&self.node_id, proposed)
    }

    fn status_code(&self) -> Option<i64> {
        winner_code(&self.node_id)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn drops_inbound(&self) -> bool {
        self.drop_probability > 0.0 && rand::thread_rng().gen_bool(self.drop_probability)
    }
}

/// Reachable, but promises by coin flip.
#[derive(Debug, Clone)]
pub struct Capricious {
    node_id: String,
    agree_probability: f64,
    proposes: bool,
}

impl Capricious {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self::with_probability(node_id, 0.5)
    }

    pub fn with_probability(node_id: impl Into<String>, agree_probability: f64) -> Self {
        Capricious {
            node_id: node_id.into(),
            agree_probability: agree_probability.clamp(0.0, 1.0),
            proposes: true,
        }
    }

    /// Acceptor-only member of the council: votes by coin flip, never proposes.
    pub fn filler(node_id: impl Into<String>) -> Self {
        Self::filler_with_probability(node_id, 0.5)
    }

    pub fn filler_with_probability(node_id: impl Into<String>, agree_probability: f64) -> Self {
        Capricious {
            proposes: false,
            ..Self::with_probability(node_id, agree_probability)
        }
    }
}

impl Behavior for Capricious {
    fn kind(&self) -> &'static str {
        if self.proposes {
            "capricious"
        } else {
            "filler"
        }
    }

    fn proposed_value(&self) -> Option<String> {
        self.proposes.then(|| claim(&self.node_id))
    }

    fn prepare_gate(&self, _proposed: Option<&str>) -> bool {
        rand::thread_rng().gen_bool(self.agree_probability)
    }

    fn status_code(&self) -> Option<i64> {
        if self.proposes {
            winner_code(&self.node_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_parsing() {
        assert_eq!(claim("M1"), "Suggest M1 to become chairman");
        assert_eq!(claimed_candidate(&claim("M3")), Some("M3"));
        assert_eq!(claimed_candidate("Suggest  to become chairman"), None);
        assert_eq!(claimed_candidate("vote M1"), None);
    }

    #[test]
    fn test_winner_codes() {
        assert_eq!(winner_code("M1"), Some(1));
        assert_eq!(winner_code("M12"), Some(12));
        assert_eq!(winner_code("chair"), None);
    }

    #[test]
    fn test_reliable_only_promises_its_candidate() {
        let m1 = Reliable::new("M1");
        assert!(m1.prepare_gate(Some(&claim("M1"))));
        assert!(!m1.prepare_gate(Some(&claim("M10"))));
        assert!(!m1.prepare_gate(Some(&claim("M2"))));
        assert!(!m1.prepare_gate(None));

        let backer = Reliable::endorsing("M2", "M1");
        assert!(backer.prepare_gate(Some(&claim("M1"))));
        assert_eq!(backer.proposed_value(), Some(claim("M2")));
        assert_eq!(backer.status_code(), Some(2));
    }

    #[test]
    fn test_flaky_draw_extremes() {
        for _ in 0..20 {
            assert!(!Flaky::draw("M3", 5).is_connected());
            assert!(Flaky::draw("M3", 0).is_connected());
        }
        assert!(!Flaky::draw("M3", 0).drops_inbound());
    }

    #[test]
    fn test_flaky_probabilities() {
        assert_eq!(Flaky::disconnect_probability(0), 0.0);
        assert!((Flaky::disconnect_probability(2) - 0.4).abs() < 1e-9);
        assert_eq!(Flaky::disconnect_probability(9), 1.0);
        assert_eq!(Flaky::drop_probability(9), 0.7);
    }

    #[test]
    fn test_capricious_extremes() {
        let yes = Capricious::with_probability("M2", 1.0);
        let no = Capricious::with_probability("M2", 0.0);
        for _ in 0..20 {
            assert!(yes.prepare_gate(Some("anything")));
            assert!(!no.prepare_gate(Some(&claim("M2"))));
        }
        assert_eq!(yes.status_code(), Some(2));
    }

    #[test]
    fn test_filler_never_proposes() {
        let filler = Capricious::filler("M7");
        assert_eq!(filler.kind(), "filler");
        assert_eq!(filler.proposed_value(), None);
        assert_eq!(filler.status_code(), None);
    }
}
