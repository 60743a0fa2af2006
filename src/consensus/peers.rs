/// Ordered acceptor addresses a proposer dials. Insertion order is dial order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peers {
    pub addresses: Vec<String>,
}

impl Peers {
    pub fn new(addresses: Vec<String>) -> Self {
        Peers { addresses }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    /// Smallest vote count that is a strict majority of the peer list.
    pub fn quorum_size(&self) -> usize {
        self.len() / 2 + 1
    }

    pub fn is_quorum(&self, votes: usize) -> bool {
        votes > self.len() / 2
    }

    pub fn contains(&self, address: &str) -> bool {
        self.iter().any(|a| a == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(n: usize) -> Peers {
        Peers::new((1..=n).map(|i| format!("localhost:{}", 5000 + i)).collect())
    }

    #[test]
    fn test_quorum_of_three() {
        let peers = peers(3);
        assert_eq!(peers.quorum_size(), 2);
        assert!(!peers.is_quorum(1));
        assert!(peers.is_quorum(2));
    }

    #[test]
    fn test_quorum_of_nine() {
        let peers = peers(9);
        assert_eq!(peers.quorum_size(), 5);
        assert!(!peers.is_quorum(4));
        assert!(peers.is_quorum(5));
    }

    #[test]
    fn test_even_peer_count_needs_more_than_half() {
        let peers = peers(4);
        assert!(!peers.is_quorum(2));
        assert!(peers.is_quorum(3));
    }

    #[test]
    fn test_dial_order() {
        let peers = peers(3);
        let order: Vec<_> = peers.iter().collect();
        assert_eq!(order, ["localhost:5001", "localhost:5002", "localhost:5003"]);
        assert!(peers.contains("localhost:5002"));
        assert!(!peers.contains("localhost:5004"));
    }
}
