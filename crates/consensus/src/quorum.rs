//! Majority quorum arithmetic.

/// Signatures needed to accept a block when the node knows `known_peers`
/// other nodes: a strict majority of `known_peers + 1`.
pub fn required_signatures(known_peers: usize) -> usize {
    (known_peers + 1) / 2 + 1
}

/// Whether `signatures` meets the quorum for `known_peers`.
pub fn has_quorum(signatures: usize, known_peers: usize) -> bool {
    signatures >= required_signatures(known_peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_signatures() {
        assert_eq!(required_signatures(0), 1);
        assert_eq!(required_signatures(1), 2);
        assert_eq!(required_signatures(2), 2);
        assert_eq!(required_signatures(3), 3);
        assert_eq!(required_signatures(4), 3);
        assert_eq!(required_signatures(9), 6);
    }

    #[test]
    fn test_five_nodes_need_three() {
        assert!(!has_quorum(2, 4));
        assert!(has_quorum(3, 4));
        assert!(has_quorum(5, 4));
    }

    #[test]
    fn test_single_node_accepts_own_signature() {
        assert!(!has_quorum(0, 0));
        assert!(has_quorum(1, 0));
    }
}
