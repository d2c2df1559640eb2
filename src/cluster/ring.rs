//! Consistent-hash ring over node identities.

/// Hash function used to place nodes and keys on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// A sorted ring of `(hash, node)` points.
///
/// A key belongs to the first node whose hash is greater than or equal to
/// the key's hash, wrapping around to the lowest point.
#[derive(Debug, Clone)]
pub struct ConsistentHash {
    hash: HashFn,
    points: Vec<(u32, String)>,
}

impl Default for ConsistentHash {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistentHash {
    /// Create an empty ring hashed with CRC-32 (IEEE).
    pub fn new() -> Self {
        Self::with_hasher(crc32fast::hash)
    }

    /// Create an empty ring with a custom hash function.
    pub fn with_hasher(hash: HashFn) -> Self {
        Self {
            hash,
            points: Vec::new(),
        }
    }

    /// Build a ring from node identities.
    pub fn from_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = Self::new();
        ring.add_nodes(nodes);
        ring
    }

    /// Add nodes to the ring. Empty and duplicate identities are ignored.
    pub fn add_nodes<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for node in nodes {
            let node = node.into();
            if node.is_empty() || self.contains(&node) {
                continue;
            }
            let point = ((self.hash)(node.as_bytes()), node);
            let at = self.points.partition_point(|p| *p < point);
            self.points.insert(at, point);
        }
    }

    /// Returns true if `node` is on the ring.
    pub fn contains(&self, node: &str) -> bool {
        self.points.iter().any(|(_, n)| n == node)
    }

    /// Returns true if the ring has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of nodes on the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Node identities in ring order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|(_, n)| n.as_str())
    }

    /// The node owning `key`, or `None` on an empty ring.
    pub fn pick_node(&self, key: &[u8]) -> Option<&str> {
        let first = self.points.first()?;
        let hash = (self.hash)(key);
        let owner = self
            .points
            .iter()
            .find(|(point, _)| *point >= hash)
            .unwrap_or(first);
        Some(owner.1.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn first_byte(data: &[u8]) -> u32 {
        data.first().copied().map_or(0, u32::from)
    }

    #[test]
    fn test_empty_ring() {
        let ring = ConsistentHash::new();
        assert!(ring.is_empty());
        assert_eq!(ring.pick_node(b"key"), None);
    }

    #[test]
    fn test_skips_empty_and_duplicate_nodes() {
        let ring = ConsistentHash::from_nodes(["a:1", "", "b:2", "a:1"]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_successor_and_wraparound() {
        let mut ring = ConsistentHash::with_hasher(first_byte);
        ring.add_nodes(["m", "c", "x"]);
        assert_eq!(ring.nodes().collect::<Vec<_>>(), vec!["c", "m", "x"]);

        assert_eq!(ring.pick_node(b"a"), Some("c"));
        assert_eq!(ring.pick_node(b"c"), Some("c"));
        assert_eq!(ring.pick_node(b"d"), Some("m"));
        assert_eq!(ring.pick_node(b"n"), Some("x"));
        assert_eq!(ring.pick_node(b"z"), Some("c"));
    }

    #[test]
    fn test_single_node_owns_everything() {
        let ring = ConsistentHash::from_nodes(["only:1"]);
        assert_eq!(ring.pick_node(b"a"), Some("only:1"));
        assert_eq!(ring.pick_node(b""), Some("only:1"));
    }

    proptest! {
        #[test]
        fn pick_node_is_stable(
            nodes in proptest::collection::vec("[a-z]{1,8}:[0-9]{2,5}", 1..8),
            key in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let ring = ConsistentHash::from_nodes(nodes.clone());
            let owner = ring.pick_node(&key).map(str::to_owned);
            prop_assert!(owner.is_some());
            prop_assert_eq!(ring.pick_node(&key).map(str::to_owned), owner.clone());

            let rebuilt = ConsistentHash::from_nodes(nodes.into_iter().rev());
            prop_assert_eq!(rebuilt.pick_node(&key).map(str::to_owned), owner);
        }
    }
}
