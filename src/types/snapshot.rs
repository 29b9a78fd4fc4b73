use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// a snapshot: a root tree plus where and when it was taken
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// root tree hash
    pub tree: Hash,
    /// previous snapshot(s) of the same ref
    pub parents: Vec<Hash>,
    /// host the snapshot was taken on
    #[serde(default)]
    pub hostname: String,
    /// source directory that was ingested
    #[serde(default)]
    pub source: String,
    /// unix timestamp (seconds since epoch)
    pub timestamp: i64,
    pub message: String,
}

impl Snapshot {
    /// create a new snapshot stamped with the current time
    pub fn new(tree: Hash, parents: Vec<Hash>, message: impl Into<String>) -> Self {
        Self::with_timestamp(tree, parents, chrono::Utc::now().timestamp(), message)
    }

    /// create a new snapshot with explicit timestamp
    pub fn with_timestamp(
        tree: Hash,
        parents: Vec<Hash>,
        timestamp: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            hostname: String::new(),
            source: String::new(),
            timestamp,
            message: message.into(),
        }
    }

    /// record the origin of the snapshot
    pub fn with_origin(mut self, hostname: impl Into<String>, source: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self.source = source.into();
        self
    }

    /// is this the first snapshot of its ref
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_new() {
        let s = Snapshot::new(Hash::ZERO, vec![], "message");
        assert_eq!(s.tree, Hash::ZERO);
        assert!(s.is_root());
        assert_eq!(s.message, "message");
        assert!(s.timestamp > 0);
    }

    #[test]
    fn test_snapshot_with_parent() {
        let parent = Hash::of(b"parent");
        let s = Snapshot::new(Hash::ZERO, vec![parent], "second");
        assert!(!s.is_root());
    }

    #[test]
    fn test_snapshot_cbor_roundtrip() {
        let s = Snapshot::with_timestamp(Hash::ZERO, vec![], 1234567890, "message")
            .with_origin("host", "/srv/data");

        let mut bytes = Vec::new();
        ciborium::into_writer(&s, &mut bytes).unwrap();

        let parsed: Snapshot = ciborium::from_reader(&bytes[..]).unwrap();
        assert_eq!(s, parsed);
        assert_eq!(parsed.hostname, "host");
        assert_eq!(parsed.source, "/srv/data");
    }
}
