//! Deltas - atomic, versioned mutations of a shared space.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ActorId, SessionId, SyncError, Version};

/// A single operation inside a [`Delta`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation kind (e.g. `set`, `deliver`, `link`).
    pub op: String,
    /// Path inside the shared state the operation targets.
    pub path: String,
    /// Value written at `path`, if any.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Free-form string metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl Operation {
    /// Create an operation with no value and no metadata.
    pub fn new(op: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            path: path.into(),
            value: serde_json::Value::Null,
            meta: BTreeMap::new(),
        }
    }

    /// Set the operation value.
    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// An atomic proposed change to a shared space.
///
/// The service accepts or rejects a delta as a whole. A delta always moves
/// the space forward by exactly one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// Version the delta was built against.
    pub from_version: Version,
    /// Version the delta produces (`from_version + 1`).
    pub to_version: Version,
    /// Snapshot of the author's causal vector after its local increment.
    pub causal_vector: Vec<u64>,
    /// Ordered operations applied atomically.
    pub operations: Vec<Operation>,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Actor that authored the delta.
    pub author_id: ActorId,
    /// Session the delta was submitted from.
    pub session_id: SessionId,
}

impl Delta {
    /// Check the structural invariants of this delta.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.from_version.next() != Some(self.to_version) {
            return Err(SyncError::InvalidDelta(format!(
                "toVersion {} must equal fromVersion {} + 1",
                self.to_version, self.from_version
            )));
        }
        if self.operations.is_empty() {
            return Err(SyncError::InvalidDelta("no operations".into()));
        }
        Ok(())
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(from: u64, to: u64) -> Delta {
        Delta {
            from_version: Version::new(from),
            to_version: Version::new(to),
            causal_vector: vec![3],
            operations: vec![Operation::new("set", "/title").with_value("hello".into())],
            timestamp: 1_705_000_000_000,
            author_id: ActorId::from("actor-1"),
            session_id: SessionId::from("sess-1"),
        }
    }

    #[test]
    fn valid_delta_passes() {
        assert!(sample(5, 6).validate().is_ok());
    }

    #[test]
    fn skipping_versions_is_rejected() {
        let err = sample(5, 7).validate().unwrap_err();
        assert!(matches!(err, SyncError::InvalidDelta(_)));
    }

    #[test]
    fn delta_from_max_version_is_rejected() {
        let delta = sample(u64::MAX, 0);
        assert!(matches!(delta.validate(), Err(SyncError::InvalidDelta(_))));

        let delta = sample(u64::MAX, u64::MAX);
        assert!(delta.validate().is_err());
    }

    #[test]
    fn empty_operations_rejected() {
        let mut delta = sample(1, 2);
        delta.operations.clear();
        assert!(delta.validate().is_err());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(sample(5, 6)).unwrap();
        assert_eq!(json["fromVersion"], 5);
        assert_eq!(json["toVersion"], 6);
        assert_eq!(json["causalVector"], serde_json::json!([3]));
        assert_eq!(json["authorId"], "actor-1");
        assert_eq!(json["sessionId"], "sess-1");
    }

    #[test]
    fn operation_meta_omitted_when_empty() {
        let json = serde_json::to_value(Operation::new("set", "/a")).unwrap();
        assert!(json.get("meta").is_none());

        let json = serde_json::to_value(Operation::new("set", "/a").with_meta("k", "v")).unwrap();
        assert_eq!(json["meta"]["k"], "v");
    }

    #[test]
    fn bytes_roundtrip() {
        let delta = sample(1, 2);
        let restored = Delta::from_bytes(&delta.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, delta);
    }
}
