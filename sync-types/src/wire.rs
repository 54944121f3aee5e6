//! JSON bodies exchanged with the space service.
//!
//! All field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::{ActorId, SessionId, SpaceId, Version};

/// Handle to a shared space (`GET /spaces`, `POST /spaces`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceHandle {
    /// Service-assigned identifier.
    pub id: SpaceId,
    /// Human-readable name the space was created under.
    pub name: String,
    /// Service-assigned creation ordering key.
    pub created_at: u64,
}

/// Body of `POST /spaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSpace {
    /// Name of the space to create.
    pub name: String,
}

/// Body of `POST /spaces/{id}/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Actor joining the space.
    pub actor_id: ActorId,
    /// Name shown to other participants.
    pub display_name: String,
}

/// Response of `POST /spaces/{id}/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Session assigned to this client.
    pub session_id: SessionId,
}

/// Phase metadata attached to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase coherence of the space in `[0, 1]`.
    pub coherence: f64,
}

/// Response of `GET /spaces/{id}/snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Authoritative version of the space.
    pub version: Version,
    /// Opaque shared state.
    #[serde(default)]
    pub state: serde_json::Value,
    /// Phase data, when the service tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

/// One active session in a telemetry snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Session identifier.
    pub session_id: SessionId,
    /// Actor owning the session.
    pub actor_id: ActorId,
    /// Display name of the actor.
    #[serde(default)]
    pub display_name: String,
    /// Whether the session is currently connected.
    #[serde(default = "default_online")]
    pub online: bool,
    /// Last activity in milliseconds since the Unix epoch.
    #[serde(default)]
    pub last_seen: u64,
}

fn default_online() -> bool {
    true
}

/// Response of `GET /spaces/{id}/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Sessions currently attached to the space.
    #[serde(default)]
    pub active_sessions: Vec<SessionEntry>,
}


/// Response of a successful `POST /spaces/{id}/deltas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaAck {
    /// The new authoritative snapshot.
    pub snapshot: Snapshot,
}

/// Error body returned with a 409 on `POST /spaces/{id}/deltas`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    /// Human-readable reason.
    #[serde(default)]
    pub error: String,
    /// Version the service currently holds.
    #[serde(default)]
    pub current_version: Option<Version>,
}

/// Body of `POST /resonance/encode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    /// Concept text to encode (a peer's display name).
    pub concept: String,
    /// Fixed contextual tags.
    pub tags: Vec<String>,
}

/// Response of `POST /resonance/encode`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodeResponse {
    /// Similarity of the concept to the local context.
    pub resonance: f64,
}

/// Body of `POST /advisory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    /// Local actor.
    pub from: ActorId,
    /// Peer being evaluated.
    pub to: ActorId,
    /// Current similarity score of the peer.
    pub similarity: f64,
}

/// Response of `POST /advisory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    /// Free-text guidance.
    pub guidance: String,
}

/// Body of `POST /simulation/run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Local actor.
    pub from: ActorId,
    /// Peer being evaluated.
    pub to: ActorId,
    /// Current similarity score of the peer.
    pub similarity: f64,
    /// Phase coherence read from the latest snapshot.
    pub phase_coherence: f64,
}

/// Response of `POST /simulation/run`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResponse {
    /// Simulated link strength in `[0, 1]`.
    pub strength: f64,
}

/// Body of `POST /spaces/{id}/channels/enhanced`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedSend {
    /// Sender actor.
    pub from: ActorId,
    /// Receiver actor.
    pub to: ActorId,
    /// Payload text.
    pub payload: String,
}

/// Response of `POST /spaces/{id}/channels/enhanced`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnhancedAck {
    /// Transfer fidelity reported by the channel.
    #[serde(default)]
    pub fidelity: Option<f64>,
}

/// Body of `POST /sessions/{sid}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSend {
    /// Receiver actor.
    pub to: ActorId,
    /// Message body.
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn space_handle_from_service_json() {
        let handle: SpaceHandle =
            serde_json::from_value(json!({"id": "sp_1", "name": "demo", "createdAt": 17}))
                .unwrap();
        assert_eq!(handle.id.as_str(), "sp_1");
        assert_eq!(handle.created_at, 17);
    }

    #[test]
    fn session_entry_defaults() {
        let entry: SessionEntry =
            serde_json::from_value(json!({"sessionId": "s1", "actorId": "a1"})).unwrap();
        assert!(entry.online);
        assert_eq!(entry.last_seen, 0);
        assert!(entry.display_name.is_empty());
    }

    #[test]
    fn snapshot_without_phase() {
        let snap: Snapshot = serde_json::from_value(json!({"version": 4})).unwrap();
        assert_eq!(snap.version, Version::new(4));
        assert!(snap.phase.is_none());
        assert!(snap.state.is_null());
    }

    #[test]
    fn conflict_body_tolerates_missing_version() {
        let body: ConflictBody = serde_json::from_value(json!({"error": "stale"})).unwrap();
        assert!(body.current_version.is_none());

        let body: ConflictBody =
            serde_json::from_value(json!({"error": "stale", "currentVersion": 6})).unwrap();
        assert_eq!(body.current_version, Some(Version::new(6)));
    }
}
