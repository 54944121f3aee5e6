//! Discovered peer records.

use spacesync_types::wire::SessionEntry;
use spacesync_types::{ActorId, PeerId, SessionId};

use crate::scoring::PeerScore;

/// A discovered counterpart.
///
/// Created the first time a peer shows up in a telemetry snapshot, then
/// updated in place. Records are never removed; a peer that disappears from
/// the snapshot is only marked offline.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
    /// Actor id of the peer.
    pub peer_id: PeerId,
    /// Display name reported by the service.
    pub display_name: String,
    /// Whether the peer was online in the latest snapshot.
    pub online: bool,
    /// Whether an entanglement with this peer was approved.
    pub linked: bool,
    /// Similarity score in `[0, 1]`.
    pub similarity: f64,
    /// Quality score in `[0, 1]`.
    pub quality: f64,
    /// Last time the peer was seen, in milliseconds since the Unix epoch.
    pub last_seen: u64,
    /// Session the peer was last seen through.
    pub source_session_id: SessionId,
}

impl PeerRecord {
    /// Materialize a newly seen peer.
    pub fn discovered(entry: &SessionEntry, score: PeerScore, now_ms: u64) -> Self {
        Self {
            peer_id: entry.actor_id.clone(),
            display_name: display_name_of(entry),
            online: entry.online,
            linked: false,
            similarity: score.similarity,
            quality: score.quality,
            last_seen: seen_at(entry, now_ms),
            source_session_id: entry.session_id.clone(),
        }
    }

    /// Update from a later snapshot entry. Scores are kept.
    ///
    /// Returns true if any observable field changed.
    pub fn observe(&mut self, entry: &SessionEntry, now_ms: u64) -> bool {
        let before = (
            self.display_name.clone(),
            self.online,
            self.source_session_id.clone(),
        );

        self.display_name = display_name_of(entry);
        self.online = entry.online;
        self.source_session_id = entry.session_id.clone();
        self.last_seen = self.last_seen.max(seen_at(entry, now_ms));

        before != (
            self.display_name.clone(),
            self.online,
            self.source_session_id.clone(),
        )
    }

    /// Mark the peer offline because it was absent from the latest snapshot.
    ///
    /// Returns true if the peer was online before.
    pub fn mark_absent(&mut self) -> bool {
        std::mem::replace(&mut self.online, false)
    }
}

/// Whether a snapshot entry belongs to someone other than the local client.
pub fn is_remote(entry: &SessionEntry, local_actor: &ActorId, local_session: &SessionId) -> bool {
    &entry.session_id != local_session && &entry.actor_id != local_actor
}

fn display_name_of(entry: &SessionEntry) -> String {
    if entry.display_name.trim().is_empty() {
        entry.actor_id.to_string()
    } else {
        entry.display_name.clone()
    }
}

fn seen_at(entry: &SessionEntry, now_ms: u64) -> u64 {
    if entry.last_seen == 0 {
        now_ms
    } else {
        entry.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{score_peer, ScoringParams};

    fn entry(session: &str, actor: &str, name: &str) -> SessionEntry {
        SessionEntry {
            session_id: session.into(),
            actor_id: actor.into(),
            display_name: name.to_string(),
            online: true,
            last_seen: 0,
        }
    }

    #[test]
    fn discovered_copies_entry_and_score() {
        let score = score_peer(Some(0.5), &ScoringParams::default());
        let record = PeerRecord::discovered(&entry("s2", "bob", "Bob"), score, 1_000);

        assert_eq!(record.peer_id.as_str(), "bob");
        assert_eq!(record.display_name, "Bob");
        assert!(record.online);
        assert!(!record.linked);
        assert_eq!(record.similarity, score.similarity);
        assert_eq!(record.last_seen, 1_000);
    }

    #[test]
    fn missing_display_name_falls_back_to_actor() {
        let score = score_peer(None, &ScoringParams::default());
        let record = PeerRecord::discovered(&entry("s2", "bob", " "), score, 1);
        assert_eq!(record.display_name, "bob");
    }

    #[test]
    fn observe_updates_in_place_and_keeps_scores() {
        let score = score_peer(Some(0.3), &ScoringParams::default());
        let mut record = PeerRecord::discovered(&entry("s2", "bob", "Bob"), score, 1_000);
        record.linked = true;

        let mut later = entry("s3", "bob", "Bob");
        later.online = false;
        assert!(record.observe(&later, 2_000));

        assert_eq!(record.source_session_id.as_str(), "s3");
        assert!(!record.online);
        assert!(record.linked);
        assert_eq!(record.similarity, score.similarity);
        assert_eq!(record.last_seen, 2_000);
    }

    #[test]
    fn observe_same_entry_reports_no_change() {
        let score = score_peer(Some(0.3), &ScoringParams::default());
        let e = entry("s2", "bob", "Bob");
        let mut record = PeerRecord::discovered(&e, score, 1_000);
        assert!(!record.observe(&e, 1_500));
        assert_eq!(record.last_seen, 1_500);
    }

    #[test]
    fn mark_absent_reports_transition_once() {
        let score = score_peer(None, &ScoringParams::default());
        let mut record = PeerRecord::discovered(&entry("s2", "bob", "Bob"), score, 1);
        assert!(record.mark_absent());
        assert!(!record.mark_absent());
    }

    #[test]
    fn local_entries_are_not_remote() {
        let me: ActorId = "me".into();
        let my_session: SessionId = "s1".into();

        assert!(!is_remote(&entry("s1", "me", ""), &me, &my_session));
        assert!(!is_remote(&entry("s9", "me", ""), &me, &my_session));
        assert!(!is_remote(&entry("s1", "other", ""), &me, &my_session));
        assert!(is_remote(&entry("s2", "bob", ""), &me, &my_session));
    }
}
