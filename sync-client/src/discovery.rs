//! Peer discovery by polling session telemetry.
//!
//! There is no push channel: a background task reads the active sessions of
//! the space on a fixed interval and diffs them against the [`PeerTable`].
//! Newly seen peers are scored once and announced on a broadcast channel.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use spacesync_core::peers::is_remote;
use spacesync_core::{score_peer, PeerRecord, ScoringParams};
use spacesync_types::{ActorId, PeerId, SessionId, SpaceId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::api::SpaceApi;
use crate::delivery::Entanglements;
use crate::sync::now_ms;
use crate::transport::{Transport, TransportError};

/// Events published by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// A peer was seen for the first time.
    PeerDiscovered(PeerRecord),
    /// A known peer changed (presence, session or name).
    PeerUpdated(PeerId),
}

/// Shared table of discovered peers.
///
/// Clones share the same table. Records are never removed.
#[derive(Debug, Clone, Default)]
pub struct PeerTable {
    peers: Arc<DashMap<PeerId, PeerRecord>>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a peer.
    pub fn get(&self, peer: &PeerId) -> Option<PeerRecord> {
        self.peers.get(peer).map(|r| r.value().clone())
    }

    /// Whether a peer is known.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    /// All peers, ordered by id.
    pub fn list(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self.peers.iter().map(|r| r.value().clone()).collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer is known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Mark a peer as linked. Returns false if the peer is unknown.
    pub fn set_linked(&self, peer: &PeerId) -> bool {
        match self.peers.get_mut(peer) {
            Some(mut record) => {
                record.linked = true;
                true
            }
            None => false,
        }
    }

    fn insert(&self, record: PeerRecord) {
        self.peers.insert(record.peer_id.clone(), record);
    }
}

/// Changes applied by one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Peers seen for the first time.
    pub discovered: Vec<PeerId>,
    /// Known peers whose record changed.
    pub updated: Vec<PeerId>,
}

/// Polls session telemetry and maintains the peer table.
pub struct DiscoveryPoller<T> {
    api: SpaceApi<T>,
    space: SpaceId,
    actor: ActorId,
    session: SessionId,
    table: PeerTable,
    events: broadcast::Sender<DiscoveryEvent>,
    scoring: ScoringParams,
    links: Entanglements,
    context_tags: Vec<String>,
    interval: Duration,
}

impl<T> Clone for DiscoveryPoller<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            space: self.space.clone(),
            actor: self.actor.clone(),
            session: self.session.clone(),
            table: self.table.clone(),
            events: self.events.clone(),
            scoring: self.scoring,
            links: Arc::clone(&self.links),
            context_tags: self.context_tags.clone(),
            interval: self.interval,
        }
    }
}

impl<T: Transport + 'static> DiscoveryPoller<T> {
    /// Create a poller for the session `session` of `actor` in `space`.
    pub fn new(
        api: SpaceApi<T>,
        space: SpaceId,
        actor: ActorId,
        session: SessionId,
        table: PeerTable,
        events: broadcast::Sender<DiscoveryEvent>,
    ) -> Self {
        Self {
            api,
            space,
            actor,
            session,
            table,
            events,
            scoring: ScoringParams::default(),
            links: Entanglements::default(),
            context_tags: Vec::new(),
            interval: Duration::from_secs(3),
        }
    }

    /// Set the tags sent with resonance requests.
    pub fn with_context_tags(mut self, tags: Vec<String>) -> Self {
        self.context_tags = tags;
        self
    }

    /// Set the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Peers already linked to; newly discovered ones are marked linked.
    pub fn with_links(mut self, links: Entanglements) -> Self {
        self.links = links;
        self
    }

    /// The peer table this poller writes to.
    pub fn table(&self) -> &PeerTable {
        &self.table
    }

    /// Run one poll.
    pub async fn poll_once(&self) -> Result<PollReport, TransportError> {
        let stats = self.api.stats(&self.space).await?;
        let now = now_ms();
        let mut report = PollReport::default();
        let mut seen = HashSet::new();

        for entry in stats
            .active_sessions
            .iter()
            .filter(|e| is_remote(e, &self.actor, &self.session))
        {
            seen.insert(entry.actor_id.clone());

            if !self.table.contains(&entry.actor_id) {
                let score = score_peer(self.baseline(&entry.display_name).await, &self.scoring);
                let mut record = PeerRecord::discovered(entry, score, now);
                record.linked = self.links.contains(&entry.actor_id);
                // A concurrent poll may have inserted it meanwhile.
                match self.table.peers.entry(entry.actor_id.clone()) {
                    Entry::Vacant(slot) => {
                        tracing::info!(
                            "Discovered peer {} ({}), similarity {:.2}",
                            record.display_name,
                            record.peer_id,
                            record.similarity
                        );
                        slot.insert(record.clone());
                        report.discovered.push(record.peer_id.clone());
                        let _ = self.events.send(DiscoveryEvent::PeerDiscovered(record));
                        continue;
                    }
                    Entry::Occupied(_) => {}
                }
            }

            let changed = self
                .table
                .peers
                .get_mut(&entry.actor_id)
                .map(|mut record| record.observe(entry, now))
                .unwrap_or(false);
            if changed && !report.updated.contains(&entry.actor_id) {
                report.updated.push(entry.actor_id.clone());
            }
        }

        for mut record in self.table.peers.iter_mut() {
            if !seen.contains(record.key()) && record.mark_absent() {
                tracing::debug!("Peer {} went offline", record.key());
                report.updated.push(record.key().clone());
            }
        }

        for peer in &report.updated {
            let _ = self.events.send(DiscoveryEvent::PeerUpdated(peer.clone()));
        }

        tracing::debug!(
            "Poll of {}: {} sessions, {} new, {} updated",
            self.space,
            stats.active_sessions.len(),
            report.discovered.len(),
            report.updated.len()
        );
        Ok(report)
    }

    /// Baseline similarity from the resonance service, `None` if unavailable.
    async fn baseline(&self, concept: &str) -> Option<f64> {
        match self.api.encode(concept, &self.context_tags).await {
            Ok(resonance) => Some(resonance),
            Err(e) => {
                tracing::warn!("Resonance unavailable, using default similarity: {}", e);
                None
            }
        }
    }

    /// Spawn the background polling task.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tracing::info!(
                "Discovery poller started for {} (interval: {:?})",
                self.space,
                self.interval
            );

            let mut timer = interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        if let Err(e) = self.poll_once().await {
                            tracing::warn!("Discovery tick failed: {}", e);
                        }
                    }
                }
            }

            tracing::info!("Discovery poller stopped for {}", self.space);
        });

        PollerHandle { shutdown_tx, task }
    }
}

/// Handle to a running poller.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop issuing ticks. An in-flight poll is allowed to finish.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Discovery poller panicked: {}", e);
        }
    }
}
