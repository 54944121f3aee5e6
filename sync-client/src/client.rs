//! SpaceClient - the main interface for spacesync.
//!
//! This module provides [`SpaceClient`], the primary API for applications
//! to coordinate through a shared space.
//!
//! # Architecture
//!
//! SpaceClient owns every component and wires them to one acquired space
//! and one joined session. Pure logic lives in sync-core; I/O goes through
//! the Transport trait.
//!
//! ```text
//! Application → SpaceClient → SpaceApi → Transport → Service
//!                   ↓
//!   acquire · sync · discovery · decision · delivery
//!                   ↓
//!              sync-core (pure formulas and state machines)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spacesync_client::{ClientConfig, MockTransport, SpaceClient};
//!
//! let config = ClientConfig::default();
//! let client = SpaceClient::connect(config, MockTransport::new(), "demo-space").await?;
//! client.poll_once().await?;
//! for peer in client.peers() {
//!     let outcome = client.send(&peer.peer_id, "hello").await?;
//!     println!("{} via {}", peer.display_name, outcome.stage);
//! }
//! ```

use spacesync_core::{link_operation, linked_peers, DecisionResult, PeerRecord, SyncState};
use spacesync_types::wire::{JoinRequest, SpaceHandle};
use spacesync_types::{ActorId, Operation, PeerId, SessionId, Version};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::acquire::{AcquisitionError, SpaceAcquirer};
use crate::api::SpaceApi;
use crate::config::ClientConfig;
use crate::decision::{DecisionEngine, DecisionOptions};
use crate::delivery::{DeliveryOutcome, DeliveryPipeline, Entanglements, Outbox};
use crate::discovery::{DiscoveryEvent, DiscoveryPoller, PeerTable, PollReport, PollerHandle};
use crate::sync::{DeltaSynchronizer, SubmitError};
use crate::transport::{Transport, TransportError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The space could not be acquired.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Delta submission failed.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// The peer has not been discovered.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),
}

/// Result of [`SpaceClient::link`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkOutcome {
    /// Decision the link was gated on.
    pub decision: DecisionResult,
    /// Version produced by the link delta. `None` if the link was refused or
    /// recording it failed.
    pub coordination_version: Option<Version>,
}

/// The main spacesync client.
///
/// Bound to one space and one session for its whole lifetime.
pub struct SpaceClient<T: Transport + 'static> {
    config: ClientConfig,
    space: SpaceHandle,
    session: SessionId,
    sync: Arc<DeltaSynchronizer<T>>,
    table: PeerTable,
    events: broadcast::Sender<DiscoveryEvent>,
    poller: DiscoveryPoller<T>,
    poller_handle: Mutex<Option<PollerHandle>>,
    decision: DecisionEngine<T>,
    pipeline: DeliveryPipeline<T>,
    entanglements: Entanglements,
}

impl<T: Transport + 'static> SpaceClient<T> {
    /// Acquire the space `name`, join it and read its version.
    ///
    /// Links this actor recorded in earlier runs are read back from the
    /// snapshot state, so linked peers keep the enhanced channel.
    pub async fn connect(
        config: ClientConfig,
        transport: T,
        name: &str,
    ) -> Result<Self, ClientError> {
        let api = SpaceApi::new(Arc::new(transport), config.api_timeouts());
        let actor = config.identity.actor_id.clone();

        let space = SpaceAcquirer::new(
            api.clone(),
            config.acquisition.list_attempts,
            config.retry_delay(),
        )
        .acquire(name)
        .await?;

        let session = api
            .join(
                &space.id,
                &JoinRequest {
                    actor_id: actor.clone(),
                    display_name: config.identity.display_name.clone(),
                },
            )
            .await?;
        tracing::info!(
            "Joined space '{}' ({}) as session {}",
            space.name,
            space.id,
            session
        );

        let sync = Arc::new(DeltaSynchronizer::new(
            api.clone(),
            space.id.clone(),
            actor.clone(),
            session.clone(),
        ));
        let snapshot = sync.refresh_snapshot().await?;

        // Links recorded by earlier runs of this actor.
        let entanglements = Entanglements::default();
        for peer in linked_peers(&snapshot.state, &actor) {
            entanglements.insert(peer);
        }
        if !entanglements.is_empty() {
            tracing::info!("Restored {} link(s) from {}", entanglements.len(), space.id);
        }

        let table = PeerTable::new();
        let (events, _) = broadcast::channel(config.discovery.event_capacity.max(1));
        let poller = DiscoveryPoller::new(
            api.clone(),
            space.id.clone(),
            actor.clone(),
            session.clone(),
            table.clone(),
            events.clone(),
        )
        .with_context_tags(config.discovery.context_tags.clone())
        .with_interval(config.poll_interval())
        .with_links(Arc::clone(&entanglements));

        let decision = DecisionEngine::new(
            api.clone(),
            space.id.clone(),
            actor.clone(),
            DecisionOptions {
                advisory: config.decision.advisory,
                simulate: config.decision.simulate,
            },
        );

        let pipeline = DeliveryPipeline::new(
            api,
            Arc::clone(&sync),
            actor,
            Arc::clone(&entanglements),
            Outbox::new(config.delivery.outbox_capacity),
        )
        .with_coordination_attempts(config.delivery.coordination_attempts);

        Ok(Self {
            config,
            space,
            session,
            sync,
            table,
            events,
            poller,
            poller_handle: Mutex::new(None),
            decision,
            pipeline,
            entanglements,
        })
    }

    /// The acquired space.
    pub fn space(&self) -> &SpaceHandle {
        &self.space
    }

    /// The joined session.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// The local actor.
    pub fn actor(&self) -> &ActorId {
        &self.config.identity.actor_id
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// All discovered peers, ordered by id.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.table.list()
    }

    /// Look up a discovered peer.
    pub fn peer(&self, peer: &PeerId) -> Option<PeerRecord> {
        self.table.get(peer)
    }

    /// Subscribe to discovery events.
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }

    /// Run a single discovery poll in the caller's task.
    pub async fn poll_once(&self) -> Result<PollReport, ClientError> {
        Ok(self.poller.poll_once().await?)
    }

    /// Start background discovery. Returns false if it is already running.
    pub fn start_discovery(&self) -> bool {
        let mut handle = self.poller_handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        *handle = Some(self.poller.clone().spawn());
        true
    }

    /// Stop background discovery and wait for the task to exit.
    pub async fn stop_discovery(&self) {
        let handle = self
            .poller_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.shutdown();
            handle.join().await;
        }
    }

    // =========================================================================
    // Decisions
    // =========================================================================

    /// Evaluate whether linking to `peer` may proceed.
    pub async fn decide(&self, peer: &PeerId) -> Result<DecisionResult, ClientError> {
        let record = self
            .table
            .get(peer)
            .ok_or_else(|| ClientError::UnknownPeer(peer.clone()))?;
        Ok(self.decision.decide(&record).await)
    }

    /// Decide on `peer` and, if approved, record the link.
    ///
    /// An approved peer is marked linked and entangled even if recording the
    /// link delta fails.
    pub async fn link(&self, peer: &PeerId) -> Result<LinkOutcome, ClientError> {
        let decision = self.decide(peer).await?;
        if !decision.proceed {
            tracing::info!(
                "Link to {} refused (confidence {:.3})",
                peer,
                decision.confidence
            );
            return Ok(LinkOutcome {
                decision,
                coordination_version: None,
            });
        }

        self.table.set_linked(peer);
        self.entanglements.insert(peer.clone());

        let operation = link_operation(self.actor(), peer, decision.confidence);
        let coordination_version = match self
            .sync
            .submit_with_retry(vec![operation], self.config.delivery.coordination_attempts)
            .await
        {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!("Recording link to {} failed: {}", peer, e);
                None
            }
        };

        tracing::info!("Linked to {} (confidence {:.3})", peer, decision.confidence);
        Ok(LinkOutcome {
            decision,
            coordination_version,
        })
    }

    /// Whether a link to `peer` was approved.
    pub fn is_entangled(&self, peer: &PeerId) -> bool {
        self.entanglements.contains(peer)
    }

    // =========================================================================
    // Delivery and State
    // =========================================================================

    /// Deliver `payload` to a discovered peer.
    pub async fn send(
        &self,
        peer: &PeerId,
        payload: &str,
    ) -> Result<DeliveryOutcome, ClientError> {
        if !self.table.contains(peer) {
            return Err(ClientError::UnknownPeer(peer.clone()));
        }
        Ok(self.pipeline.deliver(peer, payload).await)
    }

    /// Submit operations to the shared space.
    pub async fn submit(&self, operations: Vec<Operation>) -> Result<Version, ClientError> {
        Ok(self.sync.submit(operations).await?)
    }

    /// Copy of the local sync state.
    pub async fn state(&self) -> SyncState {
        self.sync.state().await
    }

    /// Locally kept delivered payloads.
    pub fn outbox(&self) -> &Outbox {
        self.pipeline.outbox()
    }
}

impl<T: Transport + 'static> Drop for SpaceClient<T> {
    fn drop(&mut self) {
        let handle = self
            .poller_handle
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.shutdown();
        }
    }
}
