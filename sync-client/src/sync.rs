//! Delta synchronization against the service-held version.
//!
//! The local [`SyncState`] only ever moves to a version the service
//! reported: either through an explicit snapshot read or through the
//! snapshot echoed after an accepted delta.

use spacesync_core::{calculate_backoff, SyncState};
use spacesync_types::wire::{ConflictBody, Snapshot};
use spacesync_types::{ActorId, Delta, Operation, SessionId, SpaceId, SyncError, Version};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::SpaceApi;
use crate::transport::{Transport, TransportError};

/// Delta submission errors.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The service holds a different version than the delta was built against.
    #[error(
        "version conflict: delta from {from_version}, service at {}",
        display_version(.current_version)
    )]
    Conflict {
        /// Version the rejected delta was built against.
        from_version: Version,
        /// Version reported by the service, if it said.
        current_version: Option<Version>,
    },

    /// The delta was structurally invalid and never sent.
    #[error("invalid delta: {0}")]
    Invalid(#[from] SyncError),

    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

fn display_version(version: &Option<Version>) -> String {
    version.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

impl SubmitError {
    /// Whether a refresh-and-retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Invalid(_) => false,
            Self::Transport(e) => e.is_retryable(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builds, submits and reconciles deltas for one joined session.
#[derive(Debug)]
pub struct DeltaSynchronizer<T> {
    api: SpaceApi<T>,
    space: SpaceId,
    actor: ActorId,
    session: SessionId,
    state: Mutex<SyncState>,
}

impl<T: Transport> DeltaSynchronizer<T> {
    /// Create a synchronizer at version zero.
    ///
    /// Call [`refresh`](Self::refresh) before the first submission to adopt
    /// the service's version.
    pub fn new(api: SpaceApi<T>, space: SpaceId, actor: ActorId, session: SessionId) -> Self {
        Self {
            api,
            space,
            actor,
            session,
            state: Mutex::new(SyncState::new()),
        }
    }

    /// Space this synchronizer writes to.
    pub fn space(&self) -> &SpaceId {
        &self.space
    }

    /// Session deltas are submitted from.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Copy of the current local state.
    pub async fn state(&self) -> SyncState {
        self.state.lock().await.clone()
    }

    /// Read the snapshot and adopt its version.
    pub async fn refresh(&self) -> Result<Version, TransportError> {
        Ok(self.refresh_snapshot().await?.version)
    }

    /// Like [`refresh`](Self::refresh), returning the whole snapshot.
    pub async fn refresh_snapshot(&self) -> Result<Snapshot, TransportError> {
        let mut state = self.state.lock().await;
        let snapshot = self.api.snapshot(&self.space).await?;
        state.refreshed(snapshot.version);
        tracing::debug!("Refreshed {} at version {}", self.space, snapshot.version);
        Ok(snapshot)
    }

    /// Refresh, build and submit a delta carrying `operations`.
    ///
    /// Returns the version the service reported after accepting the delta.
    pub async fn submit(&self, operations: Vec<Operation>) -> Result<Version, SubmitError> {
        let mut state = self.state.lock().await;

        let snapshot = self.api.snapshot(&self.space).await?;
        state.refreshed(snapshot.version);

        let delta = state.build_delta(
            operations,
            self.actor.clone(),
            self.session.clone(),
            now_ms(),
        )?;
        self.post(&mut state, delta).await
    }

    /// Submit a pre-built delta without refreshing first.
    pub async fn submit_delta(&self, delta: Delta) -> Result<Version, SubmitError> {
        let mut state = self.state.lock().await;
        self.post(&mut state, delta).await
    }

    /// Like [`submit`](Self::submit), retrying conflicts and retryable
    /// transport failures with jittered backoff.
    pub async fn submit_with_retry(
        &self,
        operations: Vec<Operation>,
        max_attempts: u32,
    ) -> Result<Version, SubmitError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.submit(operations.clone()).await {
                Ok(version) => return Ok(version),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = calculate_backoff(attempt);
                    tracing::debug!(
                        "Submit attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(&self, state: &mut SyncState, delta: Delta) -> Result<Version, SubmitError> {
        delta.validate()?;

        match self.api.submit_delta(&self.space, &delta).await {
            Ok(snapshot) => {
                state.acknowledged(snapshot.version);
                tracing::debug!(
                    "Delta {} -> {} accepted, service at {}",
                    delta.from_version,
                    delta.to_version,
                    snapshot.version
                );
                Ok(snapshot.version)
            }
            Err(e) if e.is_conflict() => {
                let current_version = match &e {
                    TransportError::Status { body, .. } => {
                        serde_json::from_value::<ConflictBody>(body.clone())
                            .ok()
                            .and_then(|c| c.current_version)
                    }
                    _ => None,
                };
                tracing::warn!(
                    "Delta from {} rejected, service at {}",
                    delta.from_version,
                    display_version(&current_version)
                );
                Err(SubmitError::Conflict {
                    from_version: delta.from_version,
                    current_version,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
