//! Space acquisition: find a named space or create it, race-free.
//!
//! ```text
//! list (up to N times) --found--> oldest match
//!        |
//!        v (none)
//! create (Idempotency-Key) --ok--> confirmation list --> oldest match
//!        |
//!        v (failed, 409 included)
//! final list --found--> oldest match
//!        |
//!        v
//!    Exhausted
//! ```
//!
//! Every acquirer applies [`select_oldest`] to what it lists, so concurrent
//! acquirers of one name converge on the same space even if the service
//! let more than one creation through.

use spacesync_core::select_oldest;
use spacesync_types::{IdempotencyKey, SpaceHandle};
use std::time::Duration;
use thiserror::Error;

use crate::api::SpaceApi;
use crate::transport::Transport;

/// Acquisition errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Neither listing nor creation produced a space.
    #[error("could not acquire space '{name}': {reason}")]
    Exhausted {
        /// Space name.
        name: String,
        /// Last failure seen.
        reason: String,
    },
}

/// Finds or creates a named space.
#[derive(Debug, Clone)]
pub struct SpaceAcquirer<T> {
    api: SpaceApi<T>,
    list_attempts: u32,
    retry_delay: Duration,
}

impl<T: Transport> SpaceAcquirer<T> {
    /// Create an acquirer.
    ///
    /// `list_attempts` is raised to at least one.
    pub fn new(api: SpaceApi<T>, list_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            api,
            list_attempts: list_attempts.max(1),
            retry_delay,
        }
    }

    /// Acquire the space named `name`.
    pub async fn acquire(&self, name: &str) -> Result<SpaceHandle, AcquisitionError> {
        for attempt in 1..=self.list_attempts {
            match self.api.list_spaces(name).await {
                Ok(spaces) => {
                    if let Some(space) = select_oldest(&spaces, name) {
                        tracing::info!("Found space '{}' ({})", name, space.id);
                        return Ok(space);
                    }
                    tracing::debug!("No space named '{}' (attempt {})", name, attempt);
                }
                Err(e) => {
                    tracing::warn!("Listing spaces failed (attempt {}): {}", attempt, e);
                }
            }

            if attempt < self.list_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        let key = IdempotencyKey::for_space(name);
        match self.api.create_space(name, &key).await {
            Ok(created) => {
                tracing::info!("Created space '{}' ({})", name, created.id);
                Ok(self.confirm(name, created).await)
            }
            Err(e) => {
                tracing::warn!("Creating space '{}' failed: {}", name, e);
                let reason = e.to_string();
                match self.api.list_spaces(name).await {
                    Ok(spaces) => select_oldest(&spaces, name).ok_or(AcquisitionError::Exhausted {
                        name: name.to_string(),
                        reason,
                    }),
                    Err(list_err) => Err(AcquisitionError::Exhausted {
                        name: name.to_string(),
                        reason: format!("{}; final listing failed: {}", reason, list_err),
                    }),
                }
            }
        }
    }

    /// Re-list after a successful creation and keep the oldest match.
    async fn confirm(&self, name: &str, created: SpaceHandle) -> SpaceHandle {
        match self.api.list_spaces(name).await {
            Ok(mut spaces) => {
                spaces.push(created.clone());
                let winner = select_oldest(&spaces, name).unwrap_or(created);
                tracing::debug!("Confirmed space '{}' as {}", name, winner.id);
                winner
            }
            Err(e) => {
                tracing::warn!("Confirmation listing failed, keeping created space: {}", e);
                created
            }
        }
    }
}
