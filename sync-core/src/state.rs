//! Local view of a versioned space.
//!
//! [`SyncState`] holds the version last acknowledged by the service and the
//! local causal vector. It never invents versions: the only ways to move it
//! forward are [`SyncState::refreshed`] (a snapshot read) and
//! [`SyncState::acknowledged`] (a successful delta round trip), both of which
//! take the value reported by the service.

use spacesync_types::{ActorId, Delta, Operation, SessionId, SyncError, Version};

/// Per-actor counters expressing the order of locally originated changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CausalVector(Vec<u64>);

impl CausalVector {
    /// Create a vector with one zeroed counter per local actor.
    pub fn new(actors: usize) -> Self {
        Self(vec![0; actors.max(1)])
    }

    /// Increment the counter of the given local actor and return its new value.
    ///
    /// The vector grows if `actor` is beyond its current length.
    pub fn increment(&mut self, actor: usize) -> u64 {
        if actor >= self.0.len() {
            self.0.resize(actor + 1, 0);
        }
        self.0[actor] = self.0[actor].saturating_add(1);
        self.0[actor]
    }

    /// Get the counter of a local actor.
    pub fn get(&self, actor: usize) -> u64 {
        self.0.get(actor).copied().unwrap_or(0)
    }

    /// Get the counters in order.
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }
}

/// Local view of a versioned space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    version: Version,
    causal: CausalVector,
}

/// Index of the single local actor in the causal vector.
pub const LOCAL_ACTOR: usize = 0;

impl SyncState {
    /// Create a state at version zero with a single local actor.
    pub fn new() -> Self {
        Self::at(Version::zero())
    }

    /// Create a state at a version read from the service.
    pub fn at(version: Version) -> Self {
        Self {
            version,
            causal: CausalVector::new(1),
        }
    }

    /// Version last acknowledged by the service.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Current causal vector.
    pub fn causal_vector(&self) -> &CausalVector {
        &self.causal
    }

    /// Adopt the version returned by an explicit snapshot read.
    pub fn refreshed(&mut self, version: Version) {
        self.version = version;
    }

    /// Adopt the version echoed by the service after an accepted delta.
    pub fn acknowledged(&mut self, version: Version) {
        self.version = version;
    }

    /// Build the next delta against the held version.
    ///
    /// Increments the local causal counter before snapshotting it into the
    /// delta. The held version is left untouched until the service
    /// acknowledges the delta. Fails without touching the counter if the
    /// version cannot advance.
    pub fn build_delta(
        &mut self,
        operations: Vec<Operation>,
        author_id: ActorId,
        session_id: SessionId,
        timestamp: u64,
    ) -> Result<Delta, SyncError> {
        let to_version = self.version.next().ok_or_else(|| {
            SyncError::InvalidDelta(format!("version {} cannot advance", self.version))
        })?;
        self.causal.increment(LOCAL_ACTOR);
        Ok(Delta {
            from_version: self.version,
            to_version,
            causal_vector: self.causal.as_slice().to_vec(),
            operations,
            timestamp,
            author_id,
            session_id,
        })
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}
