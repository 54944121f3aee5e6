//! Identity and ordering types for spacesync.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SyncError;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a service-assigned identifier.
            ///
            /// Returns an error for empty or whitespace-only input.
            pub fn parse(value: impl Into<String>) -> Result<Self, SyncError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(SyncError::InvalidId(format!(
                        "{} must not be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(value))
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id! {
    /// Identifier of a shared space, assigned by the space service.
    SpaceId
}

string_id! {
    /// Identifier of a joined session within a space.
    SessionId
}

string_id! {
    /// Identifier of an actor (a user or device) taking part in a space.
    ///
    /// Discovered peers are keyed by their actor id.
    ActorId
}

/// Peers are actors seen through the telemetry snapshot.
pub type PeerId = ActorId;

impl ActorId {
    /// Create a new random actor id (UUID v4).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Deterministic token attached to a space creation request.
///
/// Two clients racing to create the same space name produce the same key,
/// which lets the service deduplicate the requests.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Derive the creation key for a space name.
    pub fn for_space(name: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"spacesync-create-v1");
        hasher.update(name.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "IdempotencyKey({}..)", prefix)
    }
}

/// A monotonically increasing version of a shared space.
///
/// Assigned by the service, not by clients. The client only ever adopts
/// versions echoed back by the service.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Create a new Version with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Version.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version of a freshly created space.
    pub fn zero() -> Self {
        Self(0)
    }

    /// The version a delta built on top of this one will produce.
    ///
    /// `None` once the counter is exhausted.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}
