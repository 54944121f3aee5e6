//! # sync-core
//!
//! Pure logic for spacesync (no I/O, instant tests).
//!
//! This crate implements the state machines and formulas of the coordination
//! client without any network I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O is performed by `sync-client`, which feeds service
//! responses into these functions and executes what they decide.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod backoff;
pub mod decision;
pub mod delivery;
pub mod peers;
pub mod scoring;
pub mod state;

pub use acquisition::select_oldest;
pub use backoff::calculate_backoff;
pub use decision::{
    classify_advisory, evaluate, link_operation, linked_peers, Advisory, DecisionInputs,
    DecisionParams, DecisionResult,
};
pub use delivery::{coordination_operation, DeliveryEvent, DeliveryStage, DeliveryState};
pub use peers::PeerRecord;
pub use scoring::{score_peer, PeerScore, ScoringParams};
pub use state::{CausalVector, SyncState};
