//! # sync-types
//!
//! Wire format types for the spacesync coordination client.
//!
//! This crate provides the foundational types used across all spacesync crates:
//! - [`SpaceId`], [`SessionId`], [`ActorId`], [`Version`] - Identity and ordering types
//! - [`IdempotencyKey`] - Deterministic creation token derived from a space name
//! - [`Delta`], [`Operation`] - Atomic versioned mutations of shared state
//! - [`wire`] - JSON request/response bodies exchanged with the space service
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod delta;
mod error;
mod ids;
pub mod wire;

pub use delta::{Delta, Operation};
pub use error::SyncError;
pub use ids::{ActorId, IdempotencyKey, PeerId, SessionId, SpaceId, Version};
pub use wire::SpaceHandle;
