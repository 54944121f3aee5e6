//! # sync-client
//!
//! Client library for spacesync, coordination through a shared versioned space.
//!
//! This is the main library that applications use to join a space, find
//! peers and exchange payloads with them.
//!
//! ## Features
//!
//! - **Race-free acquisition**: idempotent create-or-join with an oldest-wins tie-break
//! - **Delta sync**: version-checked deltas, reconciled against the service's version
//! - **Polling discovery**: background peer discovery with broadcast events
//! - **Gated links**: a bounded confidence score decides whether a link proceeds
//! - **Degrading delivery**: enhanced channel, messaging, then a local classical fallback
//! - **Transport Abstraction**: Pluggable transport layer (reqwest, mock)
//!
//! ## Example
//!
//! ```ignore
//! use spacesync_client::{ClientConfig, HttpTransport, SpaceClient};
//!
//! let config = ClientConfig::from_file("client.toml".as_ref())?;
//! let transport = HttpTransport::new(&config.service.base_url, &config.service.api_key)?;
//! let client = SpaceClient::connect(config, transport, "demo-space").await?;
//!
//! client.start_discovery();
//! let mut events = client.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquire;
pub mod api;
pub mod client;
pub mod config;
pub mod decision;
pub mod delivery;
pub mod discovery;
pub mod sync;
pub mod transport;

pub use acquire::{AcquisitionError, SpaceAcquirer};
pub use api::{ApiTimeouts, SpaceApi};
pub use client::{ClientError, LinkOutcome, SpaceClient};
pub use config::{ClientConfig, ConfigError};
pub use decision::{AdvisoryUnavailable, DecisionEngine, DecisionOptions};
pub use delivery::{
    ClassicalLabel, DeliveryOutcome, DeliveryPipeline, DeliveryStrategy, Entanglements, Outbox,
    OutboxEntry, PrimaryChannel, SecondaryMessaging, StageFailure, StrategyOutput,
};
pub use discovery::{DiscoveryEvent, DiscoveryPoller, PeerTable, PollReport, PollerHandle};
pub use sync::{DeltaSynchronizer, SubmitError};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, IdempotencyMode, Method, MockReply, MockTransport,
    Transport, TransportError,
};
