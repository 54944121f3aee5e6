//! CLI command implementations.

use anyhow::{Context, Result};
use spacesync_client::{ClientConfig, Method, MockReply, MockTransport, SpaceClient, Transport};

pub mod init;
pub mod link;
pub mod peers;
pub mod send;
pub mod status;

/// Actor id of the peer seeded into the in-memory service.
pub const DEMO_PEER: &str = "demo-peer";

/// Acquire and join `space`.
pub async fn connect<T: Transport + 'static>(
    config: ClientConfig,
    transport: T,
    space: &str,
) -> Result<SpaceClient<T>> {
    tracing::debug!("Connecting to space '{}'", space);
    SpaceClient::connect(config, transport, space)
        .await
        .with_context(|| format!("Failed to join space '{}'", space))
}

/// In-memory service with `space` already created and one other peer in it.
pub fn mock_service(space: &str) -> MockTransport {
    let transport = MockTransport::new();

    let handle = transport.seed_space(space);
    transport.add_remote_session(&handle.id, "sess-demo", DEMO_PEER, "Demo Peer");
    transport.set_phase_coherence(&handle.id, 0.8);

    transport.set_route(
        Method::Post,
        "/resonance/encode",
        MockReply::ok(serde_json::json!({ "resonance": 0.9 })),
    );
    transport.set_route(
        Method::Post,
        "/advisory",
        MockReply::ok(serde_json::json!({ "guidance": "Go ahead, the peer looks reliable." })),
    );
    transport.set_route(
        Method::Post,
        "/simulation/run",
        MockReply::ok(serde_json::json!({ "strength": 0.85 })),
    );
    transport.set_route(
        Method::Post,
        &format!("/spaces/{}/channels/enhanced", handle.id),
        MockReply::ok(serde_json::json!({ "fidelity": 0.97 })),
    );

    transport
}
