//! Deliver a message to a peer.

use anyhow::Result;
use spacesync_client::{SpaceClient, Transport};
use spacesync_types::PeerId;

/// Run the send command.
pub async fn run<T: Transport + 'static>(
    client: &SpaceClient<T>,
    peer: &PeerId,
    message: &str,
    link_first: bool,
) -> Result<()> {
    client.poll_once().await?;

    if link_first && !client.is_entangled(peer) {
        let outcome = client.link(peer).await?;
        if outcome.decision.proceed {
            println!("Linked to {} (confidence {:.3})", peer, outcome.decision.confidence);
        } else {
            println!("Link to {} refused, sending without it", peer);
        }
    }

    let outcome = client.send(peer, message).await?;

    println!("Delivered to {}:", peer);
    println!("  Stage:   {}", outcome.stage);
    println!("  Quality: {:.2}", outcome.quality);
    println!("  Payload: {}", outcome.payload);
    for failure in &outcome.degraded {
        println!("  Skipped {}: {}", failure.stage, failure.error);
    }
    match outcome.coordination_version {
        Some(version) => println!("  Recorded at version {}", version),
        None => println!("  Not recorded in the space"),
    }

    Ok(())
}
