//! List discovered peers.

use anyhow::Result;
use spacesync_client::{DiscoveryEvent, SpaceClient, Transport};
use spacesync_core::PeerRecord;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Run the peers command.
///
/// With `watch`, keeps discovery running for that many seconds (or until
/// Ctrl+C) and prints every change.
pub async fn run<T: Transport + 'static>(
    client: &SpaceClient<T>,
    watch: Option<u64>,
) -> Result<()> {
    client.poll_once().await?;
    print_table(&client.peers());

    let Some(secs) = watch else {
        return Ok(());
    };

    let mut events = client.subscribe();
    client.start_discovery();
    println!();
    println!("Watching for {}s (Ctrl+C to stop)...", secs);

    let deadline = tokio::time::sleep(Duration::from_secs(secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(DiscoveryEvent::PeerDiscovered(peer)) => {
                    println!(
                        "+ {} ({}) similarity {:.2}",
                        peer.display_name, peer.peer_id, peer.similarity
                    );
                }
                Ok(DiscoveryEvent::PeerUpdated(id)) => {
                    if let Some(peer) = client.peer(&id) {
                        println!("~ {} online={}", peer.peer_id, peer.online);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} discovery events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    client.stop_discovery().await;
    Ok(())
}

fn print_table(peers: &[PeerRecord]) {
    if peers.is_empty() {
        println!("No peers in this space yet.");
        return;
    }

    println!(
        "{:<24} {:<20} {:>6} {:>6} {:>7} {:>6}",
        "PEER", "NAME", "ONLINE", "LINKED", "SIMIL.", "QUAL."
    );
    for peer in peers {
        println!(
            "{:<24} {:<20} {:>6} {:>6} {:>7.3} {:>6.3}",
            peer.peer_id.as_str(),
            peer.display_name,
            if peer.online { "yes" } else { "no" },
            if peer.linked { "yes" } else { "no" },
            peer.similarity,
            peer.quality
        );
    }
}
