//! Show the space, session and version.

use anyhow::Result;
use spacesync_client::{SpaceClient, Transport};

/// Run the status command.
pub async fn run<T: Transport + 'static>(client: &SpaceClient<T>) -> Result<()> {
    let report = client.poll_once().await?;
    let state = client.state().await;
    let space = client.space();

    println!("=== space-cli status ===");
    println!();
    println!("Space:");
    println!("  Name:    {}", space.name);
    println!("  ID:      {}", space.id);
    println!("  Version: {}", state.version());
    println!();
    println!("Session:");
    println!("  ID:    {}", client.session());
    println!("  Actor: {}", client.actor());
    println!("  Name:  {}", client.config().identity.display_name);
    println!();
    println!(
        "Peers: {} known ({} new this poll)",
        client.peers().len(),
        report.discovered.len()
    );

    Ok(())
}
