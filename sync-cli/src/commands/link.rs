//! Decide on a peer and record the link.

use anyhow::Result;
use spacesync_client::{SpaceClient, Transport};
use spacesync_core::Advisory;
use spacesync_types::PeerId;

/// Run the link command.
pub async fn run<T: Transport + 'static>(client: &SpaceClient<T>, peer: &PeerId) -> Result<()> {
    client.poll_once().await?;
    let outcome = client.link(peer).await?;
    let decision = &outcome.decision;

    println!("Decision for {}:", peer);
    println!("  Confidence:   {:.3}", decision.confidence);
    println!(
        "  Advisory:     {} ({:.2})",
        advisory_label(&decision.advisory),
        decision.advisory_confidence
    );
    println!("  Simulated:    {}", decision.simulated);
    println!("  Breakthrough: {}", decision.breakthrough);
    println!();

    if !decision.proceed {
        println!("Link refused.");
        return Ok(());
    }

    match outcome.coordination_version {
        Some(version) => println!("Linked! Recorded at version {}.", version),
        None => println!("Linked locally, but recording the link in the space failed."),
    }
    Ok(())
}

fn advisory_label(advisory: &Advisory) -> String {
    match advisory {
        Advisory::Approved => "approved".to_string(),
        Advisory::Rejected { phrase } => format!("rejected: \"{}\"", phrase),
        Advisory::Unavailable => "unavailable".to_string(),
        Advisory::Skipped => "skipped".to_string(),
    }
}
