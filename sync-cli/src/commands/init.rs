//! Write a client configuration file.

use anyhow::{Context, Result};
use spacesync_client::ClientConfig;
use spacesync_types::ActorId;
use std::path::Path;

/// Run the init command.
pub fn run(
    path: &Path,
    name: &str,
    url: Option<&str>,
    api_key: Option<&str>,
    force: bool,
) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let defaults = ClientConfig::default();
    let config = ClientConfig::default()
        .with_identity(ActorId::random(), name)
        .with_service(
            url.unwrap_or(&defaults.service.base_url),
            api_key.unwrap_or(&defaults.service.api_key),
        );
    config.save(path)?;

    println!("Configuration written!");
    println!();
    println!("  Actor:   {}", config.identity.actor_id);
    println!("  Name:    {}", config.identity.display_name);
    println!("  Service: {}", config.service.base_url);
    println!("  File:    {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Check a space: space-cli status <space>");
    println!("  2. Find peers:    space-cli peers <space> --watch 30");

    Ok(())
}
