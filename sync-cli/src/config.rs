//! Configuration file location and loading for space-cli.

use anyhow::{Context, Result};
use spacesync_client::ClientConfig;
use std::path::{Path, PathBuf};

/// File name of the client configuration.
pub const CONFIG_FILE: &str = "client.toml";

/// Resolve the configuration path from `--config` or the platform config dir.
pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => {
            let dirs = directories::ProjectDirs::from("io", "spacesync", "space-cli")
                .context("Could not determine home directory")?;
            Ok(dirs.config_dir().join(CONFIG_FILE))
        }
    }
}

/// Load the configuration, falling back to defaults if the file is missing.
pub fn load_or_default(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        tracing::info!(
            "No configuration at {}, using defaults (run 'space-cli init' to create one)",
            path.display()
        );
        return Ok(ClientConfig::default());
    }
    ClientConfig::from_file(path).context("Invalid client configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_path_wins() {
        let path = resolve_path(Some(PathBuf::from("/tmp/x.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/x.toml"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.acquisition.list_attempts, 3);
    }

    #[test]
    fn existing_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[identity]\nactor_id = \"alice\"\n").unwrap();

        let config = load_or_default(&path).unwrap();
        assert_eq!(config.identity.actor_id.as_str(), "alice");
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[identity\n").unwrap();
        assert!(load_or_default(&path).is_err());
    }
}
