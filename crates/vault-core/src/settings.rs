use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vault_store::StoreConfig;

use crate::paths::settings_path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VaultSettings {
    /// Database file name inside the data directory.
    pub database_file: String,
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            database_file: "vault.db".into(),
            busy_timeout_ms: 5000,
            max_connections: 4,
        }
    }
}

impl VaultSettings {
    /// Read `settings.json` from the data directory. A missing file means
    /// defaults; a malformed one is an error.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = settings_path(data_dir);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    pub fn save(&self, data_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(settings_path(data_dir), data)?;
        Ok(())
    }

    pub fn store_config(&self, data_dir: &Path) -> StoreConfig {
        StoreConfig {
            path: data_dir.join(&self.database_file),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            max_connections: self.max_connections.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(VaultSettings::load(dir.path()).unwrap(), VaultSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(settings_path(dir.path()), br#"{"database_file":"other.db"}"#).unwrap();

        let settings = VaultSettings::load(dir.path()).unwrap();
        assert_eq!(settings.database_file, "other.db");
        assert_eq!(settings.busy_timeout_ms, 5000);
        assert_eq!(
            settings.store_config(dir.path()).path,
            dir.path().join("other.db")
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(settings_path(dir.path()), b"{ nope").unwrap();
        assert!(VaultSettings::load(dir.path()).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let settings = VaultSettings {
            max_connections: 0,
            ..VaultSettings::default()
        };
        settings.save(dir.path()).unwrap();
        let loaded = VaultSettings::load(dir.path()).unwrap();
        assert_eq!(loaded, settings);
        // A zero pool size would never hand out a connection.
        assert_eq!(loaded.store_config(dir.path()).max_connections, 1);
    }
}
