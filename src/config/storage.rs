//! Settings persistence
//!
//! `RemoteFsConfig` lives as pretty JSON in the OxideTerm config directory
//! (`~/.oxideterm`, or `%APPDATA%\OxideTerm` on Windows).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use super::settings::{RemoteFsConfig, CONFIG_VERSION};

const SETTINGS_FILE_NAME: &str = "remote_fs.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },
}

pub fn config_dir() -> Result<PathBuf, StorageError> {
    let dir = if cfg!(windows) {
        dirs::config_dir().map(|base| base.join("OxideTerm"))
    } else {
        None
    };
    dir.or_else(|| dirs::home_dir().map(|home| home.join(".oxideterm")))
        .ok_or(StorageError::NoConfigDir)
}

pub fn settings_file() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join(SETTINGS_FILE_NAME))
}

/// Reads and writes one settings file
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Storage at the default settings location
    pub fn new() -> Result<Self, StorageError> {
        settings_file().map(Self::with_path)
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Load settings. A missing file yields defaults; an unparsable one is
    /// moved aside and defaults are used; a file written by a newer
    /// version is an error.
    pub async fn load(&self) -> Result<RemoteFsConfig, StorageError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", self.path.display());
                return Ok(RemoteFsConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config = match serde_json::from_str::<RemoteFsConfig>(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Settings file {} is unreadable: {}", self.path.display(), e);
                match self.backup().await {
                    Ok(saved) => warn!("Kept unreadable settings as {}", saved.display()),
                    Err(backup_err) => error!("Could not back up settings: {}", backup_err),
                }
                return Ok(RemoteFsConfig::default());
            }
        };

        if config.version > CONFIG_VERSION {
            return Err(StorageError::VersionTooNew {
                found: config.version,
                supported: CONFIG_VERSION,
            });
        }
        Ok(config)
    }

    /// Write settings through a temporary sibling and rename it into place
    pub async fn save(&self, config: &RemoteFsConfig) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let staging = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(config)?;
        {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
        }
        fs::rename(&staging, &self.path).await?;

        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Copy the current file to a timestamped sibling
    pub async fn backup(&self) -> Result<PathBuf, StorageError> {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let target = self.path.with_extension(format!("json.backup.{}", stamp));
        if self.exists().await {
            fs::copy(&self.path, &target).await?;
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_in(dir: &tempfile::TempDir) -> ConfigStorage {
        ConfigStorage::with_path(dir.path().join(SETTINGS_FILE_NAME))
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);

        assert!(!storage.exists().await);
        assert_eq!(storage.load().await.unwrap(), RemoteFsConfig::default());
    }

    #[tokio::test]
    async fn test_round_trip_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ConfigStorage::with_path(dir.path().join("nested").join(SETTINGS_FILE_NAME));

        let config = RemoteFsConfig {
            connect_timeout_secs: 5,
            known_hosts_path: Some("/tmp/known_hosts".to_string()),
            ..Default::default()
        };
        storage.save(&config).await.unwrap();

        assert!(storage.exists().await);
        assert_eq!(storage.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        std::fs::write(storage.path(), "{ not json").unwrap();

        assert_eq!(storage.load().await.unwrap(), RemoteFsConfig::default());

        let backups = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        std::fs::write(storage.path(), r#"{ "version": 99 }"#).unwrap();

        let err = storage.load().await.unwrap_err();
        assert!(matches!(err, StorageError::VersionTooNew { found: 99, .. }));
    }
}
