// Persisted user settings with change notification
use crate::application::ports::TrackingSettings;
use crate::domain::error::HeatmapResult;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Partial settings; missing fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub sensitivity: Option<f64>,
    pub high_accuracy: Option<bool>,
    pub scan_interval_ms: Option<u64>,
}

impl SettingsUpdate {
    pub fn apply_to(&self, base: TrackingSettings) -> TrackingSettings {
        TrackingSettings {
            sensitivity: self.sensitivity.unwrap_or(base.sensitivity),
            high_accuracy: self.high_accuracy.unwrap_or(base.high_accuracy),
            scan_interval_ms: self.scan_interval_ms.unwrap_or(base.scan_interval_ms),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    tx: watch::Sender<TrackingSettings>,
}

impl SettingsStore {
    /// Read settings from `path`, falling back to defaults when the file is absent.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let update: SettingsUpdate = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
                let settings = update.apply_to(TrackingSettings::default());
                settings.validate()?;
                settings
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}, using defaults", path.display());
                TrackingSettings::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings file {}", path.display()));
            }
        };

        let (tx, _) = watch::channel(settings);
        Ok(Self { path, tx })
    }

    pub fn current(&self) -> TrackingSettings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingSettings> {
        self.tx.subscribe()
    }

    /// Validate and publish new settings, then write them back to disk.
    /// A failed write is logged; the new values stay in effect.
    pub async fn update(&self, update: SettingsUpdate) -> HeatmapResult<TrackingSettings> {
        let settings = update.apply_to(self.current());
        settings.validate()?;
        self.tx.send_replace(settings);
        tracing::info!(
            "Settings updated: sensitivity={}, high_accuracy={}, scan_interval_ms={}",
            settings.sensitivity,
            settings.high_accuracy,
            settings.scan_interval_ms
        );

        if let Err(e) = self.persist(&settings).await {
            tracing::warn!("Failed to persist settings: {:#}", e);
        }
        Ok(settings)
    }

    async fn persist(&self, settings: &TrackingSettings) -> Result<()> {
        let contents = toml::to_string(settings).context("Failed to encode settings")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::HeatmapError;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("wifi-heatmap-{}-{}", name, std::process::id()))
            .join("settings.toml")
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let store = SettingsStore::load(scratch_path("missing")).await.unwrap();
        assert_eq!(store.current(), TrackingSettings::default());
    }

    #[tokio::test]
    async fn test_update_publishes_and_persists() {
        let path = scratch_path("persist");
        let store = SettingsStore::load(&path).await.unwrap();
        let mut rx = store.subscribe();

        let updated = store
            .update(SettingsUpdate {
                sensitivity: Some(80.0),
                scan_interval_ms: Some(2000),
                ..SettingsUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.sensitivity, 80.0);
        assert!(updated.high_accuracy);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().scan_interval_ms, 2000);

        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert_eq!(reloaded.current(), updated);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected() {
        let store = SettingsStore::load(scratch_path("invalid")).await.unwrap();
        let result = store
            .update(SettingsUpdate {
                sensitivity: Some(250.0),
                ..SettingsUpdate::default()
            })
            .await;

        assert!(matches!(result, Err(HeatmapError::InvalidSettings(_))));
        assert_eq!(store.current(), TrackingSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let update: SettingsUpdate = toml::from_str("sensitivity = 20.0").unwrap();
        let settings = update.apply_to(TrackingSettings::default());
        assert_eq!(settings.sensitivity, 20.0);
        assert_eq!(settings.scan_interval_ms, 5000);
    }
}
