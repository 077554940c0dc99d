//! JSON-file settings store — file-backed [`SettingsStore`] implementation.
//!
//! Settings live in a single small JSON file under the user config directory
//! (`settings.json` inside `masal/`). Writes go through a temp-file rename so
//! a crash mid-write never leaves a truncated file behind.

use std::path::PathBuf;

use crate::ports::settings_store::{SettingsStore, StoreError};
use crate::settings::{validate_settings, PlaybackSettings};

/// File-backed settings store.
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    /// Create a store backed by an explicit file path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create a store at the default location
    /// (`<config_dir>/masal/settings.json`).
    ///
    /// Falls back to the current directory when the platform exposes no
    /// config directory.
    #[must_use]
    pub fn at_default_location() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("masal").join("settings.json"))
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn load(&self) -> Result<PlaybackSettings, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PlaybackSettings::default());
            }
            Err(e) => return Err(StoreError::Storage(e.to_string())),
        };

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn save(&self, settings: &PlaybackSettings) -> Result<(), StoreError> {
        validate_settings(settings).map_err(|e| StoreError::Invalid(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }

        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write to a sibling temp file, then rename into place.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        tracing::debug!(path = %self.path.display(), "Playback settings saved");
        Ok(())
    }
}
