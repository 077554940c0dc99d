//! Settings store trait definition.
//!
//! This port defines the interface for playback settings persistence.
//! Implementations handle all storage details internally.

use async_trait::async_trait;
use thiserror::Error;

use crate::settings::PlaybackSettings;

/// Errors returned by settings persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error (filesystem, permissions).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Settings failed validation and were not persisted.
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Durable key-value persistence for [`PlaybackSettings`].
///
/// # Design Rules
///
/// - Works with the domain `PlaybackSettings` type directly
/// - Implementation handles serialization internally
/// - `load` on a missing backing file returns defaults, not an error
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load playback settings. Returns defaults if none are stored.
    async fn load(&self) -> Result<PlaybackSettings, StoreError>;

    /// Save playback settings.
    async fn save(&self, settings: &PlaybackSettings) -> Result<(), StoreError>;
}
