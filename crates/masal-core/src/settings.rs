//! Playback settings domain types and validation.
//!
//! Pure domain types with no infrastructure dependencies. Persistence lives
//! behind [`crate::ports::SettingsStore`].

use serde::{Deserialize, Serialize};

/// Persisted narration playback settings.
///
/// All fields are optional to support partial files and graceful defaults.
/// The orchestrator reads these at the start of every `speak()` call, so a
/// settings change takes effect on the next narration line without a restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackSettings {
    /// Master on/off switch for narration audio. `None` means enabled.
    pub voice_enabled: Option<bool>,

    /// BCP-47 language tag used for local-synthesis voice selection,
    /// overriding the speaking character's own language. `None` keeps each
    /// character's language.
    pub preferred_language: Option<String>,
}

impl PlaybackSettings {
    /// Get the effective voice-enabled flag (with default fallback).
    #[must_use]
    pub const fn effective_voice_enabled(&self) -> bool {
        match self.voice_enabled {
            Some(enabled) => enabled,
            None => true,
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Preferred language cannot be empty")]
    EmptyLanguage,

    #[error("Preferred language must be an ASCII language tag, got {0:?}")]
    InvalidLanguage(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &PlaybackSettings) -> Result<(), SettingsError> {
    if let Some(ref lang) = settings.preferred_language {
        if lang.trim().is_empty() {
            return Err(SettingsError::EmptyLanguage);
        }
        if !lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SettingsError::InvalidLanguage(lang.clone()));
        }
    }
    Ok(())
}
