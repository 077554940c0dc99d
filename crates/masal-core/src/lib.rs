//! Core domain types and port definitions for the masal narration engine.
//!
//! This crate holds everything the rest of the application needs in order to
//! talk to the speech playback orchestrator without depending on any audio,
//! network, or platform-speech implementation:
//!
//! - [`ports::NarrationPort`] — the facade surface UI/story collaborators call
//! - [`ports::SettingsStore`] — durable key-value persistence for playback settings
//! - [`settings::PlaybackSettings`] — the persisted settings themselves
//! - [`store::JsonFileSettingsStore`] — file-backed [`ports::SettingsStore`] impl
//!
//! Conversion from `masal-voice` native types to the DTOs defined here happens
//! inside `masal-voice`, never in this crate. The dependency arrow stays
//! one-way.

pub mod ports;
pub mod settings;
pub mod store;

pub use ports::{
    NarrationPort, NarrationStatusDto, SettingsStore, SpeechRequestDto, StoreError,
};
pub use settings::{PlaybackSettings, SettingsError};
pub use store::JsonFileSettingsStore;
