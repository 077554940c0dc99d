//! Port definitions (trait abstractions) for the narration engine.
//!
//! Ports define the interfaces that collaborators (story screens, games,
//! settings UI) expect from the orchestrator, and the interfaces the
//! orchestrator expects from infrastructure (durable settings storage).
//!
//! # Design Rules
//!
//! - No `masal-voice` types in any signature
//! - No filesystem or network implementation details
//! - DTOs are transport-agnostic wire shapes

pub mod narration;
pub mod settings_store;

pub use narration::{NarrationPort, NarrationStatusDto, SpeechRequestDto};
pub use settings_store::{SettingsStore, StoreError};
