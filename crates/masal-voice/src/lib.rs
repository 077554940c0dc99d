//! Speech playback for interactive story narration.
//!
//! Turns `(text, character, emotion)` cues into audible speech through a
//! tiered pipeline: response cache, then a remote voice backend, then the
//! platform's local speech engine, then silence. The public entry point is
//! [`SpeechPlaybackOrchestrator`], which implements the transport-agnostic
//! `NarrationPort` from `masal-core`.

pub mod cache;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod profiles;
pub mod remote;
pub mod resources;
pub mod session;
pub mod synth;
pub mod text_utils;

// Re-export key types for convenience
pub use cache::{CacheKey, CachedAudio, PlayableAudio, ResponseCache};
pub use error::NarrationError;
pub use orchestrator::SpeechPlaybackOrchestrator;
pub use playback::{AudioSink, RodioSink};
pub use profiles::{Emotion, EmotionParams, VoiceProfile, VoiceProfileRegistry};
pub use remote::{HttpVoiceClient, RemoteOutcome, VoiceBackend};
pub use resources::{ActiveResourceRegistry, ForceStop};
pub use session::{NarrationEvent, PlaybackState};
pub use synth::{
    Delivery, EngineVoice, LocalSynthesisAdapter, SpeechEngine, SpeechOutcome, VoiceGender,
};

#[cfg(feature = "system-tts")]
pub use synth::SystemSpeechEngine;
