//! Narration port — the facade surface consumed by UI/story collaborators.
//!
//! # Design Rules
//!
//! - DTOs here are transport-agnostic wire shapes (no `masal-voice` types).
//! - `speak()` is deliberately infallible: remote-backend failures, local
//!   synthesis errors, and cancellation are all absorbed inside the
//!   orchestrator. The worst externally observable outcome is silence.
//!   Collaborators therefore never need `try`/error handling around
//!   narration calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ── DTOs ─────────────────────────────────────────────────────────────────────

/// One narration line submitted by a collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequestDto {
    /// Caller-assigned identifier, echoed back in events.
    pub id: String,
    /// The line to narrate. Whitespace is normalized by the orchestrator;
    /// a line that is empty after trimming produces no audio.
    pub text: String,
    /// Story character key (e.g. `"girl"`, `"wolf"`). Unknown characters
    /// narrate with the default narrator voice.
    pub character: String,
    /// Emotion label (e.g. `"happy"`, `"excited"`). Unknown emotions fall
    /// back to the character's calm delivery.
    pub emotion: String,
}

/// Snapshot of the orchestrator state for status displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationStatusDto {
    /// Whether `start()` has armed the orchestrator.
    pub is_armed: bool,
    /// Whether narration audio is currently audible.
    pub is_playing: bool,
    /// Session state label (e.g. `"idle"`, `"generating"`, `"playing"`).
    pub state: String,
    /// Number of entries currently held by the response cache.
    pub cached_entries: usize,
}

// ── Port trait ────────────────────────────────────────────────────────────────

/// Port trait for the speech playback orchestrator.
///
/// Implemented by `SpeechPlaybackOrchestrator` in `masal-voice`.
///
/// # Collaborator contract
///
/// Callers must invoke [`start`](Self::start) on mount/entry and
/// [`stop`](Self::stop) on unmount/navigation-away, and must not assume
/// [`speak`](Self::speak) is synchronous. A later `speak()` supersedes an
/// earlier one still in flight (last-call-wins).
#[async_trait]
pub trait NarrationPort: Send + Sync {
    /// Arm the orchestrator to accept `speak()` calls. Idempotent.
    fn start(&self);

    /// Narrate one line. Resolves when narration ends — by completion,
    /// fallback, supersession, or silent failure. Never returns an error.
    async fn speak(&self, request: SpeechRequestDto);

    /// Halt all narration and cancel all pending work. Synchronous,
    /// aggressive, idempotent; safe to call when nothing is playing.
    fn stop(&self);

    /// Whether narration audio is currently audible.
    fn is_playing(&self) -> bool;

    /// Drop all cached audio. Does not affect an in-flight session.
    fn clear_cache(&self);

    /// Current orchestrator status snapshot.
    fn status(&self) -> NarrationStatusDto;
}
