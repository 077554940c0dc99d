//! Narration error types.

/// Errors that can occur inside the speech playback orchestrator.
///
/// None of these cross the facade boundary: `speak()` absorbs every variant
/// into the fallback chain and resolves. They exist so internal components
/// can propagate precise failures with `?` and so diagnostics stay useful.
#[derive(Debug, thiserror::Error)]
pub enum NarrationError {
    /// Unexpected failure talking to the remote voice backend (request
    /// construction, client misconfiguration). Ordinary transport and
    /// payload problems are *not* errors — they map to the fallback
    /// sentinel instead.
    #[error("Voice backend integration error: {0}")]
    Integration(String),

    /// The local speech engine reported a failure other than "interrupted".
    #[error("Local speech synthesis failed: {0}")]
    Synthesis(String),

    /// The host platform offers no speech capability at all.
    #[error("No speech engine available on this platform")]
    NoSpeechEngine,

    /// Failed to open or write the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStream(String),

    /// The fetched audio payload could not be decoded for playback.
    #[error("Audio payload could not be decoded: {0}")]
    Decode(String),

    /// The dedicated audio thread is no longer responding.
    #[error("Audio thread died")]
    AudioThreadDied,
}
