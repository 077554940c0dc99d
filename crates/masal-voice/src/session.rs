//! Playback session state machine.
//!
//! One session exists per accepted narration request. Its lifecycle is
//! `Requesting → (Generating) → Playing → Completed`, with `Cancelled`
//! whenever a newer request or an explicit stop supersedes it and
//! `Recovered` when remote audio fails mid-playback and local synthesis
//! takes over.
//!
//! # Cancellation discipline
//!
//! Every session captures the orchestrator's generation counter at start.
//! After every `.await` it re-checks the counter; a mismatch means a newer
//! session owns the output and this one unwinds without touching the sink,
//! the cache, or the event channel beyond its own `Cancelled` transition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use masal_core::ports::SpeechRequestDto;

use crate::cache::{CacheKey, CachedAudio, PlayableAudio, ResponseCache};
use crate::playback::AudioSink;
use crate::profiles::{Emotion, VoiceProfileRegistry};
use crate::remote::{RemoteOutcome, VoiceBackend};
use crate::resources::ActiveResourceRegistry;
use crate::synth::{LocalSynthesisAdapter, SpeechOutcome};
use crate::text_utils;

// ── States and events ──────────────────────────────────────────────

/// Where a playback session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Requesting,
    Generating,
    Playing,
    Completed,
    Cancelled,
    /// Remote audio failed mid-playback and local synthesis took over.
    Recovered,
}

impl PlaybackState {
    /// Stable lowercase label for DTOs and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Generating => "generating",
            Self::Playing => "playing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Recovered => "recovered",
        }
    }
}

/// Events emitted by the narration pipeline, consumed by whatever UI or
/// transport bridge sits on the receiving end of the channel returned by
/// the orchestrator's constructor.
#[derive(Debug, Clone)]
pub enum NarrationEvent {
    StateChanged(PlaybackState),
    SpeechStarted { request_id: String },
    SpeechFinished { request_id: String },
    Error { message: String },
}

// ── Shared session context ─────────────────────────────────────────

/// Everything a running session needs, shared with the orchestrator.
///
/// `generation` is the supersession counter: the orchestrator bumps it on
/// every accepted request and on `stop()`, sessions only ever read it.
pub(crate) struct SessionShared {
    pub backend: Arc<dyn VoiceBackend>,
    pub synth: Arc<LocalSynthesisAdapter>,
    pub sink: Arc<dyn AudioSink>,
    pub cache: ResponseCache,
    pub profiles: VoiceProfileRegistry,
    pub registry: Arc<ActiveResourceRegistry>,
    pub generation: AtomicU64,
    pub playing: AtomicBool,
    pub state: std::sync::Mutex<PlaybackState>,
    pub events: mpsc::UnboundedSender<NarrationEvent>,
}

impl SessionShared {
    /// Whether `generation` is still the newest one.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Transition the visible state and notify listeners.
    pub fn set_state(&self, state: PlaybackState) {
        *self.state.lock().unwrap() = state;
        let _ = self.events.send(NarrationEvent::StateChanged(state));
    }

    pub fn current_state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    /// Mark the session cancelled, unless an explicit stop already reset
    /// the pipeline to idle.
    pub fn cancel(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == PlaybackState::Idle {
                return;
            }
            *state = PlaybackState::Cancelled;
        }
        let _ = self
            .events
            .send(NarrationEvent::StateChanged(PlaybackState::Cancelled));
    }

    fn emit(&self, event: NarrationEvent) {
        let _ = self.events.send(event);
    }
}

// ── Session driver ─────────────────────────────────────────────────

/// Run one playback session to completion.
///
/// `language_preference` comes from the playback settings and overrides
/// the character's own language for local-synthesis voice selection.
///
/// Never returns an error: every failure either degrades to the next tier
/// (cache → remote → local → silence) or ends the session as `Cancelled`.
pub(crate) async fn run(
    shared: &Arc<SessionShared>,
    generation: u64,
    request: SpeechRequestDto,
    language_preference: Option<String>,
) {
    shared.set_state(PlaybackState::Requesting);

    let text = text_utils::normalize_whitespace(&request.text);
    if !text_utils::is_speakable(&text) {
        debug!(id = %request.id, "Nothing speakable in request, completing silently");
        shared.set_state(PlaybackState::Completed);
        return;
    }

    let profile = shared.profiles.resolve(&request.character);
    let emotion = Emotion::parse_lossy(&request.emotion);
    let voice_id = profile.provider_voice_id.clone();
    let language = language_preference.unwrap_or_else(|| profile.language.clone());
    let key = CacheKey::new(&request.character, emotion, &text);

    // Tier 1: cache.
    if let Some(cached) = shared.cache.get(&key) {
        match cached {
            CachedAudio::Remote(audio) => {
                debug!(id = %request.id, "Cache hit, playing stored audio");
                play_remote(shared, generation, &request, &text, &language, audio).await;
            }
            CachedAudio::UseLocal => {
                debug!(id = %request.id, "Cache hit, remembered local fallback");
                speak_local(shared, generation, &request, &text, &language, false).await;
            }
        }
        return;
    }

    // Tier 2: remote generation.
    shared.set_state(PlaybackState::Generating);
    let params = VoiceProfileRegistry::emotion_params(profile, emotion);
    let outcome = shared.backend.generate(&text, &voice_id, &params).await;

    if !shared.is_current(generation) {
        // A newer request arrived while we were waiting on the network.
        // The result is still cached below only on the current path, so a
        // stale session discards it entirely.
        debug!(id = %request.id, "Session superseded during generation");
        shared.cancel();
        return;
    }

    match outcome {
        Ok(RemoteOutcome::Audio(audio)) => {
            shared.cache.put(key, CachedAudio::Remote(audio.clone()));
            play_remote(shared, generation, &request, &text, &language, audio).await;
        }
        Ok(RemoteOutcome::UseLocal) => {
            shared.cache.put(key, CachedAudio::UseLocal);
            speak_local(shared, generation, &request, &text, &language, false).await;
        }
        Err(e) => {
            // Backend errors are remembered so the same line does not retry
            // a failing endpoint on every repeat.
            warn!(id = %request.id, error = %e, "Remote generation failed, falling back");
            shared.cache.put(key, CachedAudio::UseLocal);
            speak_local(shared, generation, &request, &text, &language, false).await;
        }
    }
}

/// Tier 3a: play remote audio bytes through the sink, falling back to one
/// local synthesis attempt if playback itself fails.
async fn play_remote(
    shared: &Arc<SessionShared>,
    generation: u64,
    request: &SpeechRequestDto,
    text: &str,
    language: &str,
    audio: PlayableAudio,
) {
    shared.set_state(PlaybackState::Playing);
    shared.playing.store(true, Ordering::SeqCst);
    shared.emit(NarrationEvent::SpeechStarted {
        request_id: request.id.clone(),
    });

    let result = {
        let _guard = shared.registry.track_sink(Arc::clone(&shared.sink));
        shared.sink.play(&audio).await
    };

    shared.playing.store(false, Ordering::SeqCst);

    if !shared.is_current(generation) {
        shared.cancel();
        return;
    }

    match result {
        Ok(()) => {
            shared.set_state(PlaybackState::Completed);
            shared.emit(NarrationEvent::SpeechFinished {
                request_id: request.id.clone(),
            });
        }
        Err(e) => {
            warn!(id = %request.id, error = %e, "Audio playback failed, recovering locally");
            shared.set_state(PlaybackState::Recovered);
            speak_local(shared, generation, request, text, language, true).await;
        }
    }
}

/// Tier 3b: local synthesis. With `recovering` set this is the single
/// retry after a playback failure; a failure here ends in silence, which
/// still counts as completion.
async fn speak_local(
    shared: &Arc<SessionShared>,
    generation: u64,
    request: &SpeechRequestDto,
    text: &str,
    language: &str,
    recovering: bool,
) {
    if !recovering {
        shared.set_state(PlaybackState::Playing);
    }
    shared.playing.store(true, Ordering::SeqCst);
    shared.emit(NarrationEvent::SpeechStarted {
        request_id: request.id.clone(),
    });

    let outcome = shared.synth.speak(text, language).await;

    shared.playing.store(false, Ordering::SeqCst);

    if !shared.is_current(generation) {
        shared.cancel();
        return;
    }

    match outcome {
        Ok(SpeechOutcome::Interrupted) => {
            // Expected when stop() lands mid-utterance. Silent.
            shared.cancel();
        }
        Ok(SpeechOutcome::Finished | SpeechOutcome::Debounced | SpeechOutcome::TimedOut) => {
            shared.set_state(PlaybackState::Completed);
            shared.emit(NarrationEvent::SpeechFinished {
                request_id: request.id.clone(),
            });
        }
        Err(e) => {
            // Local synthesis was the last tier. The line is skipped and
            // the story continues.
            warn!(id = %request.id, error = %e, "Local synthesis failed, completing in silence");
            shared.emit(NarrationEvent::Error {
                message: e.to_string(),
            });
            shared.set_state(PlaybackState::Completed);
            shared.emit(NarrationEvent::SpeechFinished {
                request_id: request.id.clone(),
            });
        }
    }
}
