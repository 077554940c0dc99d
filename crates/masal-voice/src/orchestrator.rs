//! `SpeechPlaybackOrchestrator` — the adapter that implements
//! [`NarrationPort`].
//!
//! This is the single entry point for narration. It enforces the
//! single-active-session rule, owns the supersession counter, and wires
//! cache, remote backend, local synthesis, sink, and resource registry
//! into one facade whose `speak` never fails: every error path inside
//! degrades toward silence instead of surfacing to the story UI.
//!
//! # Locking discipline
//!
//! `speak` serialises session bodies behind `speak_op_lock` so two
//! sessions never drive the sink concurrently. Supersession does not wait
//! on the lock: the counter bump and `registry.stop_all()` happen before
//! acquisition, which unblocks the running session and frees the lock
//! within one await cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use masal_core::ports::{NarrationPort, NarrationStatusDto, SpeechRequestDto};
use masal_core::{PlaybackSettings, SettingsStore};

use crate::cache::ResponseCache;
use crate::playback::AudioSink;
use crate::profiles::VoiceProfileRegistry;
use crate::remote::VoiceBackend;
use crate::resources::{ActiveResourceRegistry, ForceStop, SinkSweeper};
use crate::session::{self, NarrationEvent, PlaybackState, SessionShared};
use crate::synth::{LocalSynthesisAdapter, SpeechEngine};

/// Implements [`NarrationPort`] over the full playback stack.
pub struct SpeechPlaybackOrchestrator {
    shared: Arc<SessionShared>,
    settings: Arc<dyn SettingsStore>,
    armed: AtomicBool,
    /// Serialises session bodies; see module docs.
    speak_op_lock: Mutex<()>,
}

impl SpeechPlaybackOrchestrator {
    /// Assemble the orchestrator and return it together with its event
    /// channel. The receiver carries [`NarrationEvent`]s for the lifetime
    /// of the orchestrator; dropping it is allowed and events are then
    /// discarded.
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        engine: Arc<dyn SpeechEngine>,
        sink: Arc<dyn AudioSink>,
        settings: Arc<dyn SettingsStore>,
    ) -> (Self, mpsc::UnboundedReceiver<NarrationEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let registry = Arc::new(ActiveResourceRegistry::new());
        let synth = Arc::new(LocalSynthesisAdapter::new(engine, Arc::clone(&registry)));

        // Ambient sweepers catch anything a cancelled session did not get
        // to unwind itself.
        registry.register_sweeper(Arc::new(SinkSweeper(Arc::clone(&sink))));
        registry.register_sweeper(Arc::clone(&synth) as Arc<dyn ForceStop>);

        let shared = Arc::new(SessionShared {
            backend,
            synth,
            sink,
            cache: ResponseCache::new(),
            profiles: VoiceProfileRegistry::with_builtin_cast(),
            registry,
            generation: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            state: std::sync::Mutex::new(PlaybackState::Idle),
            events: event_tx,
        });

        (
            Self {
                shared,
                settings,
                armed: AtomicBool::new(false),
                speak_op_lock: Mutex::new(()),
            },
            event_rx,
        )
    }

    /// Characters with a dedicated voice profile.
    #[must_use]
    pub fn available_characters(&self) -> Vec<String> {
        self.shared.profiles.available_characters()
    }

    /// Load playback settings, defaulting when the store is unreadable.
    /// A broken settings file must never mute the story.
    async fn playback_settings(&self) -> PlaybackSettings {
        match self.settings.load().await {
            Ok(settings) => settings,
            Err(e) => {
                debug!(error = %e, "Settings unavailable, narration stays enabled");
                PlaybackSettings::default()
            }
        }
    }

    /// Supersede whatever is running: bump the counter and sweep every
    /// tracked resource. Returns the new generation.
    fn supersede(&self) -> u64 {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.registry.stop_all();
        self.shared.playing.store(false, Ordering::SeqCst);
        generation
    }
}

#[async_trait]
impl NarrationPort for SpeechPlaybackOrchestrator {
    fn start(&self) {
        self.armed.store(true, Ordering::SeqCst);
        info!("Narration armed");
    }

    async fn speak(&self, request: SpeechRequestDto) {
        if !self.armed.load(Ordering::SeqCst) {
            debug!(id = %request.id, "Narration not armed, ignoring request");
            return;
        }
        let settings = self.playback_settings().await;
        if !settings.effective_voice_enabled() {
            debug!(id = %request.id, "Narration disabled in settings, ignoring request");
            return;
        }

        // Supersede before taking the lock: this is what unblocks the
        // session currently holding it.
        let generation = self.supersede();

        let _op = self.speak_op_lock.lock().await;
        if !self.shared.is_current(generation) {
            // An even newer request arrived while we waited for the lock.
            debug!(id = %request.id, "Request superseded before starting");
            return;
        }

        session::run(&self.shared, generation, request, settings.preferred_language).await;
    }

    fn stop(&self) {
        self.supersede();
        self.shared.set_state(PlaybackState::Idle);
        info!("Narration stopped");
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::SeqCst)
    }

    fn clear_cache(&self) {
        self.shared.cache.clear();
    }

    fn status(&self) -> NarrationStatusDto {
        NarrationStatusDto {
            is_armed: self.armed.load(Ordering::SeqCst),
            is_playing: self.is_playing(),
            state: self.shared.current_state().label().to_owned(),
            cached_entries: self.shared.cache.len(),
        }
    }
}
