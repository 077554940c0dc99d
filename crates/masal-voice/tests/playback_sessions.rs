//! End-to-end playback session tests over the full orchestrator stack,
//! with hand-rolled backend / engine / sink / settings doubles.
//!
//! The audible tiers are all mocked; what these tests pin down is the
//! control flow: arming, supersession, caching, fallback order, and the
//! promise that `speak` never surfaces an error.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use masal_core::ports::{NarrationPort, SpeechRequestDto};
use masal_core::{PlaybackSettings, SettingsStore, StoreError};
use masal_voice::{
    AudioSink, Delivery, EngineVoice, NarrationError, NarrationEvent, PlayableAudio,
    RemoteOutcome, SpeechEngine, SpeechOutcome, SpeechPlaybackOrchestrator, VoiceBackend,
    VoiceGender,
};

// ── Backend double ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Script {
    Audio,
    Declined,
    Broken,
}

/// Backend that answers from a per-call script, falling back to a default.
struct ScriptedBackend {
    script: Mutex<VecDeque<Script>>,
    default: Script,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedBackend {
    fn always(default: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn scripted(steps: &[Script]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.iter().copied().collect()),
            default: Script::Audio,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VoiceBackend for ScriptedBackend {
    async fn generate(
        &self,
        text: &str,
        voice_id: &str,
        _params: &masal_voice::EmotionParams,
    ) -> Result<RemoteOutcome, NarrationError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_owned(), voice_id.to_owned()));
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);
        match step {
            Script::Audio => Ok(RemoteOutcome::Audio(PlayableAudio::new(vec![0u8; 4096]))),
            Script::Declined => Ok(RemoteOutcome::UseLocal),
            Script::Broken => Err(NarrationError::Integration("backend unreachable".into())),
        }
    }
}

/// Backend whose `generate` blocks until the test releases it, modelling
/// a network response that arrives after the caller moved on.
struct GatedBackend {
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl VoiceBackend for GatedBackend {
    async fn generate(
        &self,
        _text: &str,
        _voice_id: &str,
        _params: &masal_voice::EmotionParams,
    ) -> Result<RemoteOutcome, NarrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(RemoteOutcome::Audio(PlayableAudio::new(vec![0u8; 4096])))
    }
}

// ── Engine double ─────────────────────────────────────────────────────────────

/// Local speech engine double. `hold` keeps utterances audible for a
/// while; `wedged` never resolves on its own so the watchdog has to.
struct FakeEngine {
    voices: Vec<EngineVoice>,
    spoken: Mutex<Vec<String>>,
    voice_langs: Mutex<Vec<Option<String>>>,
    release: Notify,
    hold: Duration,
    wedged: bool,
}

fn engine_voice(id: &str, name: &str, language: &str) -> EngineVoice {
    EngineVoice {
        id: id.into(),
        name: name.into(),
        language: language.into(),
        gender: Some(VoiceGender::Female),
        on_device: true,
    }
}

impl FakeEngine {
    fn with_voices(voices: Vec<EngineVoice>) -> Arc<Self> {
        Arc::new(Self {
            voices,
            spoken: Mutex::new(Vec::new()),
            voice_langs: Mutex::new(Vec::new()),
            release: Notify::new(),
            hold: Duration::ZERO,
            wedged: false,
        })
    }

    fn instant() -> Arc<Self> {
        Self::with_voices(vec![engine_voice("yelda", "Yelda", "tr-TR")])
    }

    fn wedged() -> Arc<Self> {
        Arc::new(Self {
            voices: vec![engine_voice("yelda", "Yelda", "tr-TR")],
            spoken: Mutex::new(Vec::new()),
            voice_langs: Mutex::new(Vec::new()),
            release: Notify::new(),
            hold: Duration::ZERO,
            wedged: true,
        })
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Language of the requested voice, per utterance.
    fn voice_langs(&self) -> Vec<Option<String>> {
        self.voice_langs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    fn voices(&self) -> Result<Vec<EngineVoice>, NarrationError> {
        Ok(self.voices.clone())
    }

    async fn speak(
        &self,
        text: &str,
        voice: Option<&EngineVoice>,
        _delivery: Delivery,
    ) -> Result<SpeechOutcome, NarrationError> {
        self.spoken.lock().unwrap().push(text.to_owned());
        self.voice_langs
            .lock()
            .unwrap()
            .push(voice.map(|v| v.language.clone()));
        if self.wedged {
            self.release.notified().await;
            return Ok(SpeechOutcome::Interrupted);
        }
        if self.hold > Duration::ZERO {
            tokio::select! {
                () = tokio::time::sleep(self.hold) => {}
                () = self.release.notified() => return Ok(SpeechOutcome::Interrupted),
            }
        }
        Ok(SpeechOutcome::Finished)
    }

    fn stop(&self) {
        self.release.notify_waiters();
    }
}

/// Engine whose every utterance fails outright.
struct FailingEngine {
    attempts: AtomicUsize,
}

#[async_trait]
impl SpeechEngine for FailingEngine {
    fn voices(&self) -> Result<Vec<EngineVoice>, NarrationError> {
        Ok(vec![engine_voice("yelda", "Yelda", "tr-TR")])
    }

    async fn speak(
        &self,
        _text: &str,
        _voice: Option<&EngineVoice>,
        _delivery: Delivery,
    ) -> Result<SpeechOutcome, NarrationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NarrationError::Synthesis("engine crashed".into()))
    }

    fn stop(&self) {}
}

// ── Sink doubles ──────────────────────────────────────────────────────────────

/// Sink that "plays" for `hold`, resolving early (still `Ok`) on stop.
struct FakeSink {
    played: Mutex<Vec<usize>>,
    playing: AtomicBool,
    stops: AtomicUsize,
    release: Notify,
    hold: Duration,
}

impl FakeSink {
    fn with_hold(hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            played: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            stops: AtomicUsize::new(0),
            release: Notify::new(),
            hold,
        })
    }

    fn instant() -> Arc<Self> {
        Self::with_hold(Duration::ZERO)
    }

    fn play_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, audio: &PlayableAudio) -> Result<(), NarrationError> {
        self.played.lock().unwrap().push(audio.len());
        self.playing.store(true, Ordering::SeqCst);
        if self.hold > Duration::ZERO {
            tokio::select! {
                () = tokio::time::sleep(self.hold) => {}
                () = self.release.notified() => {}
            }
        }
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

/// Sink whose playback always fails, forcing local recovery.
struct BrokenSink;

#[async_trait]
impl AudioSink for BrokenSink {
    async fn play(&self, _audio: &PlayableAudio) -> Result<(), NarrationError> {
        Err(NarrationError::Decode("not an audio stream".into()))
    }

    fn stop(&self) {}

    fn is_playing(&self) -> bool {
        false
    }
}

// ── Settings doubles ──────────────────────────────────────────────────────────

struct FixedStore(PlaybackSettings);

#[async_trait]
impl SettingsStore for FixedStore {
    async fn load(&self) -> Result<PlaybackSettings, StoreError> {
        Ok(self.0.clone())
    }

    async fn save(&self, _settings: &PlaybackSettings) -> Result<(), StoreError> {
        Ok(())
    }
}

struct UnreadableStore;

#[async_trait]
impl SettingsStore for UnreadableStore {
    async fn load(&self) -> Result<PlaybackSettings, StoreError> {
        Err(StoreError::Storage("disk on fire".into()))
    }

    async fn save(&self, _settings: &PlaybackSettings) -> Result<(), StoreError> {
        Err(StoreError::Storage("disk on fire".into()))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn enabled_settings() -> Arc<FixedStore> {
    Arc::new(FixedStore(PlaybackSettings::default()))
}

fn disabled_settings() -> Arc<FixedStore> {
    Arc::new(FixedStore(PlaybackSettings {
        voice_enabled: Some(false),
        preferred_language: None,
    }))
}

fn cue(id: &str, text: &str, character: &str, emotion: &str) -> SpeechRequestDto {
    SpeechRequestDto {
        id: id.to_owned(),
        text: text.to_owned(),
        character: character.to_owned(),
        emotion: emotion.to_owned(),
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<NarrationEvent>) -> Vec<NarrationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn finished_ids(events: &[NarrationEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            NarrationEvent::SpeechFinished { request_id } => Some(request_id.clone()),
            _ => None,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn speak_before_start_is_ignored() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, _rx) =
        SpeechPlaybackOrchestrator::new(backend.clone(), engine, sink.clone(), enabled_settings());

    orch.speak(cue("r1", "Bir varmış, bir yokmuş.", "narrator", "calm"))
        .await;

    assert_eq!(backend.call_count(), 0);
    assert_eq!(sink.play_count(), 0);
}

#[tokio::test]
async fn disabled_settings_mute_narration() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, _rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        disabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Bir varmış, bir yokmuş.", "narrator", "calm"))
        .await;

    assert_eq!(backend.call_count(), 0);
    assert_eq!(sink.play_count(), 0);
    assert!(engine.spoken().is_empty());
}

#[tokio::test]
async fn unreadable_settings_leave_narration_enabled() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, _rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine,
        sink.clone(),
        Arc::new(UnreadableStore),
    );

    orch.start();
    orch.speak(cue("r1", "Bir varmış, bir yokmuş.", "narrator", "calm"))
        .await;

    assert_eq!(sink.play_count(), 1);
}

#[tokio::test]
async fn remote_audio_plays_through_sink() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Kırmızı başlıklı kız ormana gitti.", "narrator", "calm"))
        .await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(sink.play_count(), 1);
    assert!(engine.spoken().is_empty());

    let status = orch.status();
    assert!(status.is_armed);
    assert!(!status.is_playing);
    assert_eq!(status.state, "completed");
    assert_eq!(status.cached_entries, 1);

    assert_eq!(finished_ids(&drain(&mut rx)), vec!["r1".to_owned()]);
}

#[tokio::test]
async fn unspeakable_text_completes_silently() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "...!?", "narrator", "calm")).await;

    assert_eq!(backend.call_count(), 0);
    assert_eq!(sink.play_count(), 0);
    assert!(engine.spoken().is_empty());
    assert_eq!(orch.status().state, "completed");
    assert!(drain(&mut rx)
        .iter()
        .all(|e| !matches!(e, NarrationEvent::SpeechStarted { .. })));
}

#[tokio::test]
async fn repeated_line_is_served_from_cache() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, _rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine,
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Büyükanne, kulakların ne kadar büyük!", "girl", "surprised"))
        .await;
    // Trivially different spelling of the same line must hit the cache too.
    orch.speak(cue("r2", "  büyükanne, kulakların ne   kadar büyük!  ", "girl", "surprised"))
        .await;

    assert_eq!(backend.call_count(), 1);
    assert_eq!(sink.play_count(), 2);
    assert_eq!(orch.status().cached_entries, 1);
}

#[tokio::test]
async fn declined_backend_falls_to_local_and_is_remembered() {
    let backend = ScriptedBackend::always(Script::Declined);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Seni daha iyi duymak için!", "wolf", "excited"))
        .await;
    orch.speak(cue("r2", "Seni daha iyi duymak için!", "wolf", "excited"))
        .await;

    // The decline is cached: the second request goes straight to local,
    // where the duplicate inside the debounce window resolves unspoken.
    assert_eq!(backend.call_count(), 1);
    assert_eq!(sink.play_count(), 0);
    assert_eq!(engine.spoken().len(), 1);
    assert_eq!(
        finished_ids(&drain(&mut rx)),
        vec!["r1".to_owned(), "r2".to_owned()]
    );
}

#[tokio::test]
async fn backend_error_never_surfaces_to_the_caller() {
    let backend = ScriptedBackend::always(Script::Broken);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Ne keskin dişlerin var!", "girl", "scared"))
        .await;

    assert_eq!(engine.spoken(), vec!["Ne keskin dişlerin var!".to_owned()]);
    assert_eq!(orch.status().state, "completed");
    assert_eq!(finished_ids(&drain(&mut rx)), vec!["r1".to_owned()]);
}

#[tokio::test]
async fn playback_failure_recovers_through_local_synthesis() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        Arc::new(BrokenSink),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Avcı kapıyı açtı.", "hunter", "calm"))
        .await;

    // One local attempt after the failed playback, then done.
    assert_eq!(engine.spoken().len(), 1);
    assert_eq!(orch.status().state, "completed");
    assert_eq!(finished_ids(&drain(&mut rx)), vec!["r1".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn newer_request_supersedes_older() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::with_hold(Duration::from_secs(10));
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine,
        sink.clone(),
        enabled_settings(),
    );
    let orch = Arc::new(orch);

    orch.start();
    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            orch.speak(cue("old", "Bir varmış, bir yokmuş.", "narrator", "calm"))
                .await;
        })
    };
    // Let the first session reach the sink before superseding it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orch.is_playing());

    orch.speak(cue("new", "Kurt ormanda bekliyordu.", "narrator", "sad"))
        .await;
    first.await.unwrap();

    // Both sessions reached the sink, but only the newer one finished.
    assert_eq!(sink.play_count(), 2);
    assert!(sink.stops.load(Ordering::SeqCst) >= 1);
    assert_eq!(finished_ids(&drain(&mut rx)), vec!["new".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn stop_silences_playback_immediately() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::with_hold(Duration::from_secs(10));
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );
    let orch = Arc::new(orch);

    orch.start();
    let session = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            orch.speak(cue("r1", "Bir varmış, bir yokmuş.", "narrator", "calm"))
                .await;
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(orch.is_playing());

    orch.stop();
    assert!(!orch.is_playing());

    session.await.unwrap();
    assert_eq!(orch.status().state, "idle");
    assert!(finished_ids(&drain(&mut rx)).is_empty());
    assert!(engine.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn wedged_engine_is_reaped_by_the_watchdog() {
    let backend = ScriptedBackend::always(Script::Declined);
    let engine = FakeEngine::wedged();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink,
        enabled_settings(),
    );

    orch.start();
    // Resolves via the watchdog; a hung engine must not hang narration.
    orch.speak(cue("r1", "Merhaba!", "narrator", "happy")).await;

    assert_eq!(engine.spoken().len(), 1);
    assert_eq!(orch.status().state, "completed");
    assert_eq!(finished_ids(&drain(&mut rx)), vec!["r1".to_owned()]);
}

#[tokio::test]
async fn clear_cache_forces_regeneration() {
    let backend = ScriptedBackend::always(Script::Audio);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, _rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine,
        sink,
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Bir varmış, bir yokmuş.", "narrator", "calm"))
        .await;
    orch.clear_cache();
    assert_eq!(orch.status().cached_entries, 0);
    orch.speak(cue("r2", "Bir varmış, bir yokmuş.", "narrator", "calm"))
        .await;

    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn preferred_language_steers_local_voice_choice() {
    let voices = || {
        vec![
            engine_voice("yelda", "Yelda", "tr-TR"),
            engine_voice("alice", "Alice", "en-GB"),
        ]
    };

    let backend = ScriptedBackend::always(Script::Declined);
    let engine = FakeEngine::with_voices(voices());
    let store = Arc::new(FixedStore(PlaybackSettings {
        voice_enabled: None,
        preferred_language: Some("en-GB".to_owned()),
    }));
    let (orch, _rx) =
        SpeechPlaybackOrchestrator::new(backend, engine.clone(), FakeSink::instant(), store);

    orch.start();
    orch.speak(cue("r1", "Once upon a time.", "narrator", "calm"))
        .await;
    assert_eq!(engine.voice_langs(), vec![Some("en-GB".to_owned())]);

    // Without a stored preference the character's own language wins.
    let backend = ScriptedBackend::always(Script::Declined);
    let engine = FakeEngine::with_voices(voices());
    let (orch, _rx) = SpeechPlaybackOrchestrator::new(
        backend,
        engine.clone(),
        FakeSink::instant(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r2", "Bir varmış, bir yokmuş.", "narrator", "calm"))
        .await;
    assert_eq!(engine.voice_langs(), vec![Some("tr-TR".to_owned())]);
}

#[tokio::test(start_paused = true)]
async fn stop_during_generation_discards_late_audio() {
    let backend = GatedBackend::new();
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );
    let orch = Arc::new(orch);

    orch.start();
    let session = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            orch.speak(cue("r1", "Bir varmış, bir yokmuş.", "narrator", "calm"))
                .await;
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orch.status().state, "generating");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    orch.stop();
    // The network response lands only after the stop.
    backend.release();
    session.await.unwrap();

    // The late audio is discarded entirely: nothing plays, nothing is
    // cached, no speech events fire.
    assert_eq!(sink.play_count(), 0);
    assert!(engine.spoken().is_empty());
    assert_eq!(orch.status().state, "idle");
    assert_eq!(orch.status().cached_entries, 0);
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .all(|e| !matches!(e, NarrationEvent::SpeechStarted { .. })));
    assert!(finished_ids(&events).is_empty());
}

#[tokio::test]
async fn failed_local_synthesis_still_completes() {
    let backend = ScriptedBackend::always(Script::Declined);
    let engine = Arc::new(FailingEngine {
        attempts: AtomicUsize::new(0),
    });
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend,
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("r1", "Ne büyük gözlerin var!", "girl", "surprised"))
        .await;

    // The line ends in silence, and silence still counts as completion.
    assert_eq!(engine.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(sink.play_count(), 0);
    assert!(!orch.is_playing());
    assert_eq!(orch.status().state, "completed");
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, NarrationEvent::Error { .. })));
    assert_eq!(finished_ids(&events), vec!["r1".to_owned()]);
}

/// A short story beat exercising every tier in sequence: fresh remote
/// audio, a decline that drops to local, a cache hit, then a hard stop.
#[tokio::test]
async fn story_scene_runs_through_all_tiers() {
    let backend = ScriptedBackend::scripted(&[Script::Audio, Script::Declined]);
    let engine = FakeEngine::instant();
    let sink = FakeSink::instant();
    let (orch, mut rx) = SpeechPlaybackOrchestrator::new(
        backend.clone(),
        engine.clone(),
        sink.clone(),
        enabled_settings(),
    );

    orch.start();
    orch.speak(cue("n1", "Kırmızı başlıklı kız yola koyuldu.", "narrator", "calm"))
        .await;
    orch.speak(cue("w1", "Nereye gidiyorsun küçük kız?", "wolf", "calm"))
        .await;
    orch.speak(cue("n2", "Kırmızı başlıklı kız yola koyuldu.", "narrator", "calm"))
        .await;
    orch.stop();

    // Narrator line generated once, wolf line went local, repeat was cached.
    assert_eq!(backend.call_count(), 2);
    assert_eq!(sink.play_count(), 2);
    assert_eq!(engine.spoken(), vec!["Nereye gidiyorsun küçük kız?".to_owned()]);
    assert_eq!(
        finished_ids(&drain(&mut rx)),
        vec!["n1".to_owned(), "w1".to_owned(), "n2".to_owned()]
    );
    assert_eq!(orch.status().state, "idle");
    assert!(!orch.is_playing());
}
