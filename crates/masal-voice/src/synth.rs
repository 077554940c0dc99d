//! Local synthesis — on-device text-to-speech fallback.
//!
//! When the remote voice backend declines or fails, narration drops to the
//! host platform's speech engine. The adapter owns everything that makes
//! that path kid-ready: deterministic voice selection, content-aware rate
//! and pitch (alphabet letters are spoken slower than sentences), a 500 ms
//! debounce against rapid duplicate UI triggers, and a watchdog so a
//! wedged engine can never hang a narration call.
//!
//! The platform engine itself sits behind the [`SpeechEngine`] trait;
//! [`SystemSpeechEngine`] (feature `system-tts`) implements it over the
//! `tts` crate.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::NarrationError;
use crate::resources::{ActiveResourceRegistry, ForceStop};
use crate::text_utils;

/// Window within which an identical utterance is treated as a duplicate.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Watchdog floor — even a one-letter utterance gets this long.
const WATCHDOG_FLOOR: Duration = Duration::from_secs(3);

/// Watchdog allowance per character of text.
const WATCHDOG_PER_CHAR: Duration = Duration::from_millis(80);

// ── Engine port ────────────────────────────────────────────────────

/// Voice gender as reported by the platform engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceGender {
    Female,
    Male,
}

/// One voice offered by the platform engine.
#[derive(Debug, Clone)]
pub struct EngineVoice {
    /// Engine-specific identifier.
    pub id: String,
    /// Human-readable name ("Yelda", "Microsoft Tolga", …).
    pub name: String,
    /// BCP-47 language tag of the voice.
    pub language: String,
    /// Gender, when the engine reports one.
    pub gender: Option<VoiceGender>,
    /// Whether synthesis runs on-device (no network round trip).
    pub on_device: bool,
}

/// How an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// The engine finished the utterance.
    Finished,
    /// Playback was stopped mid-utterance. Expected and silent.
    Interrupted,
    /// A duplicate arrived inside the debounce window; nothing was spoken.
    Debounced,
    /// The engine neither completed nor errored before the watchdog fired.
    /// Treated identically to normal completion.
    TimedOut,
}

/// Delivery parameters for one utterance, as multipliers of the engine's
/// normal rate and pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    pub rate: f32,
    pub pitch: f32,
}

/// Backend-agnostic platform speech engine.
///
/// Implementations must be `Send + Sync` so the adapter can hold them as
/// `Arc<dyn SpeechEngine>` across `.await` points.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Enumerate available voices.
    fn voices(&self) -> Result<Vec<EngineVoice>, NarrationError>;

    /// Speak one utterance, resolving when it ends.
    ///
    /// `voice` is a best-effort request — an engine that cannot switch
    /// voices speaks with its default. Being stopped mid-utterance must
    /// resolve as [`SpeechOutcome::Interrupted`], not an error.
    async fn speak(
        &self,
        text: &str,
        voice: Option<&EngineVoice>,
        delivery: Delivery,
    ) -> Result<SpeechOutcome, NarrationError>;

    /// Stop the current utterance immediately. Idempotent.
    fn stop(&self);
}

// ── Voice selection ────────────────────────────────────────────────

/// Deterministic quality score for a voice against a requested language.
///
/// Ranking: on-device > exact language-region match > primary-language
/// match > natural/neural-sounding names > female voices > anything not
/// flagged robotic. Pure function; identical inputs always rank the same.
#[must_use]
pub fn score_voice(voice: &EngineVoice, language: &str) -> i32 {
    let mut score = 0;

    if voice.on_device {
        score += 400;
    }

    let want = language.to_lowercase();
    let have = voice.language.to_lowercase();
    if have == want {
        score += 300;
    } else if primary_subtag(&have) == primary_subtag(&want) {
        score += 150;
    }

    let name = voice.name.to_lowercase();
    if ["natural", "neural", "enhanced", "premium"]
        .iter()
        .any(|hint| name.contains(hint))
    {
        score += 120;
    }

    if voice.gender == Some(VoiceGender::Female) {
        score += 60;
    }

    if ["robot", "synth", "default", "compact"]
        .iter()
        .any(|flag| name.contains(flag))
    {
        score -= 200;
    }

    score
}

/// Pick the best voice for a language, ties broken by name so the choice
/// is stable across runs. Returns `None` only for an empty voice list —
/// while any voice exists, something is picked.
#[must_use]
pub fn pick_voice<'a>(voices: &'a [EngineVoice], language: &str) -> Option<&'a EngineVoice> {
    let mut best: Option<(&EngineVoice, i32)> = None;

    for voice in voices {
        let score = score_voice(voice, language);
        let better = match best {
            None => true,
            Some((current, current_score)) => {
                score > current_score || (score == current_score && voice.name < current.name)
            }
        };
        if better {
            best = Some((voice, score));
        }
    }

    best.map(|(voice, _)| voice)
}

// ── Delivery shaping ───────────────────────────────────────────────

/// Compute rate and pitch from text shape and the chosen voice's gender.
///
/// Deterministic, never randomized: single short tokens (alphabet letters,
/// digits) are delivered slowly, vowel-like tokens on a distinct pitch,
/// and `!`/`?` nudge the pitch up slightly. Male voices get a small lift
/// so the cast stays friendly-sounding for children.
#[must_use]
pub fn delivery_for(text: &str, gender: Option<VoiceGender>) -> Delivery {
    let mut rate = 1.0;
    let mut pitch = 1.0;

    if text_utils::is_short_token(text) {
        rate = 0.65;
        pitch = if text_utils::is_vowel_like(text) { 1.25 } else { 1.1 };
    } else if text_utils::has_emphasis(text) {
        pitch += 0.08;
    }

    if gender == Some(VoiceGender::Male) {
        pitch += 0.05;
    }

    Delivery { rate, pitch }
}

/// Watchdog deadline proportional to text length.
#[must_use]
pub fn watchdog_for(text: &str) -> Duration {
    WATCHDOG_FLOOR + WATCHDOG_PER_CHAR * u32::try_from(text.chars().count()).unwrap_or(u32::MAX)
}

// ── Adapter ────────────────────────────────────────────────────────

/// The local synthesis fallback used by playback sessions.
pub struct LocalSynthesisAdapter {
    engine: Arc<dyn SpeechEngine>,
    registry: Arc<ActiveResourceRegistry>,
    debounce_window: Duration,
    /// Last spoken text and when, for debouncing.
    last: Mutex<Option<(String, Instant)>>,
}

impl LocalSynthesisAdapter {
    /// Create an adapter over a platform engine.
    pub fn new(engine: Arc<dyn SpeechEngine>, registry: Arc<ActiveResourceRegistry>) -> Self {
        Self {
            engine,
            registry,
            debounce_window: DEBOUNCE_WINDOW,
            last: Mutex::new(None),
        }
    }

    /// Override the debounce window (tests).
    #[must_use]
    pub const fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Speak a line, resolving when speech ends by any means.
    ///
    /// Duplicate suppression, voice choice, delivery shaping, and the
    /// watchdog all happen here; the engine only ever sees one concrete
    /// utterance at a time. `Err` means the engine itself failed — the
    /// caller treats that as silent completion after its one fallback.
    pub async fn speak(
        &self,
        text: &str,
        language: &str,
    ) -> Result<SpeechOutcome, NarrationError> {
        let text = text.trim();
        if !text_utils::is_speakable(text) {
            return Ok(SpeechOutcome::Finished);
        }

        // Duplicate within the debounce window: resolve without speaking.
        {
            let mut last = self.last.lock().unwrap();
            let now = Instant::now();
            if let Some((prev_text, prev_at)) = last.as_ref() {
                if prev_text == text && now.duration_since(*prev_at) < self.debounce_window {
                    tracing::debug!(text, "Duplicate utterance debounced");
                    return Ok(SpeechOutcome::Debounced);
                }
            }
            *last = Some((text.to_owned(), now));
        }

        let voice = match self.engine.voices() {
            Ok(voices) => pick_voice(&voices, language).cloned(),
            Err(e) => {
                tracing::debug!(error = %e, "Voice enumeration failed, using engine default");
                None
            }
        };
        let gender = voice.as_ref().and_then(|v| v.gender);
        let delivery = delivery_for(text, gender);

        // The watchdog is a registry-tracked timer: a global stop() cancels
        // it together with everything else, which interrupts the utterance.
        let cancel = CancellationToken::new();
        let _timer_guard = self.registry.track_timer(cancel.clone());

        tokio::select! {
            result = self.engine.speak(text, voice.as_ref(), delivery) => result,
            () = cancel.cancelled() => {
                self.engine.stop();
                tracing::debug!(text, "Utterance interrupted by stop");
                Ok(SpeechOutcome::Interrupted)
            }
            () = tokio::time::sleep(watchdog_for(text)) => {
                // The engine neither completed nor errored; resolve anyway
                // and silence whatever it is still doing.
                self.engine.stop();
                tracing::debug!(text, "Utterance watchdog fired");
                Ok(SpeechOutcome::TimedOut)
            }
        }
    }

    /// Stop the current utterance immediately.
    pub fn stop_now(&self) {
        self.engine.stop();
    }
}

impl ForceStop for LocalSynthesisAdapter {
    fn force_stop(&self) {
        self.stop_now();
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

// ── System engine (tts crate) ──────────────────────────────────────

#[cfg(feature = "system-tts")]
pub use system::SystemSpeechEngine;

#[cfg(feature = "system-tts")]
mod system {
    //! Platform speech via the `tts` crate (Speech Dispatcher / SAPI /
    //! AVFoundation).

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::{Delivery, EngineVoice, SpeechEngine, SpeechOutcome, VoiceGender};
    use crate::error::NarrationError;

    /// Poll interval used when the platform does not support utterance
    /// callbacks.
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// [`SpeechEngine`] over the host platform's speech synthesis.
    pub struct SystemSpeechEngine {
        tts: Mutex<tts::Tts>,
        done: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    }

    impl SystemSpeechEngine {
        /// Initialise the platform engine.
        ///
        /// Fails with [`NarrationError::NoSpeechEngine`] when the platform
        /// offers no speech capability; callers degrade to silence.
        pub fn new() -> Result<Self, NarrationError> {
            let mut tts = tts::Tts::default().map_err(|e| {
                tracing::warn!(error = %e, "Platform speech engine unavailable");
                NarrationError::NoSpeechEngine
            })?;

            let done: Arc<Mutex<Option<oneshot::Sender<()>>>> = Arc::new(Mutex::new(None));
            let done_cb = Arc::clone(&done);
            // Callback support is optional; the speak loop also polls.
            let _ = tts.on_utterance_end(Some(Box::new(move |_| {
                if let Some(tx) = done_cb.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            })));

            Ok(Self {
                tts: Mutex::new(tts),
                done,
            })
        }
    }

    #[async_trait]
    impl SpeechEngine for SystemSpeechEngine {
        fn voices(&self) -> Result<Vec<EngineVoice>, NarrationError> {
            let tts = self.tts.lock().unwrap();
            let voices = tts
                .voices()
                .map_err(|e| NarrationError::Synthesis(e.to_string()))?;

            Ok(voices
                .into_iter()
                .map(|v| EngineVoice {
                    id: v.id(),
                    name: v.name(),
                    language: v.language().to_string(),
                    gender: match v.gender() {
                        Some(tts::Gender::Female) => Some(VoiceGender::Female),
                        Some(tts::Gender::Male) => Some(VoiceGender::Male),
                        _ => None,
                    },
                    // Platform voices synthesize locally by definition.
                    on_device: true,
                })
                .collect())
        }

        async fn speak(
            &self,
            text: &str,
            voice: Option<&EngineVoice>,
            delivery: Delivery,
        ) -> Result<SpeechOutcome, NarrationError> {
            let (tx, mut rx) = oneshot::channel();
            *self.done.lock().unwrap() = Some(tx);

            {
                let mut tts = self.tts.lock().unwrap();

                if let Some(requested) = voice {
                    if let Ok(all) = tts.voices() {
                        if let Some(found) = all.iter().find(|v| v.id() == requested.id) {
                            let _ = tts.set_voice(found);
                        }
                    }
                }

                let rate =
                    (tts.normal_rate() * delivery.rate).clamp(tts.min_rate(), tts.max_rate());
                let _ = tts.set_rate(rate);
                let pitch =
                    (tts.normal_pitch() * delivery.pitch).clamp(tts.min_pitch(), tts.max_pitch());
                let _ = tts.set_pitch(pitch);

                tts.speak(text, true)
                    .map_err(|e| NarrationError::Synthesis(e.to_string()))?;
            }

            // Resolve on the utterance-end callback when supported, else by
            // polling `is_speaking`. Either way a stop() resolves the call.
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;

                if rx.try_recv().is_ok() {
                    return Ok(SpeechOutcome::Finished);
                }

                let speaking = self.tts.lock().unwrap().is_speaking().unwrap_or(false);
                if !speaking {
                    return Ok(SpeechOutcome::Finished);
                }
            }
        }

        fn stop(&self) {
            let _ = self.tts.lock().unwrap().stop();
        }
    }
}
