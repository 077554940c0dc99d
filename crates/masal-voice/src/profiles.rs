//! Voice profile registry — the story cast and its per-emotion delivery
//! parameters.
//!
//! Pure data lookup, no state. The table is built once at startup and never
//! mutated; both lookups (`resolve`, `emotion_params`) always succeed by
//! falling back to the narrator profile and the calm entry respectively.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Character key of the built-in default profile.
pub const NARRATOR: &str = "narrator";

// ── Emotions ───────────────────────────────────────────────────────

/// The closed set of narration emotions.
///
/// Story data carries emotions as strings; parsing is lossy on purpose so
/// that a typo in content degrades to calm delivery instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Emotion {
    #[default]
    Calm,
    Happy,
    Sad,
    Excited,
    Scared,
    Angry,
    Surprised,
}

impl Emotion {
    /// Parse an emotion label, falling back to [`Emotion::Calm`] for
    /// anything unrecognized.
    #[must_use]
    pub fn parse_lossy(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "happy" | "joyful" => Self::Happy,
            "sad" => Self::Sad,
            "excited" => Self::Excited,
            "scared" | "afraid" => Self::Scared,
            "angry" => Self::Angry,
            "surprised" => Self::Surprised,
            _ => Self::Calm,
        }
    }

    /// All emotions, for exhaustive table construction and tests.
    #[must_use]
    pub const fn all() -> [Self; 7] {
        [
            Self::Calm,
            Self::Happy,
            Self::Sad,
            Self::Excited,
            Self::Scared,
            Self::Angry,
            Self::Surprised,
        ]
    }
}

// ── Synthesis parameters ───────────────────────────────────────────

/// Remote-synthesis delivery parameters for one (character, emotion) cell.
///
/// All weights are in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionParams {
    /// Voice stability — lower values allow wider prosody swings.
    pub stability: f32,
    /// Similarity/fidelity weight against the reference voice.
    pub similarity: f32,
    /// Expressiveness/style weight.
    pub style: f32,
    /// Whether the backend's speaker boost is requested.
    pub speaker_boost: bool,
}

impl EmotionParams {
    const fn new(stability: f32, similarity: f32, style: f32, speaker_boost: bool) -> Self {
        Self {
            stability,
            similarity,
            style,
            speaker_boost,
        }
    }
}

// ── Voice profile ──────────────────────────────────────────────────

/// Static description of one character's synthesized voice identity.
#[derive(Debug, Clone)]
pub struct VoiceProfile {
    /// Character key this profile belongs to.
    pub character: String,
    /// Voice identifier at the remote provider.
    pub provider_voice_id: String,
    /// BCP-47 language of the character's lines.
    pub language: String,
    /// Descriptive persona label ("warm adult female"). Display only.
    pub persona: String,
    /// Per-emotion delivery parameters.
    emotions: HashMap<Emotion, EmotionParams>,
}

// ── Registry ───────────────────────────────────────────────────────

/// Lookup table from character key to [`VoiceProfile`].
pub struct VoiceProfileRegistry {
    profiles: HashMap<String, VoiceProfile>,
}

impl VoiceProfileRegistry {
    /// Build the registry with the built-in story cast.
    #[must_use]
    pub fn with_builtin_cast() -> Self {
        let mut profiles = HashMap::new();

        for profile in builtin_cast() {
            profiles.insert(profile.character.clone(), profile);
        }

        Self { profiles }
    }

    /// Resolve a character to its voice profile.
    ///
    /// Unknown characters resolve to the narrator profile — this lookup
    /// never fails.
    #[must_use]
    pub fn resolve(&self, character: &str) -> &VoiceProfile {
        self.profiles.get(character).unwrap_or_else(|| {
            &self.profiles[NARRATOR] // the builtin cast always contains it
        })
    }

    /// Delivery parameters for an emotion, falling back to the profile's
    /// calm entry when the emotion has no dedicated row.
    #[must_use]
    pub fn emotion_params(profile: &VoiceProfile, emotion: Emotion) -> EmotionParams {
        profile
            .emotions
            .get(&emotion)
            .or_else(|| profile.emotions.get(&Emotion::Calm))
            .copied()
            .unwrap_or(EmotionParams::new(0.7, 0.8, 0.3, true))
    }

    /// Character keys of all registered profiles, sorted. For settings UI.
    #[must_use]
    pub fn available_characters(&self) -> Vec<String> {
        let mut characters: Vec<String> = self.profiles.keys().cloned().collect();
        characters.sort();
        characters
    }
}

// ── Built-in cast ──────────────────────────────────────────────────

/// The emotion table shared shape: calmer rows are stable and plain,
/// excited/scared rows trade stability for style.
fn emotion_table(base_stability: f32, base_style: f32) -> HashMap<Emotion, EmotionParams> {
    let mut table = HashMap::new();
    table.insert(
        Emotion::Calm,
        EmotionParams::new(base_stability, 0.85, base_style, true),
    );
    table.insert(
        Emotion::Happy,
        EmotionParams::new(base_stability - 0.1, 0.8, base_style + 0.25, true),
    );
    table.insert(
        Emotion::Sad,
        EmotionParams::new(base_stability + 0.1, 0.85, base_style + 0.1, false),
    );
    table.insert(
        Emotion::Excited,
        EmotionParams::new(base_stability - 0.25, 0.75, base_style + 0.4, true),
    );
    table.insert(
        Emotion::Scared,
        EmotionParams::new(base_stability - 0.2, 0.75, base_style + 0.35, false),
    );
    table.insert(
        Emotion::Angry,
        EmotionParams::new(base_stability - 0.15, 0.8, base_style + 0.3, true),
    );
    table.insert(
        Emotion::Surprised,
        EmotionParams::new(base_stability - 0.2, 0.8, base_style + 0.3, true),
    );
    table
}

fn builtin_cast() -> Vec<VoiceProfile> {
    vec![
        VoiceProfile {
            character: NARRATOR.to_owned(),
            provider_voice_id: "nv-tr-selin".to_owned(),
            language: "tr-TR".to_owned(),
            persona: "warm adult female storyteller".to_owned(),
            emotions: emotion_table(0.75, 0.2),
        },
        VoiceProfile {
            character: "girl".to_owned(),
            provider_voice_id: "nv-tr-elif".to_owned(),
            language: "tr-TR".to_owned(),
            persona: "bright young girl".to_owned(),
            emotions: emotion_table(0.6, 0.35),
        },
        VoiceProfile {
            character: "wolf".to_owned(),
            provider_voice_id: "nv-tr-baran".to_owned(),
            language: "tr-TR".to_owned(),
            persona: "low gravelly adult male".to_owned(),
            emotions: emotion_table(0.7, 0.4),
        },
        VoiceProfile {
            character: "grandmother".to_owned(),
            provider_voice_id: "nv-tr-nene".to_owned(),
            language: "tr-TR".to_owned(),
            persona: "soft elderly female".to_owned(),
            emotions: emotion_table(0.8, 0.15),
        },
        VoiceProfile {
            character: "hunter".to_owned(),
            provider_voice_id: "nv-tr-demir".to_owned(),
            language: "tr-TR".to_owned(),
            persona: "steady adult male".to_owned(),
            emotions: emotion_table(0.75, 0.25),
        },
    ]
}
