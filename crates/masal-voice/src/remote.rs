//! Remote voice client — one request/response exchange per narration line.
//!
//! The backend is a black box: given text and a voice profile it returns
//! playable audio bytes, an explicit fallback indicator, or an error. A
//! single failure is sufficient justification to fall back to local
//! synthesis — the client never retries, trading fidelity for reliability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::PlayableAudio;
use crate::error::NarrationError;
use crate::profiles::EmotionParams;

/// Smallest payload accepted as playable audio. Anything shorter is a
/// truncated or bodyless response and routes to local synthesis.
pub const MIN_PLAYABLE_BYTES: usize = 1024;

// ── Port ───────────────────────────────────────────────────────────

/// What one generation attempt produced.
#[derive(Debug, Clone)]
pub enum RemoteOutcome {
    /// Playable audio bytes for the line.
    Audio(PlayableAudio),
    /// The backend declined (explicitly or by failing); use local synthesis.
    UseLocal,
}

/// Backend-agnostic remote voice generation.
///
/// `Err` is reserved for the truly unexpected class (request construction,
/// client misconfiguration). Ordinary transport and payload failures map to
/// [`RemoteOutcome::UseLocal`] so the session can fall back without
/// treating them as exceptional.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Generate audio for one line under one voice profile.
    async fn generate(
        &self,
        text: &str,
        voice_id: &str,
        params: &EmotionParams,
    ) -> Result<RemoteOutcome, NarrationError>;
}

// ── Wire shapes ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    /// The caller's text, verbatim. No markup is injected and no vocabulary
    /// substitution is applied; the backend pronounces exactly this string.
    text: &'a str,
    voice_settings: VoiceSettingsBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSettingsBody {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

/// A JSON success body the backend sends instead of audio when it wants the
/// client to use local synthesis for this line.
#[derive(Deserialize)]
struct FallbackBody {
    #[serde(default)]
    fallback: bool,
}

// ── HTTP client ────────────────────────────────────────────────────

/// Remote voice client over HTTP.
pub struct HttpVoiceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVoiceClient {
    /// Create a client against a backend base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{voice_id}", self.base_url)
    }
}

#[async_trait]
impl VoiceBackend for HttpVoiceClient {
    async fn generate(
        &self,
        text: &str,
        voice_id: &str,
        params: &EmotionParams,
    ) -> Result<RemoteOutcome, NarrationError> {
        if voice_id.is_empty() {
            // A profile without a provider voice cannot be addressed at all;
            // this is a wiring bug, not a transport hiccup.
            return Err(NarrationError::Integration(
                "voice profile has no provider voice id".to_owned(),
            ));
        }

        let body = GenerateBody {
            text,
            voice_settings: VoiceSettingsBody {
                stability: params.stability,
                similarity_boost: params.similarity,
                style: params.style,
                use_speaker_boost: params.speaker_boost,
            },
        };

        let mut request = self.http.post(self.endpoint(voice_id)).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("xi-api-key", key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(voice_id, error = %e, "Voice backend unreachable, using local synthesis");
                return Ok(RemoteOutcome::UseLocal);
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(voice_id, %status, "Voice backend returned failure status");
            return Ok(RemoteOutcome::UseLocal);
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(voice_id, error = %e, "Voice backend body read failed");
                return Ok(RemoteOutcome::UseLocal);
            }
        };

        if is_json {
            // Success status with a JSON body: either an explicit fallback
            // flag, or a shape we don't recognize — both route to local.
            let explicit = serde_json::from_slice::<FallbackBody>(&bytes)
                .map(|b| b.fallback)
                .unwrap_or(false);
            tracing::debug!(voice_id, explicit, "Voice backend requested local fallback");
            return Ok(RemoteOutcome::UseLocal);
        }

        if bytes.len() < MIN_PLAYABLE_BYTES {
            tracing::warn!(
                voice_id,
                len = bytes.len(),
                "Voice backend payload below minimum viable size"
            );
            return Ok(RemoteOutcome::UseLocal);
        }

        tracing::debug!(voice_id, len = bytes.len(), "Voice backend returned audio");
        Ok(RemoteOutcome::Audio(PlayableAudio::new(bytes.to_vec())))
    }
}
