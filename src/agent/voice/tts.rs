// SYNOID Voiceover Synthesis
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Ordered chain of speech providers. Each attempt reports a tagged outcome;
// a failed attempt hands over to the next provider, and only exhausting the
// chain is an error.

use super::audio_probe::probe_audio_duration;
use crate::error::{Result, ShortsError};
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const ELEVENLABS_API: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const TRANSLATE_TTS_API: &str = "https://translate.google.com/translate_tts";

/// The translate speech endpoint rejects longer requests.
const TRANSLATE_CHUNK_CHARS: usize = 100;

/// Encoded audio returned by a provider.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    /// File extension matching the container, e.g. "mp3"
    pub extension: &'static str,
}

/// Why a single provider attempt did not produce usable audio.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderFailure {
    NotConfigured,
    Status { code: u16, body: String },
    Transport(String),
    EmptyAudio,
    CorruptAudio(String),
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "not configured"),
            Self::Status { code, body } => write!(f, "HTTP {}: {}", code, body),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::EmptyAudio => write!(f, "empty audio"),
            Self::CorruptAudio(e) => write!(f, "undecodable audio: {}", e),
        }
    }
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn speak(
        &self,
        text: &str,
        voice_id: &str,
        lang: &str,
    ) -> std::result::Result<SpeechAudio, ProviderFailure>;
}

/// Result of one provider attempt.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Produced { duration_seconds: f64 },
    Failed(ProviderFailure),
}

#[derive(Debug, Clone)]
pub struct SynthesisAttempt {
    pub provider: &'static str,
    pub outcome: AttemptOutcome,
}

/// Synthesized narration audio. Its duration drives the whole timeline.
#[derive(Debug, Clone)]
pub struct VoiceoverTrack {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub provider: &'static str,
    pub attempts: Vec<SynthesisAttempt>,
}

pub struct ProviderChain {
    providers: Vec<Arc<dyn SpeechProvider>>,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn SpeechProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// ElevenLabs first, then the translate speech endpoint.
    pub fn standard(client: reqwest::Client, elevenlabs_key: Option<String>, timeout: Duration) -> Self {
        Self::new(
            vec![
                Arc::new(ElevenLabsProvider::new(client.clone(), elevenlabs_key)),
                Arc::new(GoogleTranslateProvider::new(client)),
            ],
            timeout,
        )
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Synthesize `text` into `out_dir`. Each provider attempt is bounded by
    /// the chain timeout; an attempt that runs out hands over to the next.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        lang: &str,
        out_dir: &Path,
    ) -> Result<VoiceoverTrack> {
        if text.trim().is_empty() {
            return Err(ShortsError::InputValidation(
                "narration text is empty".to_string(),
            ));
        }

        self.run_chain(text, voice_id, lang, out_dir).await
    }

    async fn run_chain(
        &self,
        text: &str,
        voice_id: &str,
        lang: &str,
        out_dir: &Path,
    ) -> Result<VoiceoverTrack> {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            let outcome = match tokio::time::timeout(self.timeout, provider.speak(text, voice_id, lang)).await {
                Ok(Ok(audio)) => {
                    let path = out_dir.join(format!("voice_{}.{}", name, audio.extension));
                    validate_audio(&audio, &path).await
                }
                Ok(Err(failure)) => Err(failure),
                Err(_) => Err(ProviderFailure::Transport(format!(
                    "timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ))),
            };

            match outcome {
                Ok((path, duration_seconds)) => {
                    info!("[VOICE] {} produced {:.2}s of narration", name, duration_seconds);
                    attempts.push(SynthesisAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Produced { duration_seconds },
                    });
                    return Ok(VoiceoverTrack {
                        path,
                        duration_seconds,
                        provider: name,
                        attempts,
                    });
                }
                Err(failure) => {
                    warn!("[VOICE] {} failed ({}), trying next provider", name, failure);
                    attempts.push(SynthesisAttempt {
                        provider: name,
                        outcome: AttemptOutcome::Failed(failure),
                    });
                }
            }
        }

        let summary = attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed(f) => Some(format!("{}: {}", a.provider, f)),
                AttemptOutcome::Produced { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("; ");
        Err(ShortsError::external("voice synthesis", format!("all providers failed ({})", summary)))
    }
}

/// Write the audio out and check that it decodes to a positive duration.
async fn validate_audio(
    audio: &SpeechAudio,
    path: &Path,
) -> std::result::Result<(PathBuf, f64), ProviderFailure> {
    if audio.bytes.is_empty() {
        return Err(ProviderFailure::EmptyAudio);
    }
    tokio::fs::write(path, &audio.bytes)
        .await
        .map_err(|e| ProviderFailure::Transport(format!("cannot write audio: {}", e)))?;

    let probe_path = path.to_path_buf();
    let probed = tokio::task::spawn_blocking(move || probe_audio_duration(&probe_path))
        .await
        .map_err(|e| ProviderFailure::CorruptAudio(e.to_string()))?;

    let failure = match probed {
        Ok(d) if d.is_finite() && d > 0.0 => return Ok((path.to_path_buf(), d)),
        Ok(d) => ProviderFailure::CorruptAudio(format!("duration {:.3}s", d)),
        Err(e) => ProviderFailure::CorruptAudio(e),
    };
    let _ = tokio::fs::remove_file(path).await;
    Err(failure)
}

async fn read_audio_body(
    resp: reqwest::Response,
) -> std::result::Result<Vec<u8>, ProviderFailure> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderFailure::Status {
            code: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ProviderFailure::Transport(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ProviderFailure::EmptyAudio);
    }
    Ok(bytes.to_vec())
}

pub struct ElevenLabsProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ElevenLabsProvider {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn speak(
        &self,
        text: &str,
        voice_id: &str,
        _lang: &str,
    ) -> std::result::Result<SpeechAudio, ProviderFailure> {
        let key = self.api_key.as_deref().ok_or(ProviderFailure::NotConfigured)?;

        let payload = json!({
            "text": text,
            "voice_settings": { "stability": 0.4, "similarity_boost": 0.8 }
        });

        let resp = self
            .client
            .post(format!("{}/{}", ELEVENLABS_API, voice_id))
            .header("xi-api-key", key)
            .header("Accept", "audio/mpeg")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;

        Ok(SpeechAudio {
            bytes: read_audio_body(resp).await?,
            extension: "mp3",
        })
    }
}

/// Keyless speech through the translate endpoint. Long text is sent in
/// chunks and the MP3 responses are concatenated.
pub struct GoogleTranslateProvider {
    client: reqwest::Client,
}

impl GoogleTranslateProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechProvider for GoogleTranslateProvider {
    fn name(&self) -> &'static str {
        "google-translate"
    }

    async fn speak(
        &self,
        text: &str,
        _voice_id: &str,
        lang: &str,
    ) -> std::result::Result<SpeechAudio, ProviderFailure> {
        let chunks = split_for_speech(text, TRANSLATE_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(ProviderFailure::EmptyAudio);
        }

        let total = chunks.len().to_string();
        let mut bytes = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = url::Url::parse_with_params(
                TRANSLATE_TTS_API,
                &[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", lang),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.to_string().as_str()),
                    ("textlen", chunk.chars().count().to_string().as_str()),
                ],
            )
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;

            let resp = self
                .client
                .get(url)
                .header("User-Agent", "Mozilla/5.0")
                .send()
                .await
                .map_err(|e| ProviderFailure::Transport(e.to_string()))?;
            bytes.extend(read_audio_body(resp).await?);
        }

        Ok(SpeechAudio {
            bytes,
            extension: "mp3",
        })
    }
}

/// Split text into pieces of at most `max_chars` characters, breaking at
/// whitespace where possible.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current.chars().count() + 1 + word_len
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
