// SYNOID Shorts Pipeline
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Narration in, MP4 out. Stages run in order on the calling task and share
// only the read-only `PipelineContext`; every temporary lives in a
// request-scoped workspace that is removed on all exit paths.

use crate::agent::captions::{render_cues, segment};
use crate::agent::clip_assembler::{assemble, AssemblyOptions, ClipDecoder};
use crate::agent::narration::{normalize, NormalizedNarration};
use crate::agent::production_tools::{Compositor, RenderSpec, RenderedFile};
use crate::agent::source_tools::{
    acquire_footage, derive_search_query, FfprobeDecoder, FootageSource, LocalFootageLibrary,
    PexelsSource,
};
use crate::agent::transcript::{extract_video_id, TranscriptSource, YtDlpTranscripts};
use crate::agent::voice::ProviderChain;
use crate::agent::workspace::RenderWorkspace;
use crate::agent::writer::{ChatCompletionsClient, ScriptWriter};
use crate::config::ShortsConfig;
use crate::encoder_backend::EncoderBackend;
use crate::error::{Result, ShortsError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Normalize,
    Voiceover,
    Footage,
    Assemble,
    Captions,
    Render,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Normalize => "normalize",
            Self::Voiceover => "voiceover",
            Self::Footage => "footage",
            Self::Assemble => "assemble",
            Self::Captions => "captions",
            Self::Render => "render",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Plain,
    Captioned,
}

#[derive(Debug, Clone)]
pub struct ShortRequest {
    pub text: String,
    pub query: Option<String>,
    pub voice_id: Option<String>,
    pub lang: Option<String>,
    pub mode: RenderMode,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortReport {
    pub output_path: PathBuf,
    pub duration_seconds: f64,
    pub size_mb: f64,
    pub mode: RenderMode,
    pub narration: String,
    pub query: String,
    pub voice_provider: &'static str,
    pub voice_duration_seconds: f64,
    pub segments: usize,
    pub skipped_clips: usize,
    pub captions_rendered: usize,
    pub captions_dropped: usize,
}

#[derive(Debug, Clone)]
pub struct VoiceoverRequest {
    pub text: String,
    pub voice_id: Option<String>,
    pub lang: Option<String>,
    /// Rewrite the text with the script writer before synthesis
    pub polish: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceoverReport {
    pub path: PathBuf,
    pub narration: String,
    pub provider: &'static str,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkAnalysis {
    pub video_id: String,
    pub analysis: String,
    pub raw_transcript: String,
}

/// Shared, read-only collaborators for every request.
pub struct PipelineContext {
    pub config: ShortsConfig,
    pub voice: ProviderChain,
    pub footage: Arc<dyn FootageSource>,
    pub decoder: Arc<dyn ClipDecoder>,
    pub compositor: Compositor,
    pub writer: Option<ScriptWriter>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub started: Instant,
}

impl PipelineContext {
    /// Production wiring. `footage_dir` swaps Pexels for a local folder.
    pub fn from_config(config: ShortsConfig, footage_dir: Option<PathBuf>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("synoid-shorts/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ShortsError::external("http client", e.to_string()))?;

        let voice = ProviderChain::standard(
            http.clone(),
            config.elevenlabs_api_key.clone(),
            Duration::from_secs(config.synthesis_timeout_secs),
        );

        let footage: Arc<dyn FootageSource> = match footage_dir {
            Some(dir) => Arc::new(LocalFootageLibrary::new(dir)),
            None => Arc::new(PexelsSource::new(
                http.clone(),
                config.pexels_api_key.clone(),
                config.min_footage_width,
                Duration::from_secs(config.download_timeout_secs),
            )),
        };

        let decoder = Arc::new(FfprobeDecoder::new(
            config.ffprobe_bin.clone(),
            Duration::from_secs(config.probe_timeout_secs),
        ));

        let compositor = Compositor::new(
            config.ffmpeg_bin.clone(),
            EncoderBackend::detect(config.hardware_encoding),
            Duration::from_secs(config.render_timeout_secs),
        );

        let writer = config.writer_api_key.as_deref().map(|key| {
            ScriptWriter::new(Arc::new(ChatCompletionsClient::new(
                http.clone(),
                &config.writer_api_url,
                key,
                &config.writer_model,
            )))
        });

        let transcripts = Arc::new(YtDlpTranscripts::new(
            config.ytdlp_bin.clone(),
            Duration::from_secs(config.download_timeout_secs * 4),
        ));

        Ok(Self {
            config,
            voice,
            footage,
            decoder,
            compositor,
            writer,
            transcripts,
            started: Instant::now(),
        })
    }

    pub fn writer(&self) -> Result<&ScriptWriter> {
        self.writer.as_ref().ok_or(ShortsError::GeneratorUnavailable)
    }

    fn report_progress(&self, stage: PipelineStage, detail: &str) {
        info!("[PIPELINE] {}: {}", stage, detail);
    }

    /// Produce a short from narration text.
    pub async fn produce_short(&self, req: &ShortRequest) -> Result<ShortReport> {
        if req.text.trim().is_empty() {
            return Err(ShortsError::InputValidation(
                "narration text must not be empty".to_string(),
            ));
        }
        let cfg = &self.config;
        let t0 = Instant::now();

        let narration = normalize(&req.text);
        self.report_progress(
            PipelineStage::Normalize,
            &format!("{} word(s) of narration", narration.word_count()),
        );

        let workspace = RenderWorkspace::create(cfg.work_dir.as_deref())?;

        let voice_id = req.voice_id.as_deref().unwrap_or(&cfg.default_voice_id);
        let lang = req.lang.as_deref().unwrap_or(&cfg.default_lang);
        let voiceover = self
            .voice
            .synthesize(narration.text(), voice_id, lang, workspace.path())
            .await?;
        self.report_progress(
            PipelineStage::Voiceover,
            &format!("{:.2}s from {}", voiceover.duration_seconds, voiceover.provider),
        );

        let query = derive_search_query(req.query.as_deref(), &req.text, &cfg.default_query);
        let clips = acquire_footage(self.footage.as_ref(), &query, cfg.footage_per_page, &workspace).await?;
        self.report_progress(PipelineStage::Footage, &format!("{} clip(s) for '{}'", clips.len(), query));

        let opts = AssemblyOptions {
            window_secs: cfg.segment_window_secs,
            target_width: cfg.target_width,
            shortfall_policy: cfg.shortfall_policy,
            min_segment_secs: 1.0 / f64::from(cfg.frame_rate.max(1)),
        };
        let timeline = assemble(&clips, voiceover.duration_seconds, self.decoder.as_ref(), &opts).await?;
        self.report_progress(
            PipelineStage::Assemble,
            &format!("{} segment(s), {:.2}s", timeline.segments.len(), timeline.total_duration),
        );

        let captioned = req.mode == RenderMode::Captioned;
        let batch = if captioned {
            let cues = segment(&narration, voiceover.duration_seconds);
            let batch = render_cues(&cues, &workspace.captions_dir()?, &cfg.captions);
            self.report_progress(
                PipelineStage::Captions,
                &format!("{} cue(s), {} dropped", batch.layers.len(), batch.dropped.len()),
            );
            Some(batch)
        } else {
            None
        };
        let layers = batch.as_ref().map(|b| b.layers.as_slice()).unwrap_or(&[]);

        let spec = RenderSpec::for_captions(&req.output_path, captioned, cfg.frame_rate);
        let rendered: RenderedFile = match self.compositor.render(&timeline, &voiceover, layers, &spec).await {
            Err(ShortsError::Render(reason)) if !layers.is_empty() => {
                warn!(
                    "[CAPTIONS] Caption overlay failed ({}), rendering without captions",
                    reason
                );
                self.compositor.render(&timeline, &voiceover, &[], &spec).await?
            }
            result => result?,
        };
        self.report_progress(
            PipelineStage::Render,
            &format!("{:?} in {:.1}s", rendered.path, t0.elapsed().as_secs_f64()),
        );

        Ok(ShortReport {
            output_path: rendered.path,
            duration_seconds: rendered.duration_seconds,
            size_mb: rendered.size_mb,
            mode: req.mode,
            narration: narration.into_string(),
            query,
            voice_provider: voiceover.provider,
            voice_duration_seconds: voiceover.duration_seconds,
            segments: timeline.segments.len(),
            skipped_clips: timeline.skipped.len(),
            captions_rendered: rendered.caption_count,
            captions_dropped: batch.as_ref().map(|b| b.dropped.len()).unwrap_or(0) + layers.len()
                - rendered.caption_count,
        })
    }

    /// Synthesize a standalone voiceover into `output_path`.
    pub async fn produce_voiceover(
        &self,
        req: &VoiceoverRequest,
        output_path: &Path,
    ) -> Result<VoiceoverReport> {
        if req.text.trim().is_empty() {
            return Err(ShortsError::InputValidation(
                "voiceover text must not be empty".to_string(),
            ));
        }
        let cfg = &self.config;

        let source = if req.polish {
            self.writer()?.polish_voiceover(&req.text).await?
        } else {
            req.text.clone()
        };
        let narration: NormalizedNarration = normalize(&source);

        let workspace = RenderWorkspace::create(cfg.work_dir.as_deref())?;
        let voice_id = req.voice_id.as_deref().unwrap_or(&cfg.default_voice_id);
        let lang = req.lang.as_deref().unwrap_or(&cfg.default_lang);
        let track = self
            .voice
            .synthesize(narration.text(), voice_id, lang, workspace.path())
            .await?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&track.path, output_path).await?;

        Ok(VoiceoverReport {
            path: output_path.to_path_buf(),
            narration: narration.into_string(),
            provider: track.provider,
            duration_seconds: track.duration_seconds,
        })
    }

    /// Transcript plus analysis for a YouTube link.
    pub async fn analyze_link(&self, url: &str) -> Result<LinkAnalysis> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ShortsError::InputValidation("url must not be empty".to_string()));
        }
        let video_id = extract_video_id(url)
            .ok_or_else(|| ShortsError::InputValidation(format!("not a YouTube link: {}", url)))?;
        let writer = self.writer()?;

        let transcript = self.transcripts.fetch(&video_id).await?;
        let analysis = writer.analyze_transcript(&transcript).await?;
        Ok(LinkAnalysis {
            video_id,
            analysis,
            raw_transcript: transcript,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::agent::clip_assembler::DecodedClip;
    use crate::agent::source_tools::{FootageCandidate, FootageClip};
    use crate::agent::voice::{ProviderFailure, SpeechAudio, SpeechProvider};
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn wav_bytes(seconds: f64) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..(seconds * 8000.0) as usize {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[derive(Default)]
    pub struct SilentVoice {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechProvider for SilentVoice {
        fn name(&self) -> &'static str {
            "silent"
        }

        async fn speak(
            &self,
            _text: &str,
            _voice_id: &str,
            _lang: &str,
        ) -> std::result::Result<SpeechAudio, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SpeechAudio {
                bytes: wav_bytes(2.0),
                extension: "wav",
            })
        }
    }

    pub struct NoFootage;

    #[async_trait]
    impl FootageSource for NoFootage {
        fn name(&self) -> &'static str {
            "empty"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<FootageCandidate>> {
            Ok(Vec::new())
        }

        async fn fetch(&self, candidate: &FootageCandidate, _ws: &RenderWorkspace) -> Result<FootageClip> {
            Err(ShortsError::external("empty", format!("cannot fetch {}", candidate.uri)))
        }
    }

    /// One candidate whose download is an empty placeholder file.
    pub struct FixedFootage;

    #[async_trait]
    impl FootageSource for FixedFootage {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<FootageCandidate>> {
            Ok(vec![FootageCandidate {
                uri: "fixed://clip".to_string(),
                width_px: Some(1280),
            }])
        }

        async fn fetch(&self, candidate: &FootageCandidate, ws: &RenderWorkspace) -> Result<FootageClip> {
            let local_path = ws.unique_file("clip", "mp4");
            tokio::fs::write(&local_path, b"").await?;
            Ok(FootageClip {
                uri: candidate.uri.clone(),
                local_path,
                width_px: candidate.width_px,
            })
        }
    }

    /// Reports every clip as 10s of 1280x720.
    pub struct AcceptAll;

    #[async_trait]
    impl ClipDecoder for AcceptAll {
        async fn decode(&self, clip: &FootageClip) -> Result<DecodedClip> {
            Ok(DecodedClip {
                uri: clip.uri.clone(),
                path: clip.local_path.clone(),
                duration_seconds: 10.0,
                width_px: 1280,
                height_px: 720,
            })
        }
    }

    pub struct RejectAll;

    #[async_trait]
    impl ClipDecoder for RejectAll {
        async fn decode(&self, clip: &FootageClip) -> Result<DecodedClip> {
            Err(ShortsError::AssetDecode {
                uri: clip.uri.clone(),
                reason: "test".into(),
            })
        }
    }

    pub struct FixedTranscript;

    #[async_trait]
    impl TranscriptSource for FixedTranscript {
        async fn fetch(&self, _video_id: &str) -> Result<String> {
            Ok("halo semua selamat datang".to_string())
        }
    }

    /// Context with offline fakes; renders go to a binary that does not exist.
    pub fn offline_context(work_dir: &Path, voice: Arc<SilentVoice>) -> PipelineContext {
        let config = ShortsConfig {
            work_dir: Some(work_dir.to_path_buf()),
            ..ShortsConfig::default()
        };
        PipelineContext {
            config,
            voice: ProviderChain::new(vec![voice], Duration::from_secs(10)),
            footage: Arc::new(NoFootage),
            decoder: Arc::new(RejectAll),
            compositor: Compositor::new(
                "__synoid_missing_ffmpeg__",
                EncoderBackend::software(),
                Duration::from_secs(5),
            ),
            writer: None,
            transcripts: Arc::new(FixedTranscript),
            started: Instant::now(),
        }
    }
}
