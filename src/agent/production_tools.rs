// SYNOID Production Tools - Final Composite
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// The one heavy encode of a short: timeline graph, voiceover audio and
// caption overlays go through a single ffmpeg invocation.

use crate::agent::captions::CaptionLayer;
use crate::agent::clip_assembler::AssembledTimeline;
use crate::agent::video_stitcher::VideoStitcher;
use crate::agent::voice::VoiceoverTrack;
use crate::encoder_backend::EncoderBackend;
use crate::error::{Result, ShortsError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info};

/// Frame rate used whenever captions are burned in.
pub const CAPTIONED_FPS: u32 = 24;

const STDERR_TAIL_LINES: usize = 12;

/// Prefix paths that would otherwise be read as an ffmpeg flag.
pub fn safe_arg_path(path: &Path) -> PathBuf {
    if path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

#[derive(Debug, Clone)]
pub struct RenderSpec {
    pub output_path: PathBuf,
    pub fps: u32,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

impl RenderSpec {
    pub fn new(output_path: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            output_path: output_path.into(),
            fps: fps.max(1),
            audio_codec: "aac",
            audio_bitrate: "192k",
        }
    }

    /// 24 fps when captions are present, otherwise `default_fps`.
    pub fn for_captions(output_path: impl Into<PathBuf>, captioned: bool, default_fps: u32) -> Self {
        Self::new(output_path, if captioned { CAPTIONED_FPS } else { default_fps })
    }
}

/// Result of a render
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub size_mb: f64,
    pub caption_count: usize,
}

/// Where ffmpeg writes before the file is moved into place.
fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "render.mp4".to_string());
    output.with_file_name(format!(".{}.part", name))
}

/// ffmpeg arguments for the composite. Pure; nothing is spawned.
pub fn build_render_args(
    timeline: &AssembledTimeline,
    voiceover: &VoiceoverTrack,
    layers: &[CaptionLayer],
    spec: &RenderSpec,
    encoder: &EncoderBackend,
    output: &Path,
) -> Result<Vec<String>> {
    if timeline.segments.is_empty() || timeline.total_duration <= 0.0 {
        return Err(ShortsError::Render("timeline is empty".to_string()));
    }
    if !voiceover.duration_seconds.is_finite() || voiceover.duration_seconds <= 0.0 {
        return Err(ShortsError::Render(format!(
            "voiceover duration must be positive, got {}",
            voiceover.duration_seconds
        )));
    }

    let graph = VideoStitcher::timeline_graph(timeline, spec.fps);
    let mut args: Vec<String> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in &graph.inputs {
        args.push("-i".into());
        args.push(safe_arg_path(input).to_string_lossy().to_string());
    }
    let audio_index = graph.inputs.len();
    args.push("-i".into());
    args.push(safe_arg_path(&voiceover.path).to_string_lossy().to_string());

    let mut filter = graph.filter;
    let video_label = if layers.is_empty() {
        graph.output_label.to_string()
    } else {
        let overlays = layers
            .iter()
            .map(|l| l.filter.as_str())
            .collect::<Vec<_>>()
            .join(",");
        filter.push_str(&format!(";[{}]{}[vout]", graph.output_label, overlays));
        "vout".to_string()
    };

    args.push("-filter_complex".into());
    args.push(filter);
    args.extend(["-map".to_string(), format!("[{}]", video_label)]);
    // Footage audio is never mapped; the voiceover is the only sound.
    args.extend(["-map".to_string(), format!("{}:a:0", audio_index)]);

    args.extend(["-c:v".to_string(), encoder.ffmpeg_encoder().to_string()]);
    args.extend(encoder.quality_args().into_iter().map(str::to_string));
    let fps = spec.fps.to_string();
    let length = format!("{:.3}", timeline.total_duration);
    args.extend(
        [
            "-pix_fmt",
            "yuv420p",
            "-r",
            fps.as_str(),
            "-c:a",
            spec.audio_codec,
            "-b:a",
            spec.audio_bitrate,
            "-t",
            length.as_str(),
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(safe_arg_path(output).to_string_lossy().to_string());
    Ok(args)
}

pub struct Compositor {
    ffmpeg_bin: String,
    encoder: EncoderBackend,
    timeout: Duration,
}

impl Compositor {
    pub fn new(ffmpeg_bin: impl Into<String>, encoder: EncoderBackend, timeout: Duration) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            encoder,
            timeout,
        }
    }

    /// Encode the final MP4. On any failure no file is left at the output path.
    pub async fn render(
        &self,
        timeline: &AssembledTimeline,
        voiceover: &VoiceoverTrack,
        layers: &[CaptionLayer],
        spec: &RenderSpec,
    ) -> Result<RenderedFile> {
        let partial = partial_path(&spec.output_path);
        let args = build_render_args(timeline, voiceover, layers, spec, &self.encoder, &partial)?;

        if let Some(parent) = spec.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            "[PROD] Rendering {:.2}s short with {} caption(s) via {} -> {:?}",
            timeline.total_duration,
            layers.len(),
            self.encoder.ffmpeg_encoder(),
            spec.output_path
        );

        let run = Command::new(&self.ffmpeg_bin)
            .kill_on_drop(true)
            .args(&args)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(ShortsError::Render(format!("cannot run {}: {}", self.ffmpeg_bin, e)));
            }
            Err(_) => {
                let _ = tokio::fs::remove_file(&partial).await;
                error!("[PROD] Render timed out after {}s", self.timeout.as_secs());
                return Err(ShortsError::Timeout {
                    stage: "render",
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&partial).await;
            let tail = stderr_tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES);
            error!("[PROD] ffmpeg failed: {}", tail);
            return Err(ShortsError::Render(tail));
        }

        let size = match tokio::fs::metadata(&partial).await {
            Ok(m) if m.len() > 0 => m.len(),
            _ => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(ShortsError::Render("ffmpeg produced no output".to_string()));
            }
        };
        tokio::fs::rename(&partial, &spec.output_path).await?;

        let size_mb = size as f64 / 1_048_576.0;
        info!("[PROD] Render complete: {:?} ({:.2} MB)", spec.output_path, size_mb);

        Ok(RenderedFile {
            path: spec.output_path.clone(),
            duration_seconds: timeline.total_duration,
            size_mb,
            caption_count: layers.len(),
        })
    }
}

fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = all.len().saturating_sub(lines);
    let tail = all[start..].join("\n");
    if tail.is_empty() {
        "ffmpeg exited with an error".to_string()
    } else {
        tail
    }
}
