// SYNOID Transcript Fetch
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Pulls YouTube subtitles through yt-dlp and flattens the WebVTT into plain
// text for analysis.

use crate::error::{Result, ShortsError};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Subtitle languages tried, most preferred first.
pub const TRANSCRIPT_LANGS: [&str; 2] = ["id", "en"];

static VIDEO_ID: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:https?://)?(?:www\.|m\.)?youtube\.com/watch\?(?:[^#\s]*&)?v=([A-Za-z0-9_-]{11})",
        r"(?:https?://)?(?:www\.)?youtu\.be/([A-Za-z0-9_-]{11})",
        r"(?:https?://)?(?:www\.)?youtube\.com/(?:embed|shorts)/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("video id pattern"))
    .collect()
});

static VTT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("vtt tag pattern"));

/// The 11-character video id from a watch, short or embed link.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// WebVTT to plain text. Cue timings, headers and inline tags are dropped, and
/// the repeated lines of rolling auto-captions are collapsed.
pub fn flatten_vtt(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_header_block = false;

    for raw in vtt.lines() {
        let line = raw.trim();
        if line.is_empty() {
            in_header_block = false;
            continue;
        }
        if line.starts_with("WEBVTT") || line.starts_with("NOTE") || line.starts_with("STYLE") {
            in_header_block = true;
            continue;
        }
        if in_header_block || line.contains("-->") || line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if line.starts_with("Kind:") || line.starts_with("Language:") {
            continue;
        }

        let text = VTT_TAG.replace_all(line, "");
        let text = text
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&nbsp;", " ");
        let text = text.trim();
        if text.is_empty() || lines.last().map(String::as_str) == Some(text) {
            continue;
        }
        lines.push(text.to_string());
    }

    lines.join(" ")
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<String>;
}

/// Subtitles through the yt-dlp CLI.
pub struct YtDlpTranscripts {
    ytdlp_bin: String,
    timeout: Duration,
}

impl YtDlpTranscripts {
    pub fn new(ytdlp_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            timeout,
        }
    }

    fn build_args(video_id: &str, out_dir: &Path) -> Vec<String> {
        let template = out_dir.join("%(id)s").to_string_lossy().to_string();
        vec![
            "--skip-download".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            TRANSCRIPT_LANGS.join(","),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "-o".to_string(),
            template,
            "--".to_string(),
            format!("https://www.youtube.com/watch?v={}", video_id),
        ]
    }
}

/// Pick the subtitle file for the most preferred language present.
fn preferred_subtitle(files: &[PathBuf]) -> Option<PathBuf> {
    TRANSCRIPT_LANGS.iter().find_map(|lang| {
        files
            .iter()
            .find(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().ends_with(&format!(".{}.vtt", lang)))
                    .unwrap_or(false)
            })
            .cloned()
    })
}

#[async_trait]
impl TranscriptSource for YtDlpTranscripts {
    async fn fetch(&self, video_id: &str) -> Result<String> {
        let dir = tempfile::Builder::new().prefix("synoid_subs_").tempdir()?;
        info!("[TRANSCRIPT] Fetching subtitles for {}", video_id);

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.ytdlp_bin)
                .kill_on_drop(true)
                .args(Self::build_args(video_id, dir.path()))
                .output(),
        )
        .await
        .map_err(|_| ShortsError::Timeout {
            stage: "transcript fetch",
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| ShortsError::external("yt-dlp", format!("cannot run {}: {}", self.ytdlp_bin, e)))?;

        if !output.status.success() {
            return Err(ShortsError::external(
                "yt-dlp",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.path());
        }
        debug!("[TRANSCRIPT] yt-dlp wrote {:?}", files);

        let path = preferred_subtitle(&files)
            .ok_or_else(|| ShortsError::external("yt-dlp", "video has no id/en subtitles"))?;
        let text = flatten_vtt(&tokio::fs::read_to_string(&path).await?);
        if text.is_empty() {
            return Err(ShortsError::external("yt-dlp", "subtitle track is empty"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("youtu.be/dQw4w9WgXcQ?t=10"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://vimeo.com/123456"), None);
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
    }

    #[test]
    fn test_flatten_vtt_collapses_rolling_lines() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: id\n\n\
                   00:00:00.000 --> 00:00:02.000 align:start position:0%\n\
                   halo<00:00:00.500><c> semua</c>\n\n\
                   00:00:02.000 --> 00:00:04.000\n\
                   halo semua\nselamat pagi &amp; salam\n\n\
                   3\n00:00:04.000 --> 00:00:05.000\nselamat pagi &amp; salam\n";
        assert_eq!(flatten_vtt(vtt), "halo semua selamat pagi & salam");
    }

    #[test]
    fn test_flatten_vtt_skips_note_blocks() {
        let vtt = "WEBVTT\n\nNOTE this is a comment\nstill comment\n\n00:00.000 --> 00:01.000\nisi teks\n";
        assert_eq!(flatten_vtt(vtt), "isi teks");
    }

    #[test]
    fn test_preferred_subtitle() {
        let files = vec![PathBuf::from("/t/abc.en.vtt"), PathBuf::from("/t/abc.id.vtt")];
        assert_eq!(preferred_subtitle(&files), Some(PathBuf::from("/t/abc.id.vtt")));
        assert_eq!(preferred_subtitle(&files[..1]), Some(PathBuf::from("/t/abc.en.vtt")));
        assert_eq!(preferred_subtitle(&[]), None);
    }

    #[test]
    fn test_build_args_end_with_url() {
        let args = YtDlpTranscripts::build_args("dQw4w9WgXcQ", Path::new("/tmp/subs"));
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(sep, args.len() - 2);
        assert!(args.contains(&"id,en".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_external_error() {
        let source = YtDlpTranscripts::new("__synoid_missing_ytdlp__", Duration::from_secs(5));
        let err = source.fetch("dQw4w9WgXcQ").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExternalService);
    }
}
