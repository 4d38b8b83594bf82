// SYNOID Source Tools - Footage Acquisition
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// This module handles:
// 1. Stock footage search (Pexels video API or a local footage folder)
// 2. Best-effort downloads into the render workspace
// 3. Clip probing via ffprobe
// 4. Search query derivation from the narration script

use crate::agent::clip_assembler::{ClipDecoder, DecodedClip};
use crate::agent::download_guard::DownloadGuard;
use crate::agent::narration::keywords_from_script;
use crate::agent::production_tools::safe_arg_path;
use crate::agent::workspace::RenderWorkspace;
use crate::error::{Result, ShortsError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

const PEXELS_SEARCH_API: &str = "https://api.pexels.com/videos/search";

/// Words taken from the script head when no query is supplied.
const QUERY_WORDS: usize = 5;

const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mov", "m4v", "mkv", "avi", "webm"];

/// A search hit that has not been fetched yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FootageCandidate {
    pub uri: String,
    pub width_px: Option<u32>,
}

/// Footage available on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FootageClip {
    pub uri: String,
    pub local_path: PathBuf,
    pub width_px: Option<u32>,
}

#[async_trait]
pub trait FootageSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidates in provider relevance order, at most `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FootageCandidate>>;

    /// Make a candidate available as a local file inside `workspace`.
    async fn fetch(&self, candidate: &FootageCandidate, workspace: &RenderWorkspace) -> Result<FootageClip>;
}

/// Query used for the footage search: the explicit one, else the script head,
/// else `default_query`.
pub fn derive_search_query(query: Option<&str>, script: &str, default_query: &str) -> String {
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        return q.to_string();
    }
    let keywords = keywords_from_script(script, QUERY_WORDS);
    if keywords.is_empty() {
        default_query.to_string()
    } else {
        keywords
    }
}

/// Search and fetch footage. Individual downloads may fail; the call fails
/// only when the search is empty or nothing could be fetched.
pub async fn acquire_footage(
    source: &dyn FootageSource,
    query: &str,
    limit: usize,
    workspace: &RenderWorkspace,
) -> Result<Vec<FootageClip>> {
    info!("[SOURCE] Searching {} for '{}'", source.name(), query);
    let candidates = source.search(query, limit).await?;
    if candidates.is_empty() {
        return Err(ShortsError::NoFootageFound(query.to_string()));
    }

    let mut clips = Vec::with_capacity(candidates.len());
    let mut failures = 0usize;
    for candidate in &candidates {
        match source.fetch(candidate, workspace).await {
            Ok(clip) => clips.push(clip),
            Err(e) => {
                failures += 1;
                warn!("[SOURCE] Download failed for {}: {}", candidate.uri, e);
            }
        }
    }

    if clips.is_empty() {
        return Err(ShortsError::external(
            "footage download",
            format!("all {} download(s) failed", failures),
        ));
    }

    info!("[SOURCE] {} clip(s) ready, {} failed", clips.len(), failures);
    Ok(clips)
}

// ---------------------------------------------------------------------------
// Pexels
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PexelsSearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideo {
    #[serde(default)]
    video_files: Vec<PexelsVideoFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsVideoFile {
    #[serde(default)]
    width: Option<u32>,
    link: String,
}

/// First rendition per video that is at least `min_width` wide.
fn pick_renditions(response: PexelsSearchResponse, min_width: u32, limit: usize) -> Vec<FootageCandidate> {
    response
        .videos
        .into_iter()
        .filter_map(|video| {
            video
                .video_files
                .into_iter()
                .find(|f| f.width.unwrap_or(0) >= min_width)
                .map(|f| FootageCandidate {
                    uri: f.link,
                    width_px: f.width,
                })
        })
        .take(limit)
        .collect()
}

pub struct PexelsSource {
    client: reqwest::Client,
    api_key: Option<String>,
    min_width: u32,
    download_timeout: Duration,
}

impl PexelsSource {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        min_width: u32,
        download_timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            min_width,
            download_timeout,
        }
    }
}

#[async_trait]
impl FootageSource for PexelsSource {
    fn name(&self) -> &'static str {
        "pexels"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FootageCandidate>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ShortsError::external("pexels", "PEXELS_API_KEY is not set"))?;

        let per_page = limit.to_string();
        let resp = self
            .client
            .get(PEXELS_SEARCH_API)
            .header("Authorization", key)
            .query(&[("query", query), ("per_page", per_page.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ShortsError::external(
                "pexels",
                format!("search returned {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }

        let parsed: PexelsSearchResponse = resp.json().await?;
        Ok(pick_renditions(parsed, self.min_width, limit))
    }

    async fn fetch(&self, candidate: &FootageCandidate, workspace: &RenderWorkspace) -> Result<FootageClip> {
        DownloadGuard::validate_url(&candidate.uri).map_err(|e| ShortsError::external("pexels", e))?;

        let bytes = tokio::time::timeout(self.download_timeout, async {
            let resp = self.client.get(&candidate.uri).send().await?.error_for_status()?;
            resp.bytes().await
        })
        .await
        .map_err(|_| ShortsError::Timeout {
            stage: "footage download",
            secs: self.download_timeout.as_secs(),
        })??;

        let path = workspace.unique_file("footage", "mp4");
        tokio::fs::write(&path, &bytes).await?;

        if let Err(reason) = DownloadGuard::validate_downloaded_file(&path) {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ShortsError::external("pexels", format!("rejected download: {}", reason)));
        }

        Ok(FootageClip {
            uri: candidate.uri.clone(),
            local_path: path,
            width_px: candidate.width_px,
        })
    }
}

// ---------------------------------------------------------------------------
// Local footage folder
// ---------------------------------------------------------------------------

/// Serves clips from a directory. Files whose names share a word with the
/// query come first.
pub struct LocalFootageLibrary {
    dir: PathBuf,
}

impl LocalFootageLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FootageSource for LocalFootageLibrary {
    fn name(&self) -> &'static str {
        "local library"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<FootageCandidate>> {
        if !self.dir.is_dir() {
            return Err(ShortsError::InputValidation(format!(
                "footage directory {:?} does not exist",
                self.dir
            )));
        }

        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let mut files = scan_directory_for_videos_async(&self.dir).await;
        files.sort();

        let (mut matching, rest): (Vec<PathBuf>, Vec<PathBuf>) = files.into_iter().partition(|p| {
            let stem = p
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            words.iter().any(|w| stem.contains(w.as_str()))
        });
        matching.extend(rest);

        Ok(matching
            .into_iter()
            .take(limit)
            .map(|p| FootageCandidate {
                uri: p.to_string_lossy().to_string(),
                width_px: None,
            })
            .collect())
    }

    async fn fetch(&self, candidate: &FootageCandidate, _workspace: &RenderWorkspace) -> Result<FootageClip> {
        let path = PathBuf::from(&candidate.uri);
        if !path.is_file() {
            return Err(ShortsError::InputValidation(format!("{:?} is not a file", path)));
        }
        Ok(FootageClip {
            uri: candidate.uri.clone(),
            local_path: path,
            width_px: None,
        })
    }
}

/// Scan a directory for video files.
pub async fn scan_directory_for_videos_async(dir: &Path) -> Vec<PathBuf> {
    let mut videos = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(_) => return videos,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if is_video {
            videos.push(path);
        }
    }
    videos
}

// ---------------------------------------------------------------------------
// ffprobe
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Facts from `ffprobe -of json`: (duration, display width, display height).
pub fn parse_probe_json(json: &str) -> std::result::Result<(f64, u32, u32), String> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("unreadable ffprobe output: {}", e))?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| "no video stream".to_string())?;

    let (mut width, mut height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };

    let rotation = stream
        .side_data_list
        .iter()
        .find_map(|s| s.rotation)
        .or_else(|| {
            stream
                .tags
                .as_ref()
                .and_then(|t| t.rotate.as_deref())
                .and_then(|r| r.parse::<f64>().ok())
        })
        .unwrap_or(0.0);
    if (rotation.abs() as i64) % 180 == 90 {
        std::mem::swap(&mut width, &mut height);
    }

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or_else(|| "no duration".to_string())?;

    Ok((duration, width, height))
}

/// Reads clip facts with ffprobe, bounded by a timeout.
pub struct FfprobeDecoder {
    ffprobe_bin: String,
    timeout: Duration,
}

impl FfprobeDecoder {
    pub fn new(ffprobe_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
            timeout,
        }
    }

    pub async fn probe(&self, path: &Path) -> std::result::Result<(f64, u32, u32), String> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.ffprobe_bin)
                .kill_on_drop(true)
                .args([
                    "-v",
                    "error",
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=width,height,duration:stream_tags=rotate:stream_side_data=rotation:format=duration",
                    "-of",
                    "json",
                ])
                .arg(safe_arg_path(path))
                .output(),
        )
        .await
        .map_err(|_| format!("ffprobe timed out after {}s", self.timeout.as_secs()))?
        .map_err(|e| format!("cannot run {}: {}", self.ffprobe_bin, e))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        parse_probe_json(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl ClipDecoder for FfprobeDecoder {
    async fn decode(&self, clip: &FootageClip) -> Result<DecodedClip> {
        let (duration_seconds, width_px, height_px) = self
            .probe(&clip.local_path)
            .await
            .map_err(|reason| ShortsError::AssetDecode {
                uri: clip.uri.clone(),
                reason,
            })?;
        Ok(DecodedClip {
            uri: clip.uri.clone(),
            path: clip.local_path.clone(),
            duration_seconds,
            width_px,
            height_px,
        })
    }
}
