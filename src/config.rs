// SYNOID Shorts Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Environment-driven settings for the shorts pipeline. `main` loads `.env`
// through dotenv before calling `ShortsConfig::from_env`.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// What to do when the downloaded footage is shorter than the voiceover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortfallPolicy {
    /// Keep the shorter picture track; the video ends when the footage does.
    #[default]
    Accept,
    /// Freeze the last frame until the voiceover ends.
    HoldLastFrame,
}

impl FromStr for ShortfallPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" | "shorter" | "none" => Ok(Self::Accept),
            "hold-last-frame" | "hold" | "freeze" => Ok(Self::HoldLastFrame),
            other => Err(format!("unknown shortfall policy '{}'", other)),
        }
    }
}

/// Look of the burned-in captions.
#[derive(Debug, Clone)]
pub struct CaptionStyle {
    pub font_size: u32,
    pub font_file: Option<PathBuf>,
    pub font_color: String,
    /// Opacity of the black box behind each line (0.0 - 1.0)
    pub box_opacity: f32,
    pub box_padding: u32,
    pub margin_bottom: u32,
    pub max_line_chars: usize,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 40,
            font_file: None,
            font_color: "white".to_string(),
            box_opacity: 0.4,
            box_padding: 12,
            margin_bottom: 40,
            max_line_chars: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShortsConfig {
    pub pexels_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub writer_api_key: Option<String>,
    pub writer_api_url: String,
    pub writer_model: String,

    pub default_voice_id: String,
    pub default_lang: String,
    pub default_query: String,

    /// Upper bound on footage candidates requested from the search provider
    pub footage_per_page: usize,
    /// Minimum width of the footage rendition picked from a search hit
    pub min_footage_width: u32,
    /// Longest slice taken from the head of each clip
    pub segment_window_secs: f64,
    pub target_width: u32,
    pub frame_rate: u32,
    pub shortfall_policy: ShortfallPolicy,
    pub captions: CaptionStyle,

    pub synthesis_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub render_timeout_secs: u64,

    pub work_dir: Option<PathBuf>,
    pub hardware_encoding: bool,

    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ytdlp_bin: String,
}

impl Default for ShortsConfig {
    fn default() -> Self {
        Self {
            pexels_api_key: None,
            elevenlabs_api_key: None,
            writer_api_key: None,
            writer_api_url: "https://api.openai.com/v1".to_string(),
            writer_model: "gpt-4o-mini".to_string(),
            default_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            default_lang: "id".to_string(),
            default_query: "motivational nature".to_string(),
            footage_per_page: 6,
            min_footage_width: 720,
            segment_window_secs: 5.0,
            target_width: 720,
            frame_rate: 24,
            shortfall_policy: ShortfallPolicy::Accept,
            captions: CaptionStyle::default(),
            synthesis_timeout_secs: 60,
            download_timeout_secs: 30,
            probe_timeout_secs: 10,
            render_timeout_secs: 600,
            work_dir: None,
            hardware_encoding: false,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            ytdlp_bin: "yt-dlp".to_string(),
        }
    }
}

impl ShortsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse = |key: &str| get(key).map(|raw| (key.to_string(), raw));

        let captions = CaptionStyle {
            font_file: get("SHORTS_FONT_FILE").map(PathBuf::from),
            font_size: parsed(parse("SHORTS_FONT_SIZE"), d.captions.font_size),
            ..CaptionStyle::default()
        };

        let segment_window_secs = parsed(parse("SHORTS_SEGMENT_WINDOW"), d.segment_window_secs);
        let segment_window_secs = if segment_window_secs > 0.0 {
            segment_window_secs
        } else {
            warn!("[CONFIG] SHORTS_SEGMENT_WINDOW must be positive, using {}", d.segment_window_secs);
            d.segment_window_secs
        };

        // yuv420p needs an even frame width.
        let target_width = parsed(parse("SHORTS_TARGET_WIDTH"), d.target_width);
        let target_width = if target_width > 0 && target_width % 2 == 0 {
            target_width
        } else {
            warn!("[CONFIG] SHORTS_TARGET_WIDTH must be a positive even number, using {}", d.target_width);
            d.target_width
        };

        Self {
            pexels_api_key: get("PEXELS_API_KEY"),
            elevenlabs_api_key: get("ELEVEN_API_KEY"),
            writer_api_key: get("SHORTS_WRITER_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            writer_api_url: get("SHORTS_WRITER_API_URL").unwrap_or(d.writer_api_url),
            writer_model: get("SHORTS_WRITER_MODEL").unwrap_or(d.writer_model),
            default_voice_id: get("SHORTS_VOICE_ID").unwrap_or(d.default_voice_id),
            default_lang: get("SHORTS_LANG").unwrap_or(d.default_lang),
            default_query: get("SHORTS_DEFAULT_QUERY").unwrap_or(d.default_query),
            footage_per_page: parsed(parse("SHORTS_FOOTAGE_PER_PAGE"), d.footage_per_page).max(1),
            min_footage_width: parsed(parse("SHORTS_MIN_FOOTAGE_WIDTH"), d.min_footage_width),
            segment_window_secs,
            target_width,
            frame_rate: parsed(parse("SHORTS_FPS"), d.frame_rate).max(1),
            shortfall_policy: parsed(parse("SHORTS_SHORTFALL"), d.shortfall_policy),
            captions,
            synthesis_timeout_secs: parsed(parse("SHORTS_SYNTHESIS_TIMEOUT"), d.synthesis_timeout_secs),
            download_timeout_secs: parsed(parse("SHORTS_DOWNLOAD_TIMEOUT"), d.download_timeout_secs),
            probe_timeout_secs: parsed(parse("SHORTS_PROBE_TIMEOUT"), d.probe_timeout_secs),
            render_timeout_secs: parsed(parse("SHORTS_RENDER_TIMEOUT"), d.render_timeout_secs),
            work_dir: get("SHORTS_WORK_DIR").map(PathBuf::from),
            hardware_encoding: parsed(parse("SHORTS_HW_ENCODE"), d.hardware_encoding),
            ffmpeg_bin: get("FFMPEG_BIN").unwrap_or(d.ffmpeg_bin),
            ffprobe_bin: get("FFPROBE_BIN").unwrap_or(d.ffprobe_bin),
            ytdlp_bin: get("YTDLP_BIN").unwrap_or(d.ytdlp_bin),
        }
    }

    pub fn has_writer(&self) -> bool {
        self.writer_api_key.is_some()
    }
}

fn parsed<T: FromStr>(entry: Option<(String, String)>, default: T) -> T {
    match entry {
        Some((key, raw)) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!("[CONFIG] Ignoring invalid value for {}: '{}'", key, raw);
                default
            }
        },
        None => default,
    }
}
