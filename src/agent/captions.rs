// SYNOID Caption Segmenter
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Splits narration into sentence cues spread evenly over the voiceover,
// then turns each cue into a drawtext layer for the compositor.
// Captions are best-effort: a cue that cannot be rendered is dropped.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::agent::narration::NormalizedNarration;
use crate::config::CaptionStyle;

/// One timed subtitle line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    pub text: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl CaptionCue {
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }
}

/// Split on `.`, `!` or `?` followed by whitespace. Empty fragments are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map(|n| n.is_whitespace()).unwrap_or(false);
        if at_boundary {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

/// Spread the narration's sentences evenly over `total_duration` seconds.
///
/// Cues are contiguous and cover `[0, total_duration)` exactly.
pub fn segment(narration: &NormalizedNarration, total_duration: f64) -> Vec<CaptionCue> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        warn!("[CAPTIONS] Invalid voiceover duration {}, no captions", total_duration);
        return Vec::new();
    }

    let mut sentences = split_sentences(narration.text());
    if sentences.is_empty() {
        let whole = narration.text().trim();
        if whole.is_empty() {
            return Vec::new();
        }
        sentences.push(whole.to_string());
    }

    let n = sentences.len();
    let per_cue = total_duration / n as f64;
    sentences
        .into_iter()
        .enumerate()
        .map(|(i, text)| CaptionCue {
            text,
            start_seconds: i as f64 * per_cue,
            // Last cue absorbs float drift so the cues end exactly on the voiceover.
            duration_seconds: if i + 1 == n {
                total_duration - i as f64 * per_cue
            } else {
                per_cue
            },
        })
        .collect()
}

/// Why a cue could not be turned into a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptionRenderError {
    EmptyText,
    Unrenderable(char),
    Io(String),
}

impl std::fmt::Display for CaptionRenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "caption text is empty"),
            Self::Unrenderable(c) => write!(f, "unrenderable glyph U+{:04X}", *c as u32),
            Self::Io(e) => write!(f, "cannot write caption text: {}", e),
        }
    }
}

/// A cue ready for compositing: a drawtext filter reading its text from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayer {
    pub cue: CaptionCue,
    pub text_file: PathBuf,
    pub filter: String,
}

/// Outcome of rendering a batch of cues.
#[derive(Debug, Default)]
pub struct CaptionBatch {
    pub layers: Vec<CaptionLayer>,
    pub dropped: Vec<(CaptionCue, CaptionRenderError)>,
}

/// Characters the default caption font is expected to draw.
fn is_renderable(c: char) -> bool {
    let code = c as u32;
    let private_use = (0xE000..=0xF8FF).contains(&code);
    !c.is_control() && !private_use && c != '\u{FFFD}' && code <= 0xFFFF
}

/// Greedy word wrap so long sentences stay inside the frame.
pub fn wrap_caption(text: &str, max_chars: usize) -> String {
    let max_chars = max_chars.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let needed = if line.is_empty() {
            word.chars().count()
        } else {
            line.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

/// Escape a path for use inside a single-quoted filtergraph option.
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 8);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Build the drawtext filter for a cue whose wrapped text lives in `text_file`.
pub fn drawtext_filter(cue: &CaptionCue, text_file: &Path, style: &CaptionStyle) -> String {
    let mut filter = format!("drawtext=textfile='{}'", escape_filter_path(text_file));
    if let Some(font) = &style.font_file {
        filter.push_str(&format!(":fontfile='{}'", escape_filter_path(font)));
    }
    filter.push_str(&format!(
        ":expansion=none:fontsize={size}:fontcolor={color}:line_spacing=6:box=1:boxcolor=black@{opacity:.2}:boxborderw={pad}:x=(w-text_w)/2:y=h-text_h-{margin}:enable='gte(t,{start:.3})*lt(t,{end:.3})'",
        size = style.font_size,
        color = style.font_color,
        opacity = style.box_opacity.clamp(0.0, 1.0),
        pad = style.box_padding,
        margin = style.margin_bottom,
        start = cue.start_seconds,
        end = cue.end_seconds(),
    ));
    filter
}

/// Render one cue into `dir`. `index` keeps text file names unique.
pub fn render_cue(
    cue: &CaptionCue,
    index: usize,
    dir: &Path,
    style: &CaptionStyle,
) -> Result<CaptionLayer, CaptionRenderError> {
    let text = cue.text.trim();
    if text.is_empty() {
        return Err(CaptionRenderError::EmptyText);
    }
    if let Some(bad) = text.chars().find(|c| !is_renderable(*c)) {
        return Err(CaptionRenderError::Unrenderable(bad));
    }

    let text_file = dir.join(format!("caption_{:03}.txt", index));
    std::fs::write(&text_file, wrap_caption(text, style.max_line_chars))
        .map_err(|e| CaptionRenderError::Io(e.to_string()))?;

    Ok(CaptionLayer {
        cue: cue.clone(),
        filter: drawtext_filter(cue, &text_file, style),
        text_file,
    })
}

/// Render every cue, keeping the ones that succeed.
pub fn render_cues(cues: &[CaptionCue], dir: &Path, style: &CaptionStyle) -> CaptionBatch {
    let mut batch = CaptionBatch::default();
    for (i, cue) in cues.iter().enumerate() {
        match render_cue(cue, i, dir, style) {
            Ok(layer) => batch.layers.push(layer),
            Err(e) => {
                warn!(
                    "[CAPTIONS] Dropping cue '{}': {}",
                    cue.text.chars().take(30).collect::<String>(),
                    e
                );
                batch.dropped.push((cue.clone(), e));
            }
        }
    }

    if batch.layers.is_empty() && !cues.is_empty() {
        warn!("[CAPTIONS] No cue could be rendered, continuing without captions");
    } else {
        info!(
            "[CAPTIONS] {} cue(s) ready, {} dropped",
            batch.layers.len(),
            batch.dropped.len()
        );
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::narration::normalize;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Halo dunia. Ini video singkat."),
            vec!["Halo dunia.", "Ini video singkat."]
        );
        assert_eq!(
            split_sentences("Wow!  Benarkah?Ya. 3.14 itu pi"),
            vec!["Wow!", "Benarkah?Ya.", "3.14 itu pi"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_two_sentence_scenario() {
        let narration = normalize("Halo dunia. Ini video singkat.");
        let cues = segment(&narration, 6.0);
        assert_eq!(cues.len(), 2);
        assert!((cues[0].start_seconds - 0.0).abs() < EPS);
        assert!((cues[0].duration_seconds - 3.0).abs() < EPS);
        assert!((cues[1].start_seconds - 3.0).abs() < EPS);
        assert!((cues[1].duration_seconds - 3.0).abs() < EPS);
    }

    #[test]
    fn test_cues_contiguous_and_cover_duration() {
        let narration = normalize(
            "Satu langkah kecil. Dua langkah lagi! Apakah kamu siap? Ayo mulai sekarang. Tetap semangat.",
        );
        for total in [1.0, 7.3, 12.0, 59.97] {
            let cues = segment(&narration, total);
            assert_eq!(cues.len(), 5);
            assert!(cues[0].start_seconds.abs() < EPS);
            for pair in cues.windows(2) {
                assert!(pair[0].start_seconds < pair[1].start_seconds);
                assert!((pair[0].end_seconds() - pair[1].start_seconds).abs() < 1e-6);
            }
            let last = cues.last().unwrap();
            assert!((last.end_seconds() - total).abs() < 1e-6);
            let sum: f64 = cues.iter().map(|c| c.duration_seconds).sum();
            assert!((sum - total).abs() < 1e-6);
        }
    }

    #[test]
    fn test_no_terminator_is_one_cue() {
        let narration = normalize("tanpa tanda baca sama sekali");
        let cues = segment(&narration, 4.5);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "tanpa tanda baca sama sekali");
        assert!((cues[0].duration_seconds - 4.5).abs() < EPS);
    }

    #[test]
    fn test_invalid_duration_yields_no_cues() {
        let narration = normalize("Halo dunia. Ini video singkat.");
        assert!(segment(&narration, 0.0).is_empty());
        assert!(segment(&narration, f64::NAN).is_empty());
    }

    #[test]
    fn test_wrap_caption() {
        assert_eq!(wrap_caption("satu dua tiga empat", 9), "satu dua\ntiga\nempat");
        assert_eq!(wrap_caption("superpanjangsekali kata", 5), "superpanjangsekali\nkata");
        assert_eq!(wrap_caption("", 10), "");
    }

    #[test]
    fn test_escape_filter_path() {
        let escaped = escape_filter_path(Path::new("C:\\tmp\\cap,1.txt"));
        assert_eq!(escaped, "C\\:/tmp/cap\\,1.txt");
    }

    #[test]
    fn test_render_cues_drops_bad_glyphs() {
        let dir = tempfile::tempdir().unwrap();
        let cues = vec![
            CaptionCue { text: "Halo dunia.".into(), start_seconds: 0.0, duration_seconds: 3.0 },
            CaptionCue { text: "Rahasia \u{E000} ini.".into(), start_seconds: 3.0, duration_seconds: 3.0 },
            CaptionCue { text: "Semangat 🚀".into(), start_seconds: 6.0, duration_seconds: 3.0 },
        ];
        let batch = render_cues(&cues, dir.path(), &CaptionStyle::default());
        assert_eq!(batch.layers.len(), 1);
        assert_eq!(batch.dropped.len(), 2);
        assert!(matches!(batch.dropped[0].1, CaptionRenderError::Unrenderable('\u{E000}')));

        let layer = &batch.layers[0];
        assert!(layer.text_file.exists());
        assert!(layer.filter.starts_with("drawtext=textfile='"));
        assert!(layer.filter.contains("enable='gte(t,0.000)*lt(t,3.000)'"));
        assert!(layer.filter.contains("boxcolor=black@0.40"));
    }

    #[test]
    fn test_all_cues_failing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cues = vec![CaptionCue { text: "   ".into(), start_seconds: 0.0, duration_seconds: 2.0 }];
        let batch = render_cues(&cues, dir.path(), &CaptionStyle::default());
        assert!(batch.layers.is_empty());
        assert_eq!(batch.dropped[0].1, CaptionRenderError::EmptyText);
    }
}
