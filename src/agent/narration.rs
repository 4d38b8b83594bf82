// SYNOID Narration Normalizer
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Turns raw (often AI-written, markup-heavy) scripts into plain speakable
// narration. The same cleaned text feeds both the voiceover and the captions.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Returned when nothing speakable survives cleaning.
pub const NO_NARRATION_SENTINEL: &str = "Narasi tidak terdeteksi.";

/// Fewer tokens than this and the script is treated as empty.
const MIN_WORDS: usize = 3;

static LINE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(?:VOICEOVER|Visual|Scene|Shot|Narasi|Audio|Text|Teks|Dialog|SFX)\s*[:：-]\s*")
        .expect("line label pattern")
});

static PREAMBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:Tentu|Baiklah|Oke|Okay|Siap|Mari|Berikut|Nah|Jadi|Sekarang|Sure|Alright|Here's|Here is)\b[^.!?]*?(?:naskahnya|naskah|script|voiceover|di-record|recording)[^.!?]*[.!?]",
    )
    .expect("preamble pattern")
});

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*#_`>]+").expect("markup pattern"));

static ASIDES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[.*?\]|\(.*?\)").expect("aside pattern"));

static VOICE_DIRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bvoice\b\s*['"].*?['"]"#).expect("voice direction pattern")
});

static VOICEOVER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bVOICEOVER\b").expect("voiceover token pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Narration that has been through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNarration {
    text: String,
}

impl NormalizedNarration {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_sentinel(&self) -> bool {
        self.text == NO_NARRATION_SENTINEL
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl std::fmt::Display for NormalizedNarration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// One cleaning pass. The order of the steps matters: labels are matched
/// against line starts before whitespace is collapsed.
fn clean_pass(text: &str) -> String {
    let text = LINE_LABEL.replace_all(text, "");
    let text = PREAMBLE.replace_all(&text, "");
    let text = MARKUP.replace_all(&text, "");
    let text = ASIDES.replace_all(&text, "");
    let text = VOICE_DIRECTION.replace_all(&text, "");
    let text = VOICEOVER_TOKEN.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Clean a raw script into narration.
///
/// Total and deterministic. Passes repeat until the text is stable, so
/// `normalize(normalize(x).text()) == normalize(x)`; a pass after the first
/// can only delete characters, which bounds the loop.
pub fn normalize(raw: &str) -> NormalizedNarration {
    let mut text = clean_pass(raw);
    loop {
        let next = clean_pass(&text);
        if next == text {
            break;
        }
        text = next;
    }

    if text.split_whitespace().count() < MIN_WORDS {
        debug!("[NARRATION] Nothing speakable left after cleaning, using sentinel");
        text = NO_NARRATION_SENTINEL.to_string();
    }

    NormalizedNarration { text }
}

/// Search keywords taken from the head of a script when no query is given.
pub fn keywords_from_script(raw: &str, max_words: usize) -> String {
    let stripped: String = raw.chars().filter(|c| !matches!(c, '*' | '#' | '_')).collect();
    stripped
        .split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
