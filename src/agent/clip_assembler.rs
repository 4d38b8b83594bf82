// SYNOID Clip Assembler
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Fits acquired footage to the voiceover. Clips are taken in acquisition
// order, each contributes a window from its head, and accumulation stops
// as soon as the target duration is covered.

use crate::agent::source_tools::FootageClip;
use crate::config::ShortfallPolicy;
use crate::error::{Result, ShortsError};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

/// Stream facts read from a footage file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub uri: String,
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub width_px: u32,
    pub height_px: u32,
}

#[async_trait]
pub trait ClipDecoder: Send + Sync {
    async fn decode(&self, clip: &FootageClip) -> Result<DecodedClip>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSegment {
    pub source: DecodedClip,
    pub start_offset: f64,
    pub end_offset: f64,
}

impl TimelineSegment {
    pub fn duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }
}

/// Frame every segment is scaled and padded onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct SkippedClip {
    pub uri: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub window_secs: f64,
    pub target_width: u32,
    pub shortfall_policy: ShortfallPolicy,
    /// Trimmed tail segments shorter than this are dropped (one output frame)
    pub min_segment_secs: f64,
}

#[derive(Debug, Clone)]
pub struct AssembledTimeline {
    pub segments: Vec<TimelineSegment>,
    /// Footage collected before trimming
    pub accumulated_duration: f64,
    /// Length of the picture track after trimming or holding
    pub total_duration: f64,
    pub target_duration: f64,
    /// Seconds the last frame is frozen for (hold-last-frame only)
    pub hold_seconds: f64,
    pub canvas: Canvas,
    pub skipped: Vec<SkippedClip>,
}

impl AssembledTimeline {
    pub fn segment_time(&self) -> f64 {
        self.segments.iter().map(TimelineSegment::duration).sum()
    }
}

/// Height of a clip once scaled to `target_width`, rounded up to even.
pub fn scaled_height(width_px: u32, height_px: u32, target_width: u32) -> u32 {
    if width_px == 0 {
        return 0;
    }
    let h = (height_px as f64 * target_width as f64 / width_px as f64).ceil() as u32;
    h + (h % 2)
}

/// Build a timeline covering `target_duration` seconds from `clips`.
pub async fn assemble(
    clips: &[FootageClip],
    target_duration: f64,
    decoder: &dyn ClipDecoder,
    opts: &AssemblyOptions,
) -> Result<AssembledTimeline> {
    if !target_duration.is_finite() || target_duration <= 0.0 {
        return Err(ShortsError::InputValidation(format!(
            "target duration must be positive, got {}",
            target_duration
        )));
    }

    let mut segments: Vec<TimelineSegment> = Vec::new();
    let mut skipped = Vec::new();
    let mut accumulated = 0.0;

    for clip in clips {
        if accumulated >= target_duration {
            break;
        }

        let decoded = match decoder.decode(clip).await {
            Ok(d) => d,
            Err(e) => {
                warn!("[ASSEMBLER] Skipping {}: {}", clip.uri, e);
                skipped.push(SkippedClip {
                    uri: clip.uri.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !decoded.duration_seconds.is_finite() || decoded.duration_seconds <= 0.0 {
            warn!("[ASSEMBLER] Skipping {}: no playable duration", clip.uri);
            skipped.push(SkippedClip {
                uri: clip.uri.clone(),
                reason: format!("duration {}", decoded.duration_seconds),
            });
            continue;
        }

        let end = opts.window_secs.min(decoded.duration_seconds);
        accumulated += end;
        segments.push(TimelineSegment {
            source: decoded,
            start_offset: 0.0,
            end_offset: end,
        });
    }

    if segments.is_empty() {
        return Err(ShortsError::NoValidFootage {
            rejected: skipped.len(),
        });
    }

    let canvas = Canvas {
        width: opts.target_width,
        height: segments
            .iter()
            .map(|s| scaled_height(s.source.width_px, s.source.height_px, opts.target_width))
            .max()
            .unwrap_or(0)
            .max(2),
    };

    let (total_duration, hold_seconds) = if accumulated > target_duration {
        // Only the last segment can overshoot, and by less than its own length.
        let excess = accumulated - target_duration;
        if let Some(last) = segments.last_mut() {
            last.end_offset -= excess;
        }
        let sliver = segments
            .last()
            .map_or(false, |last| last.duration() < opts.min_segment_secs);
        if sliver && segments.len() > 1 {
            if let Some(dropped) = segments.pop() {
                info!(
                    "[ASSEMBLER] Dropping {:.4}s tail of {}, shorter than one frame",
                    dropped.duration(),
                    dropped.source.uri
                );
            }
        }
        (target_duration, 0.0)
    } else if accumulated < target_duration {
        match opts.shortfall_policy {
            ShortfallPolicy::Accept => (accumulated, 0.0),
            ShortfallPolicy::HoldLastFrame => (target_duration, target_duration - accumulated),
        }
    } else {
        (target_duration, 0.0)
    };

    info!(
        "[ASSEMBLER] {} segment(s), {:.2}s collected, {:.2}s timeline for {:.2}s voiceover ({} skipped)",
        segments.len(),
        accumulated,
        total_duration,
        target_duration,
        skipped.len()
    );

    Ok(AssembledTimeline {
        segments,
        accumulated_duration: accumulated,
        total_duration,
        target_duration,
        hold_seconds,
        canvas,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeDecoder {
        clips: HashMap<String, std::result::Result<(f64, u32, u32), String>>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeDecoder {
        fn new(entries: &[(&str, std::result::Result<(f64, u32, u32), &str>)]) -> Self {
            Self {
                clips: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map_err(str::to_string)))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClipDecoder for FakeDecoder {
        async fn decode(&self, clip: &FootageClip) -> Result<DecodedClip> {
            self.seen.lock().unwrap().push(clip.uri.clone());
            match self.clips.get(&clip.uri) {
                Some(Ok((duration, w, h))) => Ok(DecodedClip {
                    uri: clip.uri.clone(),
                    path: clip.local_path.clone(),
                    duration_seconds: *duration,
                    width_px: *w,
                    height_px: *h,
                }),
                Some(Err(reason)) => Err(ShortsError::AssetDecode {
                    uri: clip.uri.clone(),
                    reason: reason.clone(),
                }),
                None => Err(ShortsError::AssetDecode {
                    uri: clip.uri.clone(),
                    reason: "unknown".into(),
                }),
            }
        }
    }

    fn clips(uris: &[&str]) -> Vec<FootageClip> {
        uris.iter()
            .map(|u| FootageClip {
                uri: u.to_string(),
                local_path: PathBuf::from(format!("/tmp/{}.mp4", u)),
                width_px: Some(1280),
            })
            .collect()
    }

    fn opts(policy: ShortfallPolicy) -> AssemblyOptions {
        AssemblyOptions {
            window_secs: 5.0,
            target_width: 720,
            shortfall_policy: policy,
            min_segment_secs: 1.0 / 24.0,
        }
    }

    #[tokio::test]
    async fn test_trims_to_exact_target() {
        let decoder = FakeDecoder::new(&[
            ("a", Ok((5.0, 1280, 720))),
            ("b", Ok((10.0, 1280, 720))),
            ("c", Ok((15.0, 1280, 720))),
        ]);
        let tl = assemble(&clips(&["a", "b", "c"]), 12.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap();

        assert_eq!(tl.segments.len(), 3);
        assert!((tl.accumulated_duration - 15.0).abs() < 1e-9);
        assert!((tl.total_duration - 12.0).abs() < 1e-9);
        assert!((tl.segment_time() - 12.0).abs() < 1e-9);
        assert!((tl.segments[2].end_offset - 2.0).abs() < 1e-9);
        assert_eq!(tl.hold_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_sub_frame_tail_is_dropped() {
        let decoder = FakeDecoder::new(&[("a", Ok((4.9996, 1280, 720))), ("b", Ok((10.0, 1280, 720)))]);
        let tl = assemble(&clips(&["a", "b"]), 5.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap();

        assert_eq!(tl.segments.len(), 1);
        assert_eq!(tl.segments[0].source.uri, "a");
        assert!((tl.total_duration - 5.0).abs() < 1e-9);
        assert!(tl.segments.iter().all(|s| s.duration() >= 1.0 / 24.0));
    }

    #[tokio::test]
    async fn test_stops_once_target_reached() {
        let decoder = FakeDecoder::new(&[
            ("a", Ok((5.0, 1280, 720))),
            ("b", Ok((10.0, 1280, 720))),
            ("c", Ok((15.0, 1280, 720))),
        ]);
        let tl = assemble(&clips(&["a", "b", "c"]), 8.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap();
        assert_eq!(tl.segments.len(), 2);
        assert_eq!(*decoder.seen.lock().unwrap(), vec!["a", "b"]);
        assert!((tl.total_duration - 8.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_window_caps_short_and_long_clips() {
        let decoder = FakeDecoder::new(&[("a", Ok((2.5, 1280, 720))), ("b", Ok((30.0, 1920, 1080)))]);
        let tl = assemble(&clips(&["a", "b"]), 60.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap();
        assert_eq!(tl.segments[0].end_offset, 2.5);
        assert_eq!(tl.segments[1].end_offset, 5.0);
        assert!(tl.segments.iter().all(|s| s.end_offset <= s.source.duration_seconds));
    }

    #[tokio::test]
    async fn test_shortfall_accept() {
        let decoder = FakeDecoder::new(&[("a", Ok((5.0, 1280, 720))), ("b", Ok((3.0, 1280, 720)))]);
        let tl = assemble(&clips(&["a", "b"]), 20.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap();
        assert!((tl.total_duration - 8.0).abs() < 1e-9);
        assert_eq!(tl.hold_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_shortfall_hold_last_frame() {
        let decoder = FakeDecoder::new(&[("a", Ok((5.0, 1280, 720))), ("b", Ok((3.0, 1280, 720)))]);
        let tl = assemble(
            &clips(&["a", "b"]),
            20.0,
            &decoder,
            &opts(ShortfallPolicy::HoldLastFrame),
        )
        .await
        .unwrap();
        assert!((tl.total_duration - 20.0).abs() < 1e-9);
        assert!((tl.hold_seconds - 12.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_decode_failures_are_skipped() {
        let decoder = FakeDecoder::new(&[
            ("bad", Err("moov atom not found")),
            ("zero", Ok((0.0, 1280, 720))),
            ("good", Ok((6.0, 1280, 720))),
        ]);
        let tl = assemble(
            &clips(&["bad", "zero", "good"]),
            4.0,
            &decoder,
            &opts(ShortfallPolicy::Accept),
        )
        .await
        .unwrap();
        assert_eq!(tl.segments.len(), 1);
        assert_eq!(tl.segments[0].source.uri, "good");
        assert_eq!(tl.skipped.len(), 2);
        assert!(tl.skipped[0].reason.contains("moov atom"));
    }

    #[tokio::test]
    async fn test_all_failures_is_no_valid_footage() {
        let decoder = FakeDecoder::new(&[("a", Err("corrupt")), ("b", Err("corrupt"))]);
        let err = assemble(&clips(&["a", "b"]), 10.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap_err();
        assert!(matches!(err, ShortsError::NoValidFootage { rejected: 2 }));

        let err = assemble(&[], 10.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap_err();
        assert!(matches!(err, ShortsError::NoValidFootage { rejected: 0 }));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_target() {
        let decoder = FakeDecoder::new(&[("a", Ok((5.0, 1280, 720)))]);
        assert!(assemble(&clips(&["a"]), 0.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_canvas_fits_tallest_segment() {
        let decoder = FakeDecoder::new(&[("wide", Ok((5.0, 1920, 1080))), ("tall", Ok((5.0, 1080, 1920)))]);
        let tl = assemble(&clips(&["wide", "tall"]), 10.0, &decoder, &opts(ShortfallPolicy::Accept))
            .await
            .unwrap();
        assert_eq!(tl.canvas, Canvas { width: 720, height: 1280 });
    }

    #[test]
    fn test_scaled_height() {
        assert_eq!(scaled_height(1920, 1080, 720), 406);
        assert_eq!(scaled_height(1280, 720, 720), 406);
        assert_eq!(scaled_height(1080, 1920, 720), 1280);
        assert_eq!(scaled_height(0, 1080, 720), 0);
    }
}
