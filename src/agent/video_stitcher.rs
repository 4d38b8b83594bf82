// SYNOID Video Stitcher - Timeline Filter Graph
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Joins timeline segments inside a single ffmpeg filter graph. Each segment
// is cut from its clip head, scaled to the canvas width, padded onto the
// shared canvas and resampled to one frame rate before `concat`, so clips
// of any size or rate can be joined without an intermediate encode.

use crate::agent::clip_assembler::AssembledTimeline;
use std::path::PathBuf;

/// Label of the joined picture track inside the graph.
pub const TIMELINE_LABEL: &str = "vtl";

/// Filter graph plus the inputs it expects, in order.
#[derive(Debug, Clone)]
pub struct TimelineGraph {
    pub inputs: Vec<PathBuf>,
    pub filter: String,
    pub output_label: &'static str,
}

pub struct VideoStitcher;

impl VideoStitcher {
    /// Graph for `timeline`. Input `i` of the graph is `inputs[i]`.
    pub fn timeline_graph(timeline: &AssembledTimeline, fps: u32) -> TimelineGraph {
        let canvas = timeline.canvas;
        let mut chains = Vec::with_capacity(timeline.segments.len() + 2);
        let mut inputs = Vec::with_capacity(timeline.segments.len());

        for (i, segment) in timeline.segments.iter().enumerate() {
            inputs.push(segment.source.path.clone());
            chains.push(format!(
                "[{i}:v]trim=start={start:.3}:end={end:.3},setpts=PTS-STARTPTS,scale={w}:-2,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps},format=yuv420p[s{i}]",
                i = i,
                start = segment.start_offset,
                end = segment.end_offset,
                w = canvas.width,
                h = canvas.height,
                fps = fps,
            ));
        }

        let labels: String = (0..timeline.segments.len())
            .map(|i| format!("[s{}]", i))
            .collect();
        chains.push(format!(
            "{}concat=n={}:v=1:a=0[vcat]",
            labels,
            timeline.segments.len()
        ));

        if timeline.hold_seconds > 0.0 {
            chains.push(format!(
                "[vcat]tpad=stop_mode=clone:stop_duration={:.3}[{}]",
                timeline.hold_seconds, TIMELINE_LABEL
            ));
        } else {
            chains.push(format!(
                "[vcat]trim=duration={:.3},setpts=PTS-STARTPTS[{}]",
                timeline.total_duration, TIMELINE_LABEL
            ));
        }

        TimelineGraph {
            inputs,
            filter: chains.join(";"),
            output_label: TIMELINE_LABEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::clip_assembler::{Canvas, DecodedClip, TimelineSegment};

    fn timeline(ends: &[f64], hold: f64) -> AssembledTimeline {
        let segments: Vec<TimelineSegment> = ends
            .iter()
            .enumerate()
            .map(|(i, end)| TimelineSegment {
                source: DecodedClip {
                    uri: format!("clip{}", i),
                    path: PathBuf::from(format!("/tmp/clip{}.mp4", i)),
                    duration_seconds: 10.0,
                    width_px: 1920,
                    height_px: 1080,
                },
                start_offset: 0.0,
                end_offset: *end,
            })
            .collect();
        let total: f64 = ends.iter().sum::<f64>() + hold;
        AssembledTimeline {
            segments,
            accumulated_duration: total - hold,
            total_duration: total,
            target_duration: total,
            hold_seconds: hold,
            canvas: Canvas { width: 720, height: 406 },
            skipped: vec![],
        }
    }

    #[test]
    fn test_graph_joins_every_segment() {
        let graph = VideoStitcher::timeline_graph(&timeline(&[5.0, 5.0, 2.0], 0.0), 24);
        assert_eq!(graph.inputs.len(), 3);
        assert!(graph.filter.contains("[0:v]trim=start=0.000:end=5.000"));
        assert!(graph.filter.contains("[2:v]trim=start=0.000:end=2.000"));
        assert!(graph.filter.contains("scale=720:-2,pad=720:406"));
        assert!(graph.filter.contains("fps=24"));
        assert!(graph.filter.contains("[s0][s1][s2]concat=n=3:v=1:a=0[vcat]"));
        assert!(graph.filter.ends_with("[vcat]trim=duration=12.000,setpts=PTS-STARTPTS[vtl]"));
        assert_eq!(graph.output_label, "vtl");
    }

    #[test]
    fn test_graph_holds_last_frame() {
        let graph = VideoStitcher::timeline_graph(&timeline(&[5.0], 3.5), 30);
        assert!(graph.filter.ends_with("[vcat]tpad=stop_mode=clone:stop_duration=3.500[vtl]"));
        assert!(graph.filter.contains("fps=30"));
    }
}
