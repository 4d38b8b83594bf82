// SYNOID Voice Audio Probe
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Reads the duration of a synthesized voiceover with symphonia. A file that
// symphonia cannot demux is treated as corrupt audio.

use std::fs::File;
use std::path::Path;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::debug;

/// Duration of an audio file in seconds.
pub fn probe_audio_duration(path: &Path) -> Result<f64, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {:?}: {}", path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| format!("unrecognised audio: {}", e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| "no audio track".to_string())?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Ok(frames as f64 / rate as f64);
        }
    }

    // No frame count in the header (typical for raw MP3): walk the packets.
    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|r| TimeBase::new(1, r)))
        .ok_or_else(|| "audio track has no time base".to_string())?;

    let mut end_ts: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    end_ts = end_ts.max(packet.ts() + packet.dur());
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("audio stream is corrupt: {}", e)),
        }
    }

    let time = time_base.calc_time(end_ts);
    let seconds = time.seconds as f64 + time.frac;
    debug!("[VOICE] Probed {:?}: {:.2}s", path, seconds);
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, seconds: f64, rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (seconds * rate as f64) as usize;
        for i in 0..total {
            let t = i as f64 / rate as f64;
            let sample = (t * 440.0 * 2.0 * std::f64::consts::PI).sin() * 8000.0;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        write_wav(&path, 2.5, 16000);
        let duration = probe_audio_duration(&path).unwrap();
        assert!((duration - 2.5).abs() < 0.01, "got {}", duration);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.mp3");
        std::fs::write(&path, b"<html>quota exceeded</html>").unwrap();
        assert!(probe_audio_duration(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(probe_audio_duration(Path::new("__missing_voice.wav")).is_err());
    }
}
