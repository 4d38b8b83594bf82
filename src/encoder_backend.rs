// SYNOID Encoder Backend
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Picks the H.264 encoder for the final render. NVENC is used when hardware
// encoding is enabled and nvidia-smi reports a GPU; libx264 otherwise.

use std::process::Command;
use std::sync::OnceLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderBackend {
    Nvenc { gpu: String, driver_version: String },
    Software { threads: usize },
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nvenc { gpu, driver_version } => {
                write!(f, "NVENC: {} (Driver {})", gpu, driver_version)
            }
            Self::Software { threads } => write!(f, "libx264 ({} threads)", threads),
        }
    }
}

impl EncoderBackend {
    pub fn software() -> Self {
        Self::Software {
            threads: num_cpus::get(),
        }
    }

    /// Probe for NVENC when `hardware` is set.
    pub fn detect(hardware: bool) -> Self {
        if hardware {
            if let Some(nvenc) = Self::try_nvenc() {
                return nvenc;
            }
            warn!("[ENCODER] Hardware encoding requested but no NVIDIA GPU found, using libx264");
        }
        Self::software()
    }

    fn try_nvenc() -> Option<Self> {
        let output = Command::new("nvidia-smi")
            .args(["--query-gpu=name,driver_version", "--format=csv,noheader"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let (gpu, driver_version) = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))?;
        info!("[ENCODER] NVIDIA GPU detected: {} (Driver {})", gpu, driver_version);
        Some(Self::Nvenc { gpu, driver_version })
    }

    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            Self::Nvenc { .. } => "h264_nvenc",
            Self::Software { .. } => "libx264",
        }
    }

    /// Encoder quality arguments for ffmpeg.
    pub fn quality_args(&self) -> Vec<&'static str> {
        match self {
            Self::Nvenc { .. } => vec!["-preset", "p4", "-cq", "23"],
            Self::Software { .. } => vec!["-preset", "veryfast", "-crf", "23"],
        }
    }
}

fn parse_nvidia_smi(stdout: &str) -> Option<(String, String)> {
    let line = stdout.lines().next()?;
    let mut parts = line.split(',').map(str::trim);
    let gpu = parts.next().filter(|s| !s.is_empty())?;
    let driver = parts.next().filter(|s| !s.is_empty())?;
    Some((gpu.to_string(), driver.to_string()))
}

static ENCODER: OnceLock<EncoderBackend> = OnceLock::new();

/// Detect once per process.
pub fn encoder_backend(hardware: bool) -> &'static EncoderBackend {
    ENCODER.get_or_init(|| EncoderBackend::detect(hardware))
}
