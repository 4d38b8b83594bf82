// SYNOID Health Check
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Reports whether the external tools the pipeline shells out to are present.

use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{info, warn};

/// Health status of one external tool
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    Available { version: String },
    Missing { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub name: &'static str,
    pub binary: String,
    #[serde(flatten)]
    pub status: ToolStatus,
    /// Whether renders can run without it
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub tools: Vec<ToolReport>,
    pub uptime_secs: u64,
}

impl DependencyReport {
    /// All required tools are available.
    pub fn is_healthy(&self) -> bool {
        self.tools
            .iter()
            .all(|t| t.optional || matches!(t.status, ToolStatus::Available { .. }))
    }

    pub fn missing(&self) -> Vec<&ToolReport> {
        self.tools
            .iter()
            .filter(|t| matches!(t.status, ToolStatus::Missing { .. }))
            .collect()
    }
}

async fn probe_tool(binary: &str, version_flag: &str) -> ToolStatus {
    let run = Command::new(binary)
        .kill_on_drop(true)
        .arg(version_flag)
        .output();
    match tokio::time::timeout(Duration::from_secs(5), run).await {
        Ok(Ok(out)) if out.status.success() => ToolStatus::Available {
            version: String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        },
        Ok(Ok(out)) => ToolStatus::Missing {
            reason: format!("exited with {}", out.status),
        },
        Ok(Err(e)) => ToolStatus::Missing {
            reason: e.to_string(),
        },
        Err(_) => ToolStatus::Missing {
            reason: "timed out".to_string(),
        },
    }
}

/// Check ffmpeg, ffprobe and yt-dlp. yt-dlp only backs link analysis.
pub async fn check_dependencies(
    ffmpeg_bin: &str,
    ffprobe_bin: &str,
    ytdlp_bin: &str,
    started: Instant,
) -> DependencyReport {
    let (ffmpeg, ffprobe, ytdlp) = tokio::join!(
        probe_tool(ffmpeg_bin, "-version"),
        probe_tool(ffprobe_bin, "-version"),
        probe_tool(ytdlp_bin, "--version"),
    );

    let report = DependencyReport {
        tools: vec![
            ToolReport { name: "ffmpeg", binary: ffmpeg_bin.to_string(), status: ffmpeg, optional: false },
            ToolReport { name: "ffprobe", binary: ffprobe_bin.to_string(), status: ffprobe, optional: false },
            ToolReport { name: "yt-dlp", binary: ytdlp_bin.to_string(), status: ytdlp, optional: true },
        ],
        uptime_secs: started.elapsed().as_secs(),
    };

    for tool in report.missing() {
        if let ToolStatus::Missing { reason } = &tool.status {
            warn!("[HEALTH] {} ({}) unavailable: {}", tool.name, tool.binary, reason);
        }
    }
    if report.is_healthy() {
        info!("[HEALTH] All required tools available");
    }
    report
}
