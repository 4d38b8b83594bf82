// SYNOID Download Guard
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Screens footage URLs before they are fetched and downloaded files before
// they reach ffprobe. A rejected asset is skipped, never fatal on its own.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Container extensions accepted for footage on disk.
const FOOTAGE_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "webm", "avi"];

/// URL fragments that never point at stock footage.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    ".exe", ".bat", ".cmd", ".ps1", ".msi", ".scr", ".vbs", ".hta", ".dll", ".sh",
    "malware", "keygen", "warez",
];

/// Anything smaller is an error page or a stub, not a clip.
const MIN_FOOTAGE_BYTES: u64 = 10 * 1024;

/// 2 GB. Stock clips for a short are far below this.
const MAX_FOOTAGE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

pub struct DownloadGuard;

impl DownloadGuard {
    /// Screen a footage URL before fetching it.
    pub fn validate_url(url: &str) -> Result<(), String> {
        let parsed = url::Url::parse(url).map_err(|e| format!("invalid URL '{}': {}", url, e))?;

        let local = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
        match parsed.scheme() {
            "https" => {}
            "http" if local => {}
            other => {
                warn!("[GUARD] Blocked '{}' URL: {}", other, url);
                return Err(format!("only HTTPS footage URLs are allowed, got '{}'", other));
            }
        }

        let path = parsed.path().to_lowercase();
        for pattern in BLOCKED_URL_PATTERNS {
            if path.contains(pattern) {
                warn!("[GUARD] Blocked URL pattern '{}': {}", pattern, url);
                return Err(format!("URL contains blocked pattern '{}'", pattern));
            }
        }

        Ok(())
    }

    /// Check a downloaded file before handing it to the decoder.
    pub fn validate_downloaded_file(path: &Path) -> Result<(), String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !FOOTAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(format!("'{}' is not a footage extension", ext));
        }

        let size = std::fs::metadata(path)
            .map_err(|e| format!("cannot stat {:?}: {}", path, e))?
            .len();
        if size < MIN_FOOTAGE_BYTES {
            return Err(format!("file too small ({} bytes)", size));
        }
        if size > MAX_FOOTAGE_BYTES {
            return Err(format!("file too large ({} bytes)", size));
        }

        Self::check_header(path)?;
        debug!("[GUARD] {:?} passed ({} bytes)", path.file_name().unwrap_or_default(), size);
        Ok(())
    }

    /// Reject executables and HTML error pages saved under a video name.
    fn check_header(path: &Path) -> Result<(), String> {
        let mut file = File::open(path).map_err(|e| format!("cannot open {:?}: {}", path, e))?;
        let mut header = [0u8; 16];
        let n = file
            .read(&mut header)
            .map_err(|e| format!("cannot read header: {}", e))?;
        let header = &header[..n];

        if header.starts_with(b"MZ") {
            return Err("Windows executable (MZ header)".to_string());
        }
        if header.starts_with(b"\x7FELF") {
            return Err("Linux executable (ELF header)".to_string());
        }
        if header.starts_with(b"#!") {
            return Err("script (shebang header)".to_string());
        }
        let text = String::from_utf8_lossy(header).trim_start().to_lowercase();
        if text.starts_with("<!doctype") || text.starts_with("<html") || text.starts_with('{') {
            return Err("text response instead of video".to_string());
        }
        Ok(())
    }

    /// Make a provider-supplied name safe to use as a file name.
    pub fn sanitize_filename(name: &str) -> String {
        let cleaned: String = name
            .replace("..", "")
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        cleaned.trim().to_string()
    }
}
