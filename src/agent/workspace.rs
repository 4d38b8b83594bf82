// SYNOID Render Workspace
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Request-scoped scratch directory. Voiceover audio, downloaded footage and
// caption text files all live here and disappear when the workspace drops.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tracing::debug;

pub struct RenderWorkspace {
    dir: TempDir,
    counter: AtomicUsize,
}

impl RenderWorkspace {
    /// Create a workspace under `root`, or the system temp dir when `None`.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("synoid_short_");
            b
        };
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("[WORKSPACE] Created {:?}", dir.path());
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh path inside the workspace: `{stem}_{n}.{ext}`.
    pub fn unique_file(&self, stem: &str, ext: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("{}_{:03}.{}", stem, n, ext))
    }

    /// Subdirectory for caption text files.
    pub fn captions_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.dir.path().join("captions");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_on_drop() {
        let ws = RenderWorkspace::create(None).unwrap();
        let root = ws.path().to_path_buf();
        let file = ws.unique_file("clip", "mp4");
        std::fs::write(&file, b"data").unwrap();
        std::fs::write(ws.captions_dir().unwrap().join("c.txt"), b"x").unwrap();
        assert!(file.exists());
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn test_unique_names() {
        let parent = tempfile::tempdir().unwrap();
        let ws = RenderWorkspace::create(Some(parent.path().join("nested").as_path())).unwrap();
        let a = ws.unique_file("clip", "mp4");
        let b = ws.unique_file("clip", "mp4");
        assert_ne!(a, b);
        assert!(ws.path().starts_with(parent.path()));
    }
}
