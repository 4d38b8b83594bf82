// SYNOID Server State
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use crate::agent::pipeline::PipelineContext;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

pub struct ShortsState {
    pub pipeline: PipelineContext,
    active_renders: AtomicUsize,
    completed_renders: AtomicU64,
    failed_renders: AtomicU64,
}

impl ShortsState {
    pub fn new(pipeline: PipelineContext) -> Self {
        Self {
            pipeline,
            active_renders: AtomicUsize::new(0),
            completed_renders: AtomicU64::new(0),
            failed_renders: AtomicU64::new(0),
        }
    }

    /// Count a render for as long as the returned slot lives.
    pub fn begin_render(&self) -> RenderSlot<'_> {
        self.active_renders.fetch_add(1, Ordering::Relaxed);
        RenderSlot {
            state: self,
            succeeded: false,
        }
    }

    pub fn render_stats(&self) -> RenderStats {
        RenderStats {
            active: self.active_renders.load(Ordering::Relaxed),
            completed: self.completed_renders.load(Ordering::Relaxed),
            failed: self.failed_renders.load(Ordering::Relaxed),
        }
    }
}

pub struct RenderSlot<'a> {
    state: &'a ShortsState,
    succeeded: bool,
}

impl RenderSlot<'_> {
    pub fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for RenderSlot<'_> {
    fn drop(&mut self) {
        self.state.active_renders.fetch_sub(1, Ordering::Relaxed);
        let counter = if self.succeeded {
            &self.state.completed_renders
        } else {
            &self.state.failed_renders
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RenderStats {
    pub active: usize,
    pub completed: u64,
    pub failed: u64,
}
