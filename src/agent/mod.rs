// SYNOID Agent Modules
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod captions;
pub mod clip_assembler;
pub mod download_guard;
pub mod health;
pub mod narration;
pub mod pipeline;
pub mod production_tools;
pub mod source_tools;
pub mod transcript;
pub mod video_stitcher;
pub mod voice;
pub mod workspace;
pub mod writer;
