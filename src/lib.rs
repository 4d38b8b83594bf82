// SYNOID Shorts Library
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Narration-driven short video assembly: voiceover, stock footage, captions.

pub mod agent;
pub mod config;
pub mod encoder_backend;
pub mod error;
pub mod server;
pub mod state;

pub use config::ShortsConfig;
pub use error::{ErrorKind, Result, ShortsError};
