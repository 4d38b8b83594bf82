// SYNOID Shorts Error Types
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Every stage of the shorts pipeline reports through `ShortsError`.
// Per-asset failures never reach this type; they are absorbed where they happen.

use thiserror::Error;

/// Caller-visible error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    ExternalService,
    AssetDecode,
    NoValidFootage,
    Render,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::ExternalService => "external_service",
            Self::AssetDecode => "asset_decode",
            Self::NoValidFootage => "no_valid_footage",
            Self::Render => "render",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ShortsError {
    #[error("{0}")]
    InputValidation(String),

    #[error("{service} failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("no footage found for query '{0}'")]
    NoFootageFound(String),

    #[error("cannot decode footage {uri}: {reason}")]
    AssetDecode { uri: String, reason: String },

    #[error("no valid footage to assemble ({rejected} candidate(s) rejected)")]
    NoValidFootage { rejected: usize },

    #[error("render failed: {0}")]
    Render(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("text generator is not configured")]
    GeneratorUnavailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShortsError {
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputValidation(_) => ErrorKind::InputValidation,
            Self::ExternalService { .. } | Self::NoFootageFound(_) | Self::GeneratorUnavailable => {
                ErrorKind::ExternalService
            }
            Self::AssetDecode { .. } => ErrorKind::AssetDecode,
            Self::NoValidFootage { .. } => ErrorKind::NoValidFootage,
            Self::Timeout { stage, .. } if *stage == "render" => ErrorKind::Render,
            Self::Timeout { .. } => ErrorKind::ExternalService,
            Self::Render(_) | Self::Io(_) => ErrorKind::Render,
        }
    }
}

impl From<reqwest::Error> for ShortsError {
    fn from(e: reqwest::Error) -> Self {
        let service = e
            .url()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        Self::ExternalService {
            service,
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShortsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            ShortsError::InputValidation("empty".into()).kind(),
            ErrorKind::InputValidation
        );
        assert_eq!(
            ShortsError::NoFootageFound("cats".into()).kind(),
            ErrorKind::ExternalService
        );
        assert_eq!(
            ShortsError::NoValidFootage { rejected: 3 }.kind().as_str(),
            "no_valid_footage"
        );
        assert_eq!(
            ShortsError::Timeout { stage: "render", secs: 5 }.kind(),
            ErrorKind::Render
        );
        assert_eq!(
            ShortsError::Timeout { stage: "voice synthesis", secs: 5 }.kind(),
            ErrorKind::ExternalService
        );
    }

    #[test]
    fn test_no_footage_message() {
        let err = ShortsError::NoFootageFound("ocean waves".into());
        assert!(err.to_string().contains("no footage found"));
    }
}
