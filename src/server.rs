// SYNOID Shorts API Server
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

use crate::agent::health::{check_dependencies, DependencyReport};
use crate::agent::narration::normalize;
use crate::agent::pipeline::{RenderMode, ShortRequest, VoiceoverRequest};
use crate::error::{ErrorKind, ShortsError};
use crate::state::{RenderStats, ShortsState};

pub type AppState = Arc<ShortsState>;

/// `ShortsError` rendered as `{ "error": ..., "kind": ... }`.
pub struct ApiError(pub ShortsError);

impl From<ShortsError> for ApiError {
    fn from(e: ShortsError) -> Self {
        Self(e)
    }
}

pub fn status_for(err: &ShortsError) -> StatusCode {
    match err {
        ShortsError::NoFootageFound(_) => StatusCode::NOT_FOUND,
        ShortsError::GeneratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ShortsError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        other => match other.kind() {
            ErrorKind::InputValidation => StatusCode::BAD_REQUEST,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::AssetDecode | ErrorKind::NoValidFootage => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Render => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("[SERVER] {} ({})", self.0, self.0.kind());
        } else {
            warn!("[SERVER] {} ({})", self.0, self.0.kind());
        }
        (
            status,
            Json(json!({ "error": self.0.to_string(), "kind": self.0.kind().as_str() })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn required(value: &str, field: &str) -> Result<(), ShortsError> {
    if value.trim().is_empty() {
        Err(ShortsError::InputValidation(format!("'{}' must not be empty", field)))
    } else {
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct ShortPayload {
    #[serde(default)]
    pub text: String,
    pub query: Option<String>,
    pub voice_id: Option<String>,
    pub lang: Option<String>,
}

#[derive(Deserialize)]
pub struct VoiceoverPayload {
    #[serde(default)]
    pub text: String,
    pub voice_id: Option<String>,
    pub lang: Option<String>,
    #[serde(default)]
    pub polish: bool,
}

#[derive(Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub text: String,
    pub style: Option<String>,
}

#[derive(Deserialize)]
pub struct TopicPayload {
    #[serde(default)]
    pub topic: String,
    pub lang: Option<String>,
}

#[derive(Deserialize)]
pub struct LinkPayload {
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize)]
pub struct CleanTextResponse {
    pub text: String,
    pub words: usize,
    pub detected: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    #[serde(flatten)]
    pub dependencies: DependencyReport,
    pub renders: RenderStats,
    pub voice_providers: Vec<&'static str>,
    pub footage_source: &'static str,
    pub writer_configured: bool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generate-short", post(generate_short))
        .route("/api/render-video", post(render_video))
        .route("/api/voiceover", post(voiceover))
        .route("/api/clean-text", post(clean_text))
        .route("/api/generate-idea", post(generate_idea))
        .route("/api/generate-caption", post(generate_caption))
        .route("/api/tiru", post(tiru))
        .route("/api/analyze-link", post(analyze_link))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                let request_id: u32 = rand::random();
                info_span!(
                    "request",
                    id = %format!("{:08x}", request_id),
                    method = %req.method(),
                    uri = %req.uri().path(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
}

pub async fn start_server(port: u16, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[SERVER] SYNOID Shorts API listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cfg = &state.pipeline.config;
    let dependencies = check_dependencies(
        &cfg.ffmpeg_bin,
        &cfg.ffprobe_bin,
        &cfg.ytdlp_bin,
        state.pipeline.started,
    )
    .await;

    Json(HealthResponse {
        healthy: dependencies.is_healthy(),
        dependencies,
        renders: state.render_stats(),
        voice_providers: state.pipeline.voice.provider_names(),
        footage_source: state.pipeline.footage.name(),
        writer_configured: state.pipeline.writer.is_some(),
    })
}

async fn produce(state: AppState, payload: ShortPayload, mode: RenderMode) -> ApiResult<Response> {
    required(&payload.text, "text")?;

    let out_dir = tempfile::Builder::new()
        .prefix("synoid_api_")
        .tempdir()
        .map_err(ShortsError::from)?;
    let download_name = match mode {
        RenderMode::Plain => "video_short.mp4",
        RenderMode::Captioned => "video_final.mp4",
    };
    let request = ShortRequest {
        text: payload.text,
        query: payload.query,
        voice_id: payload.voice_id,
        lang: payload.lang,
        mode,
        output_path: out_dir.path().join(download_name),
    };

    let slot = state.begin_render();
    let report = state.pipeline.produce_short(&request).await?;
    let bytes = tokio::fs::read(&report.output_path).await.map_err(ShortsError::from)?;
    slot.succeed();

    info!(
        "[SERVER] Sending {} ({:.2}s, {:.2} MB)",
        download_name, report.duration_seconds, report.size_mb
    );
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn generate_short(
    State(state): State<AppState>,
    Json(payload): Json<ShortPayload>,
) -> ApiResult<Response> {
    produce(state, payload, RenderMode::Plain).await
}

async fn render_video(
    State(state): State<AppState>,
    Json(payload): Json<ShortPayload>,
) -> ApiResult<Response> {
    produce(state, payload, RenderMode::Captioned).await
}

async fn voiceover(
    State(state): State<AppState>,
    Json(payload): Json<VoiceoverPayload>,
) -> ApiResult<Response> {
    required(&payload.text, "text")?;

    let out_dir = tempfile::tempdir().map_err(ShortsError::from)?;
    let out_path: PathBuf = out_dir.path().join("voiceover.mp3");
    let request = VoiceoverRequest {
        text: payload.text,
        voice_id: payload.voice_id,
        lang: payload.lang,
        polish: payload.polish,
    };
    let report = state.pipeline.produce_voiceover(&request, &out_path).await?;
    let bytes = tokio::fs::read(&report.path).await.map_err(ShortsError::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"voiceover.mp3\""),
        ],
        bytes,
    )
        .into_response())
}

async fn clean_text(Json(payload): Json<TextPayload>) -> ApiResult<Json<CleanTextResponse>> {
    required(&payload.text, "text")?;
    let narration = normalize(&payload.text);
    Ok(Json(CleanTextResponse {
        words: narration.word_count(),
        detected: !narration.is_sentinel(),
        text: narration.into_string(),
    }))
}

async fn generate_idea(
    State(state): State<AppState>,
    Json(payload): Json<TopicPayload>,
) -> ApiResult<Json<serde_json::Value>> {
    required(&payload.topic, "topic")?;
    let idea = state.pipeline.writer()?.idea(&payload.topic).await?;
    Ok(Json(json!({ "idea": idea })))
}

async fn generate_caption(
    State(state): State<AppState>,
    Json(payload): Json<TopicPayload>,
) -> ApiResult<Json<serde_json::Value>> {
    required(&payload.topic, "topic")?;
    let lang = payload
        .lang
        .unwrap_or_else(|| state.pipeline.config.default_lang.clone());
    let caption = state
        .pipeline
        .writer()?
        .social_caption(&payload.topic, &lang)
        .await?;
    Ok(Json(json!({ "caption": caption })))
}

async fn tiru(
    State(state): State<AppState>,
    Json(payload): Json<TextPayload>,
) -> ApiResult<Json<serde_json::Value>> {
    required(&payload.text, "text")?;
    let result = state
        .pipeline
        .writer()?
        .rewrite(&payload.text, payload.style.as_deref())
        .await?;
    Ok(Json(json!({ "result": result })))
}

async fn analyze_link(
    State(state): State<AppState>,
    Json(payload): Json<LinkPayload>,
) -> ApiResult<Json<serde_json::Value>> {
    required(&payload.url, "url")?;
    let analysis = state.pipeline.analyze_link(&payload.url).await?;
    Ok(Json(json!(analysis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::pipeline::test_support::{offline_context, SilentVoice};
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        let ctx = offline_context(dir, Arc::new(SilentVoice::default()));
        build_router(Arc::new(ShortsState::new(ctx)))
    }

    async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_clean_text() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            app(dir.path()),
            "/api/clean-text",
            json!({ "text": "VOICEOVER: **Hidup** itu indah, jalani saja." }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Hidup itu indah, jalani saja.");
        assert_eq!(body["detected"], true);
    }

    #[tokio::test]
    async fn test_empty_input_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        for uri in ["/api/clean-text", "/api/generate-short", "/api/render-video", "/api/voiceover", "/api/tiru"] {
            let (status, body) = post_json(app(dir.path()), uri, json!({ "text": "  " })).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["kind"], "input_validation");
        }
        let (status, _) = post_json(app(dir.path()), "/api/generate-idea", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generator_endpoints_unavailable_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) =
            post_json(app(dir.path()), "/api/generate-idea", json!({ "topic": "kopi" })).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "external_service");

        let (status, _) = post_json(
            app(dir.path()),
            "/api/analyze-link",
            json!({ "url": "https://example.com/not-youtube" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generate_short_without_footage_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post_json(
            app(dir.path()),
            "/api/generate-short",
            json!({ "text": "Setiap pagi adalah awal yang baru.", "query": "zzqx" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("no footage found"));
    }

    #[tokio::test]
    async fn test_health_reports_tools() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["tools"].as_array().unwrap().len(), 3);
        assert_eq!(body["voice_providers"][0], "silent");
        assert_eq!(body["writer_configured"], false);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&ShortsError::InputValidation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ShortsError::NoFootageFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&ShortsError::external("pexels", "down")), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&ShortsError::GeneratorUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&ShortsError::Render("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_for(&ShortsError::NoValidFootage { rejected: 2 }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
