// HTTP API over the download pipeline: /info and /download.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use tubefetch::pipeline::{
    MediaKind, Pipeline, PipelineConfig, PipelineError, SelectionPolicy, VideoDetails,
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const PORT_ENV: &str = "TUBEFETCH_PORT";

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        // Bad input and gone-from-upstream map to 404; everything else is
        // a host or tooling problem and maps to 500
        if err.is_input_error() {
            ApiError::not_found(err.to_string())
        } else {
            ApiError::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let port = std::env::var(PORT_ENV)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    let pipeline = Pipeline::new(PipelineConfig::default()).context("building pipeline")?;
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let app = Router::new()
        .route("/info", get(info))
        .route("/download", get(download))
        .with_state(state);

    let addr = SocketAddr::new(DEFAULT_HOST.parse()?, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {}", err);
    }
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    url: String,
}

#[derive(Serialize)]
struct VideoFormatEntry {
    resolution: String,
    size_mb: Option<f64>,
    itag: u32,
}

#[derive(Serialize)]
struct AudioFormatEntry {
    abr: String,
    size_mb: Option<f64>,
    itag: u32,
}

#[derive(Serialize)]
struct InfoResponse {
    title: String,
    thumbnail_url: String,
    duration: String,
    video_formats: Vec<VideoFormatEntry>,
    audio_formats: Vec<AudioFormatEntry>,
}

impl InfoResponse {
    fn from_details(details: &VideoDetails) -> Self {
        let video_formats = details
            .streams
            .iter()
            .filter(|s| s.has_video())
            .map(|s| VideoFormatEntry {
                resolution: s.quality_label(),
                size_mb: s.size_mb(),
                itag: s.itag,
            })
            .collect();

        let audio_formats = details
            .streams
            .iter()
            .filter(|s| s.kind == MediaKind::AudioOnly)
            .map(|s| AudioFormatEntry {
                abr: s.quality_label(),
                size_mb: s.size_mb(),
                itag: s.itag,
            })
            .collect();

        Self {
            title: details.title.clone(),
            thumbnail_url: details.thumbnail.clone(),
            duration: details.duration_display(),
            video_formats,
            audio_formats,
        }
    }
}

async fn info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> ApiResult<Json<InfoResponse>> {
    let details = state.pipeline.probe(&query.url).await?;
    Ok(Json(InfoResponse::from_details(&details)))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    url: String,
    /// Omitted means "best video + audio"
    video_itag: Option<u32>,
    audio_itag: Option<u32>,
}

async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let policy = match query.video_itag {
        Some(video_itag) => SelectionPolicy::Explicit {
            video_itag,
            audio_itag: query.audio_itag,
        },
        None => SelectionPolicy::Best,
    };

    let delivered = state
        .pipeline
        .download(&query.url, &policy, None, None)
        .await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "video/mp4".parse().unwrap());

    // Titles can carry non-ASCII; fall back to a generic name rather than
    // failing the whole request over a header
    let disposition = format!("attachment; filename=\"{}\"", delivered.file_name)
        .parse()
        .unwrap_or_else(|_| {
            header::HeaderValue::from_static("attachment; filename=\"video.mp4\"")
        });
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((headers, delivered.bytes).into_response())
}
