use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        body::Body,
        extract::{Path, Query, State},
        http::{StatusCode, header},
        response::{IntoResponse, Json, Response},
        routing::{get, post},
    },
    serde::Deserialize,
    serde_json::json,
    tokio_util::io::ReaderStream,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
    tunepress_common::FailureKind,
    tunepress_media::mime::mime_for_extension,
};

use crate::{Error, service::DownloadService};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DownloadService>,
}

// ── Router ───────────────────────────────────────────────────────────────────

/// Build the HTTP router (shared between production startup and tests).
pub fn build_app(service: Arc<DownloadService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/download", post(download_handler))
        .route("/api/download/{*path}", get(artifact_handler))
        .route("/api/queue", post(enqueue_handler).get(jobs_handler))
        .route("/api/queue/sweep", post(sweep_handler))
        .route("/api/history", get(history_handler))
        .route("/api/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { service })
}

/// Bind and serve until the process stops.
pub async fn serve(bind: &str, port: u16, service: Arc<DownloadService>) -> crate::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .map_err(|e| Error::message(format!("invalid bind address {bind}:{port}: {e}")))?;
    let app = build_app(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// HTTP status for a failure class. Client mistakes are 4xx; a blocked
/// source is 503 so callers know to retry later.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidRequest => StatusCode::BAD_REQUEST,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Blocked => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Transient
        | FailureKind::MetadataProbeFailed
        | FailureKind::UnsupportedFormat
        | FailureKind::PublishFailed => StatusCode::BAD_GATEWAY,
        FailureKind::PackagingFailed | FailureKind::CatalogWriteFailed => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            warn!(kind = %kind, error = %self, "request failed");
        }
        (
            status,
            Json(json!({
                "status": "error",
                "error": self.to_string(),
                "kind": kind,
                "retryable": kind.is_retryable(),
            })),
        )
            .into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadBody {
    query: Option<String>,
    #[serde(alias = "sourceUrl")]
    url: Option<String>,
    destination_folder: Option<String>,
}

async fn download_handler(
    State(state): State<AppState>,
    Json(body): Json<DownloadBody>,
) -> Result<Response, Error> {
    let out = state
        .service
        .submit(body.query, body.url, body.destination_folder.as_deref())
        .await?;
    Ok(Json(json!({
        "status": "success",
        "title": out.title,
        "artist": out.artist,
        "duration": out.duration,
        "artifactUrl": out.artifact_url,
        "filename": out.filename,
        "sizeBytes": out.size_bytes,
        "strategyUsed": out.strategy_used,
        "attemptCount": out.attempt_count,
        "catalogWritten": out.catalog_written,
    }))
    .into_response())
}

async fn artifact_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, Error> {
    let file_path = state.service.artifact_path(&path).await?;
    let file = tokio::fs::File::open(&file_path).await?;
    let content_type = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(mime_for_extension)
        .unwrap_or("application/octet-stream");
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueBody {
    song_name: String,
}

async fn enqueue_handler(
    State(state): State<AppState>,
    Json(body): Json<EnqueueBody>,
) -> Result<Response, Error> {
    let job = state.service.enqueue(&body.song_name).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "queued", "jobId": job.id, "job": job.to_record() })),
    )
        .into_response())
}

async fn jobs_handler(State(state): State<AppState>) -> Result<Response, Error> {
    let jobs = state.service.jobs().await?;
    Ok(Json(json!({ "jobs": jobs })).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SweepBody {
    destination_folder: Option<String>,
}

async fn sweep_handler(
    State(state): State<AppState>,
    body: Option<Json<SweepBody>>,
) -> Result<Response, Error> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let report = state
        .service
        .sweep(body.destination_folder.as_deref())
        .await?;
    Ok(Json(json!({
        "status": "success",
        "results": report.results,
        "stuck": report.stuck,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, Error> {
    let songs = state.service.history(query.limit).await?;
    Ok(Json(json!({ "status": "success", "songs": songs })).into_response())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.health().await)
}

async fn status_handler(State(state): State<AppState>) -> Result<Response, Error> {
    let status = state.service.storage_status().await?;
    Ok(Json(status).into_response())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(FailureKind::InvalidRequest, 400)]
    #[case(FailureKind::NotFound, 404)]
    #[case(FailureKind::Blocked, 503)]
    #[case(FailureKind::Transient, 502)]
    #[case(FailureKind::PublishFailed, 502)]
    #[case(FailureKind::PackagingFailed, 500)]
    fn failure_status_codes(#[case] kind: FailureKind, #[case] code: u16) {
        assert_eq!(status_for(kind).as_u16(), code);
    }

    #[test]
    fn blocked_source_is_flagged_retryable() {
        let err = Error::from(tunepress_acquire::AcquisitionError::AllStrategiesFailed {
            attempts: 3,
            last_error: tunepress_acquire::SourceError::blocked("not a bot"),
            blocked: true,
        });
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
