// HTTP route handlers for the judging API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use codesandbox_common::types::response_code;
use codesandbox_common::{JudgingResponse, Submission};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::{metrics, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub code: i32,
    pub message: String,
}

/// POST /sandbox/judgement - Judge a submission synchronously
///
/// The outcome travels in the body `code`; the HTTP status is always 200,
/// unparseable bodies included.
pub async fn judge_submission(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Response {
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            warn!(%rejection, "rejected request body");
            metrics::record_rejected("invalid_body");
            return (
                StatusCode::OK,
                Json(JudgingResponse::failure(
                    response_code::VALIDATION_FAILURE,
                    "invalid request data",
                )),
            )
                .into_response();
        }
    };

    let started = Instant::now();
    let response = state.orchestrator.respond(&submission).await;

    // unknown languages share one label to keep cardinality bounded
    let language = if state.orchestrator.registry().supports(&submission.language) {
        submission.language.as_str()
    } else {
        "unsupported"
    };
    metrics::record_judgement(language, &response, started.elapsed());

    info!(
        question_id = submission.question_id,
        language,
        code = response.code,
        tests = response.results.len(),
        "judgement served"
    );

    (StatusCode::OK, Json(response)).into_response()
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        code: response_code::OK,
        message: "ok".to_string(),
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler() -> Response {
    match metrics::render_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(%err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
