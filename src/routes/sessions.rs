use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::exam::{AnswerInput, EndTrigger, SessionConfig};
use crate::response::{json_error, AppError};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T: Serialize> {
    success: bool,
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnRequest {
    version: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    version: i64,
    #[serde(flatten)]
    input: AnswerInput,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EndRequest {
    #[serde(default)]
    version: Option<i64>,
    #[serde(default)]
    trigger: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/active", get(active_session))
        .route("/:id", get(get_session))
        .route("/:id/next", post(next_question))
        .route("/:id/answer", post(submit_answer))
        .route("/:id/end", post(end_session))
}

async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(config): Json<SessionConfig>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;

    let session = state.exam_engine().start_session(&user_id, config).await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            success: true,
            data: session,
        }),
    ))
}

async fn active_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;

    let session = state.exam_engine().active_session(&user_id).await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: session,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;

    let session = owned_session(&state, &id, &user_id).await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: session,
    }))
}

async fn next_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TurnRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    owned_session(&state, &id, &user_id).await?;

    let turn = state.exam_engine().next_question(&id, body.version).await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: turn,
    }))
}

async fn submit_answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    owned_session(&state, &id, &user_id).await?;

    let feedback = state
        .exam_engine()
        .submit_answer(&id, body.version, body.input)
        .await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: feedback,
    }))
}

async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<EndRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user(&headers)?;
    owned_session(&state, &id, &user_id).await?;

    let Json(body) = body.unwrap_or_default();
    let trigger = body
        .trigger
        .as_deref()
        .map(EndTrigger::parse)
        .unwrap_or(EndTrigger::UserEnded);

    let session = state
        .exam_engine()
        .end_session(&id, body.version, trigger)
        .await?;

    Ok(Json(SuccessResponse {
        success: true,
        data: session,
    }))
}

async fn owned_session(
    state: &AppState,
    session_id: &str,
    user_id: &str,
) -> Result<crate::exam::ExamSession, AppError> {
    let session = state
        .exam_engine()
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Exam session not found"))?;

    if session.user_id != user_id {
        return Err(AppError::forbidden("Session belongs to another user"));
    }
    Ok(session)
}

fn require_user(headers: &HeaderMap) -> Result<String, AppError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing x-user-id header",
            )
        })?;

    Ok(user_id.to_string())
}
