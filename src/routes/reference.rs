use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::exam::types::{ChunkSearchResult, RagFilterHint};
use crate::rag::filters::infer_filters;
use crate::response::AppError;
use crate::state::AppState;

const MAX_TOP_K: usize = 20;

#[derive(Serialize)]
struct SuccessResponse<T: Serialize> {
    success: bool,
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    results: Vec<ChunkSearchResult>,
    inferred_filter: RagFilterHint,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/search", post(search))
}

async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(AppError::validation("query is required"));
    }

    let inferred_filter = infer_filters(query);

    let mut results = state
        .exam_engine()
        .retriever()
        .retrieve_with_timeout(query)
        .await;

    if let Some(top_k) = body.top_k {
        results.truncate(top_k.clamp(1, MAX_TOP_K));
    }

    Ok(Json(SuccessResponse {
        success: true,
        data: SearchResponse {
            results,
            inferred_filter,
        },
    }))
}
