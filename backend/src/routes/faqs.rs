//! FAQ routes
//!
//! Reading the list is public; changing it requires the admin role.

use crate::auth::{require_role, Authentication};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use kummerkasten_shared::{CreateQuestionAnswerPair, QuestionAnswerPair, RepositionRequest, UserRole};
use uuid::Uuid;
use validator::Validate;

/// Create FAQ routes
pub fn faq_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_faqs).post(create_faq))
        .route("/:id", delete(delete_faq))
        .route("/:id/position", put(reposition_faq))
}

async fn ordered(state: &AppState) -> ApiResult<Vec<QuestionAnswerPair>> {
    let records = state.faqs().list().await?;
    Ok(records.into_iter().map(Into::into).collect())
}

/// GET /api/v1/faqs
async fn list_faqs(State(state): State<AppState>) -> ApiResult<Json<Vec<QuestionAnswerPair>>> {
    Ok(Json(ordered(&state).await?))
}

/// POST /api/v1/faqs - append to the end of the list
async fn create_faq(
    State(state): State<AppState>,
    auth: Authentication,
    Json(req): Json<CreateQuestionAnswerPair>,
) -> ApiResult<(StatusCode, Json<QuestionAnswerPair>)> {
    require_role(&auth, UserRole::Admin)?;
    req.validate()?;

    let record = state.faqs().append(&req.question, &req.answer).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// DELETE /api/v1/faqs/:id
async fn delete_faq(
    State(state): State<AppState>,
    auth: Authentication,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&auth, UserRole::Admin)?;

    state.faqs().remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/faqs/:id/position
///
/// Returns the whole list in its new order. A concurrent change to the
/// list yields 409 and the client is expected to retry.
async fn reposition_faq(
    State(state): State<AppState>,
    auth: Authentication,
    Path(id): Path<Uuid>,
    Json(req): Json<RepositionRequest>,
) -> ApiResult<Json<Vec<QuestionAnswerPair>>> {
    require_role(&auth, UserRole::Admin)?;

    state.faqs().reposition(id, req.position).await?;
    Ok(Json(ordered(&state).await?))
}
