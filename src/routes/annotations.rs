//! Annotation API endpoints
//!
//! Every response carries a `success` flag; failures add an `error` message
//! that clients show as-is.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::annotations::{Annotation, AnnotationDraft, FractionalRect, HighlightColor};
use crate::error::StoreError;
use crate::state::AppState;
use crate::store::MISSING_FIELDS_MESSAGE;

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_annotations).post(create_annotation))
        .route("/:id", delete(delete_annotation))
}

/// Query parameters for listing annotations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    article_id: Option<String>,
    user_id: Option<String>,
}

/// Request body for creating annotations
///
/// Everything is optional at the parsing stage so that missing ids produce
/// the API's own 400 instead of an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnotationRequest {
    #[serde(default)]
    pub article_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default = "first_page")]
    pub page_number: u32,
    #[serde(default)]
    pub highlighted_text: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub highlight_areas: Vec<FractionalRect>,
    #[serde(default)]
    pub highlight_color: HighlightColor,
}

fn first_page() -> u32 {
    1
}

impl From<CreateAnnotationRequest> for AnnotationDraft {
    fn from(req: CreateAnnotationRequest) -> Self {
        AnnotationDraft {
            article_id: req.article_id,
            author_id: req.user_id,
            author_display_name: req.user_name,
            page_number: req.page_number,
            highlighted_text: req.highlighted_text,
            comment_text: req.comment,
            highlight_regions: req.highlight_areas,
            color: req.highlight_color,
        }
    }
}

/// Response types
#[derive(Debug, Serialize)]
pub struct AnnotationResponse {
    pub success: bool,
    pub annotation: Annotation,
}

#[derive(Debug, Serialize)]
pub struct AnnotationsListResponse {
    pub success: bool,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Error returned by the annotation handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Store(StoreError::Rejected(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Store(err @ StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
            ApiError::Store(err) => {
                tracing::error!("Annotation store error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// List annotations for an article, or for an author when only `userId` is given
async fn list_annotations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<AnnotationsListResponse>, ApiError> {
    let annotations = match (non_empty(params.article_id), non_empty(params.user_id)) {
        (Some(article_id), _) => state.store().list(&article_id).await?,
        (None, Some(user_id)) => state.store().list_for_author(&user_id).await?,
        (None, None) => return Err(ApiError::BadRequest("Article ID required".to_string())),
    };

    Ok(Json(AnnotationsListResponse {
        success: true,
        annotations,
    }))
}

/// Create a new annotation
async fn create_annotation(
    State(state): State<AppState>,
    Json(req): Json<CreateAnnotationRequest>,
) -> Result<(StatusCode, Json<AnnotationResponse>), ApiError> {
    let draft = AnnotationDraft::from(req);
    if draft.missing_required_fields() {
        return Err(ApiError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()));
    }

    let annotation = state.store().create(draft).await?;
    tracing::info!(id = %annotation.id, article = %annotation.article_id, "Created annotation");

    Ok((
        StatusCode::CREATED,
        Json(AnnotationResponse {
            success: true,
            annotation,
        }),
    ))
}

/// Delete an annotation
async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store().delete(&id).await?;
    tracing::info!(id = %id, "Deleted annotation");

    Ok(Json(SuccessResponse { success: true }))
}
