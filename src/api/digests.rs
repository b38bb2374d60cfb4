use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DigestDto, MessageResponse, RenameDigestRequest};
use crate::models::Digest;
use crate::models::digest::{PDF_CONTENT_TYPE, parse_user_date};
use crate::services::Session as AuthSession;

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    parse_user_date(raw).map_err(ApiError::validation)
}

impl From<Digest> for DigestDto {
    fn from(digest: Digest) -> Self {
        Self {
            id: digest.id,
            name: digest.name,
            date: digest.date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// GET /digests
pub async fn list_digests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<DigestDto>>>, ApiError> {
    let digests = state.digest_service().list().await?;
    Ok(Json(ApiResponse::success(
        digests.into_iter().map(DigestDto::from).collect(),
    )))
}

/// GET /digests/{date}
/// Streams the PDF and records the view.
pub async fn open_digest(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(date): Path<String>,
) -> Result<Response, ApiError> {
    let date = parse_date(&date)?;
    let opened = state.digest_service().open(&auth, date).await?;

    let disposition = format!("inline; filename=\"{}\"", opened.digest.name);
    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        opened.bytes,
    )
        .into_response())
}

/// PUT /digests/{date}
/// Body is the raw PDF.
pub async fn upload_digest(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(date): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<DigestDto>>, ApiError> {
    let date = parse_date(&date)?;
    let digest = state
        .digest_service()
        .upload(&auth, date, body.to_vec())
        .await?;
    Ok(Json(ApiResponse::success(digest.into())))
}

/// DELETE /digests/{date}
pub async fn delete_digest(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(date): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let date = parse_date(&date)?;
    state.digest_service().delete(&auth, date).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Digest for {date} deleted"
    )))))
}

/// POST /digests/{date}/rename
pub async fn rename_digest(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(date): Path<String>,
    Json(payload): Json<RenameDigestRequest>,
) -> Result<Json<ApiResponse<DigestDto>>, ApiError> {
    let from = parse_date(&date)?;
    let to = parse_date(&payload.to)?;
    let digest = state.digest_service().rename(&auth, from, to).await?;
    Ok(Json(ApiResponse::success(digest.into())))
}
