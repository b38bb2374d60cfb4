use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{
    ActivityQuery, ApiError, ApiResponse, AppState, BootstrapRequest, CreateUserRequest,
    DeleteUserResponse, ResetPasswordRequest, ResetPasswordResponse, SetEmailRequest, StatsQuery,
};
use crate::models::AccountSummary;
use crate::services::{CreatedAccount, NewAccount, RecentActivity, Session as AuthSession, StatsSummary};

const DEFAULT_ACTIVITY_LIMIT: usize = 100;
const DEFAULT_STATS_DAYS: u32 = 30;

// ============================================================================
// Accounts
// ============================================================================

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<ApiResponse<Vec<AccountSummary>>>, ApiError> {
    let accounts = state.account_service().list_accounts(&auth).await?;
    Ok(Json(ApiResponse::success(accounts)))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<CreatedAccount>>, ApiError> {
    let created = state
        .account_service()
        .add_account(
            &auth,
            NewAccount {
                username: payload.username,
                password: payload.password,
                email: payload.email,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(created)))
}

/// DELETE /admin/users/{username}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<DeleteUserResponse>>, ApiError> {
    let deleted = state
        .account_service()
        .delete_account(&auth, &username)
        .await?;
    Ok(Json(ApiResponse::success(DeleteUserResponse {
        username,
        deleted,
    })))
}

/// PUT /admin/users/{username}/password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(username): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<ResetPasswordResponse>>, ApiError> {
    let generated_password = state
        .account_service()
        .reset_password(&auth, &username, payload.password)
        .await?;
    Ok(Json(ApiResponse::success(ResetPasswordResponse {
        username,
        generated_password,
    })))
}

/// PUT /admin/users/{username}/email
pub async fn set_email(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Path(username): Path<String>,
    Json(payload): Json<SetEmailRequest>,
) -> Result<Json<ApiResponse<AccountSummary>>, ApiError> {
    let account = state
        .account_service()
        .set_email(&auth, &username, payload.email)
        .await?;
    Ok(Json(ApiResponse::success(account)))
}

/// POST /admin/bootstrap
/// Persists the administrator after a break-glass login on an empty store.
pub async fn bootstrap(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Json(payload): Json<BootstrapRequest>,
) -> Result<Json<ApiResponse<AccountSummary>>, ApiError> {
    let account = state
        .account_service()
        .bootstrap_administrator(&auth, &payload.password, payload.email)
        .await?;
    Ok(Json(ApiResponse::success(account)))
}

// ============================================================================
// Activity
// ============================================================================

/// GET /admin/activity?limit=N
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ApiResponse<RecentActivity>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    let recent = state.stats_service().recent(&auth, limit).await?;
    Ok(Json(ApiResponse::success(recent)))
}

/// GET /admin/stats?days=N
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<StatsSummary>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS);
    let summary = state.stats_service().summary(&auth, days).await?;
    Ok(Json(ApiResponse::success(summary)))
}
