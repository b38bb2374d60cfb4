use axum::{
    Extension, Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::{
    ApiError, ApiResponse, AppState, ChangePasswordRequest, LoginRequest, LoginResponse,
    MeResponse, MessageResponse,
};
use crate::services::Session as AuthSession;

/// Key under which the logged-in [`AuthSession`] is kept in the cookie session.
const SESSION_KEY: &str = "session";

// ============================================================================
// Middleware
// ============================================================================

/// Rejects requests without a login session and hands the session to
/// handlers as an `Extension<AuthSession>`.
pub async fn auth_middleware(
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = session
        .get::<AuthSession>(SESSION_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    tracing::Span::current().record("username", auth.username.as_str());
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Layered after [`auth_middleware`] on administrator-only routes.
pub async fn admin_middleware(
    Extension(auth): Extension<AuthSession>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !auth.is_administrator {
        return Err(ApiError::forbidden());
    }
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let outcome = state
        .auth_service()
        .login(&payload.username, &payload.password)
        .await?;

    // New id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
    session
        .insert(SESSION_KEY, &outcome.session)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    Ok(Json(ApiResponse::success(LoginResponse {
        username: outcome.session.username,
        is_administrator: outcome.session.is_administrator,
        warning: outcome.warning,
        must_change_password: outcome.must_change_password,
    })))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
) -> Result<Json<ApiResponse<MeResponse>>, ApiError> {
    let account = state.auth_service().account_info(&auth).await?;

    Ok(Json(ApiResponse::success(MeResponse {
        username: auth.username,
        is_administrator: auth.is_administrator,
        account,
    })))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSession>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth_service()
        .change_password(&auth, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}
