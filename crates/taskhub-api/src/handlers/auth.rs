//! Authentication API handlers
//!
//! Registration, login, token verification and refresh, password change,
//! logout and the current profile.

use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::{
    AuthResponse, AuthenticatedUser, ChangePasswordRequest, LoginRequest, LogoutRequest,
    RefreshRequest, RegisterRequest, UserProfile, UserPublic,
};
use crate::error::{ApiJson, AppError};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Token verification result
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserPublic,
}

/// Logout-all result
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutAllResponse {
    /// Refresh tokens revoked by this call
    pub revoked_sessions: u64,
}

/// Register a new user account
///
/// New accounts carry no role; an administrator assigns roles afterwards.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = request.email.clone();

    match state.auth.register(request).await {
        Ok(user) => {
            audit_log(
                &AuditEvent::Registered {
                    user_id: user.id,
                    email: user.email.clone(),
                },
                &client,
            );
            Ok(ApiResponse::with_message(user, "User registered successfully").created())
        }
        Err(e) => {
            let reason = e.to_string();
            audit_log(&AuditEvent::RegistrationRejected { email, reason }, &client);
            Err(e.into())
        }
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = request.email.clone();

    match state.auth.login(request).await {
        Ok(response) => {
            audit_log(
                &AuditEvent::LoginSucceeded {
                    user_id: response.user.id,
                    email: response.user.email.clone(),
                },
                &client,
            );
            Ok(ApiResponse::with_message(response, "Login successful"))
        }
        Err(e) => {
            let reason = e.to_string();
            audit_log(&AuditEvent::LoginFailed { email, reason }, &client);
            Err(e.into())
        }
    }
}

/// Validate the bearer token and return its user
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    tag = "auth",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.current_user(user.user_id()).await?;

    Ok(ApiResponse::ok(VerifyResponse {
        valid: true,
        user: profile.user,
    }))
}

/// Rotate a refresh token
///
/// The presented token is consumed; the response carries its successor.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh-token",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = AuthResponse),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth.refresh_access_token(request).await?;

    audit_log(
        &AuditEvent::TokenRefreshed {
            user_id: response.user.id,
            email: response.user.email.clone(),
        },
        &client,
    );

    Ok(ApiResponse::ok(response))
}

/// Change the caller's password
#[utoipa::path(
    put,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Rejected", body = crate::error::ApiError),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientInfo,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.auth.change_password(user.user_id(), request).await;

    audit_log(
        &AuditEvent::PasswordChanged {
            user_id: user.user_id(),
            email: user.principal.email.clone(),
            success: result.is_ok(),
        },
        &client,
    );
    result?;

    Ok(ApiResponse::message("Password changed successfully"))
}

/// End the current session
///
/// Blacklists the bearer token; a refresh token in the body is revoked too.
/// The body is optional and ignored when it does not parse.
///
/// Repeating the call with the same bearer token gets 401 from the auth
/// middleware, since that token is already blacklisted.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body(content = LogoutRequest, description = "Optional refresh token to revoke"),
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientInfo,
    request: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = request.and_then(|Json(body)| body.refresh_token);

    state
        .auth
        .logout(user.user_id(), Some(&user.token), refresh_token.as_deref())
        .await?;

    audit_log(
        &AuditEvent::LoggedOut {
            user_id: user.user_id(),
            email: user.principal.email.clone(),
            all_devices: false,
        },
        &client,
    );

    Ok(ApiResponse::message("Logged out successfully"))
}

/// Revoke every session of the caller
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "auth",
    responses(
        (status = 200, description = "All sessions revoked", body = LogoutAllResponse),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_all_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    client: ClientInfo,
) -> Result<impl IntoResponse, AppError> {
    let revoked_sessions = state
        .auth
        .logout_all(user.user_id(), Some(&user.token))
        .await?;

    audit_log(
        &AuditEvent::LoggedOut {
            user_id: user.user_id(),
            email: user.principal.email.clone(),
            all_devices: true,
        },
        &client,
    );

    Ok(ApiResponse::with_message(
        LogoutAllResponse { revoked_sessions },
        "All sessions revoked",
    ))
}

/// Current user with roles and capabilities
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user profile", body = UserProfile),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.current_user(user.user_id()).await?;

    Ok(ApiResponse::ok(profile))
}
