//! Authentication middleware for protecting routes
//!
//! Extracts the bearer token, verifies it through [`AuthService`] (blacklist,
//! signature and expiry, then the user row) and resolves the caller's roles.
//! On success the [`AuthenticatedUser`] is added to request extensions.
//!
//! [`AuthService`]: super::AuthService

use super::jwt::Claims;
use super::permissions::{AccessRule, Ownership, Principal};
use super::AuthError;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use taskhub_core::Capability;
use uuid::Uuid;

/// Authenticated caller for one request
///
/// Extract in handlers with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub claims: Claims,
    /// Raw bearer token, needed to blacklist it on logout
    pub token: String,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> Uuid {
        self.principal.user_id
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Authentication middleware that requires a valid access token
///
/// ```ignore
/// let protected = Router::new()
///     .route("/auth/me", get(me_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let reject = |err: AuthError, headers: &axum::http::HeaderMap| {
        let reason = err.to_string();
        audit_log(&AuditEvent::TokenRejected { reason }, &ClientInfo::from_headers(headers));
        err
    };

    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => return Err(reject(e, request.headers())),
    };

    let verified = match state.auth.verify_token(&token).await {
        Ok(verified) => verified,
        Err(e) => return Err(reject(e, request.headers())),
    };

    let principal = state.resolver.resolve(&verified.user).await?;

    request.extensions_mut().insert(AuthenticatedUser {
        principal,
        claims: verified.claims,
        token,
    });

    Ok(next.run(request).await)
}

/// Type alias for rule middleware future
type RuleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Evaluate a non-ownership rule against the authenticated caller
async fn enforce(rule: AccessRule, request: Request<Body>, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or(AuthError::MissingAuthHeader)?;

    if let Err(denied) = user.principal.require(rule, Ownership::NotOwner) {
        audit_log(
            &AuditEvent::AccessDenied {
                user_id: user.user_id(),
                email: user.principal.email.clone(),
                resource: request.uri().path().to_string(),
                required: denied.to_string(),
            },
            &ClientInfo::from_headers(request.headers()),
        );
        return Err(denied.into());
    }

    Ok(next.run(request).await)
}

/// Gate that admits administrators only
///
/// Layer it inside [`auth_middleware`]:
///
/// ```ignore
/// let admin = Router::new()
///     .route("/users/:id/status", patch(set_status))
///     .route_layer(middleware::from_fn(require_admin))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, AuthError> {
    enforce(AccessRule::AdminOnly, request, next).await
}

/// Middleware factory admitting administrators and holders of `capability`
pub fn require_capability(
    capability: Capability,
) -> impl Fn(Request<Body>, Next) -> RuleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(enforce(AccessRule::RoleOrAdmin(capability), request, next))
    }
}
