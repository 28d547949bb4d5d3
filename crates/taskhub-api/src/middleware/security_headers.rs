//! Response hardening headers
//!
//! Applied to every response, errors included. Swagger UI pages skip the
//! content security policy and `no-store`, since the UI loads inline assets
//! and caches fine.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

static ALWAYS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
];

/// API responses carry tokens and user data
static API_ONLY: [(HeaderName, &str); 2] = [
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
    (header::CACHE_CONTROL, "no-store"),
];

const DOCS_PREFIX: &str = "/swagger-ui";

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let serves_docs = request.uri().path().starts_with(DOCS_PREFIX);
    let mut response = next.run(request).await;

    let extra: &[(HeaderName, &str)] = if serves_docs { &[] } else { &API_ONLY };
    let headers = response.headers_mut();
    for (name, value) in ALWAYS.iter().chain(extra) {
        headers.insert(name.clone(), HeaderValue::from_static(*value));
    }

    response
}
