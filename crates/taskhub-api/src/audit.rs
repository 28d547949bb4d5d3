//! Security audit trail
//!
//! Events go to the `audit` tracing target at INFO, so a filter such as
//! `RUST_LOG=info,audit=info` can route them separately. The whole record,
//! client details included, is also attached as one JSON `event` field.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::convert::Infallible;
use taskhub_core::Role;
use uuid::Uuid;

/// Where a request came from, as far as the proxy headers say
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// First `X-Forwarded-For` hop, else `X-Real-IP`
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let ip_address = text("x-forwarded-for")
            .and_then(|chain| chain.split(',').next())
            .or_else(|| text("x-real-ip"))
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(String::from);

        Self {
            ip_address,
            user_agent: text(header::USER_AGENT.as_str()).map(String::from),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    Registered {
        user_id: Uuid,
        email: String,
    },
    RegistrationRejected {
        email: String,
        reason: String,
    },
    LoginSucceeded {
        user_id: Uuid,
        email: String,
    },
    /// The reason stays in the log; the client only ever sees a generic 401
    LoginFailed {
        email: String,
        reason: String,
    },
    TokenRefreshed {
        user_id: Uuid,
        email: String,
    },
    TokenRejected {
        reason: String,
    },
    LoggedOut {
        user_id: Uuid,
        email: String,
        all_devices: bool,
    },
    PasswordChanged {
        user_id: Uuid,
        email: String,
        success: bool,
    },
    AccessDenied {
        user_id: Uuid,
        email: String,
        resource: String,
        required: String,
    },
    RoleAssigned {
        user_id: Uuid,
        role: Role,
        by: Uuid,
    },
    RoleRevoked {
        user_id: Uuid,
        role: Role,
        by: Uuid,
    },
    UserStatusChanged {
        user_id: Uuid,
        is_active: bool,
        by: Uuid,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        use AuditEvent::*;
        match self {
            Registered { .. } => "Registration successful",
            RegistrationRejected { .. } => "Registration failed",
            LoginSucceeded { .. } => "Login successful",
            LoginFailed { .. } => "Login failed",
            TokenRefreshed { .. } => "Token refresh",
            TokenRejected { .. } => "Invalid token",
            LoggedOut { .. } => "User logout",
            PasswordChanged { .. } => "Password change",
            AccessDenied { .. } => "Access denied",
            RoleAssigned { .. } => "Role assigned",
            RoleRevoked { .. } => "Role revoked",
            UserStatusChanged { .. } => "User status changed",
        }
    }

    fn subject(&self) -> Option<Uuid> {
        use AuditEvent::*;
        match self {
            Registered { user_id, .. }
            | LoginSucceeded { user_id, .. }
            | TokenRefreshed { user_id, .. }
            | LoggedOut { user_id, .. }
            | PasswordChanged { user_id, .. }
            | AccessDenied { user_id, .. }
            | RoleAssigned { user_id, .. }
            | RoleRevoked { user_id, .. }
            | UserStatusChanged { user_id, .. } => Some(*user_id),
            RegistrationRejected { .. } | LoginFailed { .. } | TokenRejected { .. } => None,
        }
    }
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a AuditEvent,
    #[serde(flatten)]
    client: &'a ClientInfo,
}

fn render(event: &AuditEvent, client: &ClientInfo) -> String {
    let record = AuditRecord {
        at: Utc::now(),
        event,
        client,
    };
    serde_json::to_string(&record)
        .unwrap_or_else(|e| format!("{{\"error\":\"unserializable audit event: {e}\"}}"))
}

/// Emit an event raised while serving a request
pub fn audit_log(event: &AuditEvent, client: &ClientInfo) {
    tracing::info!(
        target: "audit",
        event = %render(event, client),
        user_id = ?event.subject(),
        ip_address = client.ip_address.as_deref().unwrap_or("-"),
        "{}",
        event.summary()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let client = ClientInfo::from_headers(&headers(&[
            ("x-forwarded-for", "203.0.113.1, 198.51.100.1"),
            ("x-real-ip", "198.51.100.7"),
            ("user-agent", "curl/8.0"),
        ]));

        assert_eq!(client.ip_address.as_deref(), Some("203.0.113.1"));
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_real_ip_fallback_and_absence() {
        let client = ClientInfo::from_headers(&headers(&[("x-real-ip", " 198.51.100.7 ")]));
        assert_eq!(client.ip_address.as_deref(), Some("198.51.100.7"));

        assert_eq!(ClientInfo::from_headers(&HeaderMap::new()), ClientInfo::default());
    }

    #[test]
    fn test_record_flattens_event_and_client() {
        let event = AuditEvent::RoleAssigned {
            user_id: Uuid::new_v4(),
            role: Role::ResponsableProyecto,
            by: Uuid::new_v4(),
        };
        let client = ClientInfo {
            ip_address: Some("192.0.2.10".into()),
            user_agent: None,
        };

        let json: serde_json::Value = serde_json::from_str(&render(&event, &client)).unwrap();

        assert_eq!(json["event_type"], "role_assigned");
        assert_eq!(json["role"], "responsable_proyecto");
        assert_eq!(json["ip_address"], "192.0.2.10");
        assert!(json["at"].is_string());
        assert!(event.subject().is_some());
    }

    #[test]
    fn test_failures_have_no_subject() {
        let event = AuditEvent::LoginFailed {
            email: "alice@example.com".into(),
            reason: "Invalid email or password".into(),
        };

        assert!(event.subject().is_none());
        audit_log(&event, &ClientInfo::default());
    }
}
