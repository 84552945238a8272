//! Request-scoped tenant auth extraction. Token verification itself is out
//! of scope ("produced once per request by an external
//! token-verification collaborator") — this gateway trusts the
//! `X-User-Id`/`X-Organization-Id`/`X-Role`/`X-Email` headers an upstream
//! auth proxy is expected to set after verifying the caller's JWT.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use uuid::Uuid;

use bomenrich_auth::{AuthContext, Role};

pub struct Authed(pub AuthContext);

impl<S> FromRequestParts<S> for Authed
where
S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| -> Option<String> {
            parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
        };

        let user_id = header("x-user-id")
            .and_then(|s| Uuid::parse_str(&s).ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid x-user-id"))?;
        let organization_id = header("x-organization-id")
            .and_then(|s| Uuid::parse_str(&s).ok())
            .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid x-organization-id"))?;
        let role = match header("x-role").as_deref() {
            Some("analyst") => Role::Analyst,
            Some("engineer") => Role::Engineer,
            Some("admin") => Role::Admin,
            Some("owner") => Role::Owner,
            Some("super_admin") => Role::SuperAdmin,
            _ => return Err((StatusCode::UNAUTHORIZED, "missing or invalid x-role")),
        };
        let email = header("x-email").unwrap_or_default();

        Ok(Authed(AuthContext::new(user_id, organization_id, role, email)))
    }
}
