use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::{middleware::Next, response::Response};
use tracing::debug;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::access::Role;
use crate::kernel::identity::{Identity, IdentityProvider};

/// Authenticated user information resolved from the bearer token.
///
/// Extracting `AuthUser` in a handler rejects unauthenticated requests with
/// 401; extract `Option<AuthUser>` on public routes.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Token verification middleware
///
/// Extracts the bearer token from the Authorization header, verifies it
/// against the identity provider, and adds AuthUser to request extensions.
/// If no token or invalid token, the request continues without AuthUser
/// (public access); protected handlers reject via the extractor.
pub async fn auth_middleware(
    identity: Arc<dyn IdentityProvider>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(&request) {
        match identity.verify_token(&token).await {
            Ok(resolved) => {
                debug!("Authenticated user: {} ({})", resolved.user_id, resolved.role);
                request.extensions_mut().insert(AuthUser {
                    user_id: resolved.user_id,
                    email: resolved.email,
                    role: resolved.role,
                });
            }
            Err(e) => {
                debug!(error = %e, "Token verification failed");
            }
        }
    } else {
        debug!("No authentication token");
    }

    next.run(request).await
}

/// Extract the token from the Authorization header (handles both
/// "Bearer <token>" and a raw token).
fn extract_bearer_token(request: &axum::http::Request<axum::body::Body>) -> Option<String> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Authentication("authentication token required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(value: Option<&str>) -> axum::http::Request<axum::body::Body> {
        let mut builder = axum::http::Request::builder();
        if let Some(v) = value {
            builder = builder.header("authorization", v);
        }
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_token_with_bearer_prefix() {
        let request = request_with_header(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&request).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_raw_token() {
        let request = request_with_header(Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token(&request).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_no_header() {
        let request = request_with_header(None);
        assert!(extract_bearer_token(&request).is_none());
    }

    #[test]
    fn test_empty_bearer() {
        let request = request_with_header(Some("Bearer "));
        assert!(extract_bearer_token(&request).is_none());
    }
}
