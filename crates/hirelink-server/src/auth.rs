//! Bearer-token authentication for REST requests and the gateway handshake.
//!
//! A token is only accepted when its signature and expiry verify AND its
//! subject still resolves to a stored user. Both the REST middleware and the
//! gateway handshake go through [`resolve_token`], so the two surfaces can
//! never drift apart on what counts as authenticated.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use hirelink_shared::types::{Role, UserId};

use crate::api::AppState;
use crate::error::ServerError;

/// The authenticated caller, attached to request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

/// Axum middleware guarding the `/api` routes.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ServerError::Authentication("Not authorized, no token".into()))?;

    let user = resolve_token(&state, &token)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Extract the token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get("authorization")?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Verify a bearer token and resolve it to a stored user.
pub fn resolve_token(state: &AppState, token: &str) -> Result<CurrentUser, ServerError> {
    let claims = state
        .auth
        .verify(token)
        .map_err(|e| ServerError::Authentication(format!("Not authorized: {e}")))?;

    let user_id = claims
        .user_id()
        .map_err(|_| ServerError::Authentication("Not authorized: malformed token".into()))?;

    let user = state
        .store()?
        .user_by_id(user_id)
        .map_err(|_| ServerError::Authentication("Not authorized: user not found".into()))?;

    Ok(CurrentUser {
        id: user.id,
        name: user.name,
        role: user.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn missing_or_malformed_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
