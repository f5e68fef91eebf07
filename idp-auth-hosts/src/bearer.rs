//! Bearer plumbing shared by both host adapters

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use idp_auth::{IdpAuthenticator, ValidationResult};
use serde_json::json;
use std::sync::Arc;

/// Authenticator singleton as stored in request extensions.
pub type SharedAuthenticator = Arc<dyn IdpAuthenticator>;

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Returns `None` when the header
/// is absent or uses another scheme.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if scheme.eq_ignore_ascii_case("Bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// `401 Unauthorized` for a token that failed validation.
pub fn invalid_token(message: &str) -> Response {
    challenge(r#"Bearer error="invalid_token""#, "invalid_token", message)
}

/// `401 Unauthorized` for a request that carried no token.
pub fn missing_token() -> Response {
    challenge("Bearer", "unauthorized", "Authentication required")
}

fn challenge(www_authenticate: &'static str, error: &str, description: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": error,
            "error_description": description,
        })),
    )
        .into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(www_authenticate),
    );
    response
}

/// Validate the request's bearer token, if any.
///
/// Requests without a bearer token pass through untouched. A valid token
/// stores its [`ValidationResult`] in the request extensions; an invalid
/// one produces the `401` response to return instead of calling the
/// handler.
pub(crate) async fn authenticate(
    authenticator: &dyn IdpAuthenticator,
    request: &mut Request,
) -> Result<(), Response> {
    let Some(token) = bearer_token(request.headers()) else {
        return Ok(());
    };

    let result = authenticator.validate_token(token).await;
    if !result.is_valid() {
        let message = result.error_message().unwrap_or("Token validation failed");
        tracing::debug!(
            path = %request.uri().path(),
            error = message,
            "Rejecting request with invalid bearer token"
        );
        return Err(invalid_token(message));
    }

    tracing::debug!(subject = ?result.subject(), "Bearer token accepted");
    request.extensions_mut().insert(result);
    Ok(())
}

/// Extractor for the validated token of the current request.
///
/// Rejects with `401` when the request was not authenticated.
#[derive(Debug, Clone)]
pub struct Authenticated(pub ValidationResult);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ValidationResult>()
            .filter(|result| result.is_valid())
            .cloned()
            .map(Authenticated)
            .ok_or_else(missing_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Bearer")), Some(""));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_invalid_token_response() {
        let response = invalid_token("Token cannot be read");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Bearer error="invalid_token""#
        );
    }
}
