#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    routing::get,
    Extension, Router,
};
use chrono::Utc;
use idp_auth::{SigningKeyResolver, StaticKeyResolver};
use idp_auth_hosts::{Authenticated, InteractiveSignIn, SharedAuthenticator, SignInConfig};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const AUTHORITY: &str = "https://login.example.com/contoso";
pub const CLIENT_ID: &str = "client-123";
pub const REDIRECT_URI: &str = "https://app.example.com/signin-oidc";
pub const SECRET: &[u8] = b"host-adapter-signing-secret";

/// Sign-in stack that records the configuration it receives.
#[derive(Debug, Default)]
pub struct RecordingSignIn {
    pub configured: Vec<SignInConfig>,
}

impl InteractiveSignIn for RecordingSignIn {
    fn configure(&mut self, config: SignInConfig) {
        self.configured.push(config);
    }
}

pub fn keys() -> Arc<dyn SigningKeyResolver> {
    Arc::new(StaticKeyResolver::from_secret(SECRET))
}

pub fn token(extra: Value) -> String {
    let now = Utc::now().timestamp();
    let mut claims = json!({
        "iss": AUTHORITY,
        "aud": CLIENT_ID,
        "sub": "user-1",
        "tid": "tenant-1",
        "email": "user@example.com",
        "nbf": now - 60,
        "exp": now + 600,
    });
    if let (Some(claims), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            claims.insert(k.clone(), v.clone());
        }
    }
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

async fn me(Authenticated(result): Authenticated) -> String {
    result.subject().unwrap_or_default().to_string()
}

async fn login(Extension(authenticator): Extension<SharedAuthenticator>) -> String {
    authenticator.authorize_url()
}

pub fn routes() -> Router {
    Router::new()
        .route("/public", get(|| async { "ok" }))
        .route("/me", get(me))
        .route("/login", get(login))
}

pub async fn send(app: &Router, uri: &str, authorization: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Shared request-flow checks run against either adapter.
pub async fn assert_request_flow(app: &Router) {
    let response = send(app, "/public", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = send(app, "/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bearer = format!("Bearer {}", token(json!({})));
    let response = send(app, "/me", Some(&bearer)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "user-1");

    let response = send(app, "/public", Some("Bearer not-a-token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        r#"Bearer error="invalid_token""#
    );
    assert_eq!(
        body_json(response).await,
        json!({ "error": "invalid_token", "error_description": "Token cannot be read" })
    );

    let expired = token(json!({
        "nbf": Utc::now().timestamp() - 7200,
        "exp": Utc::now().timestamp() - 3600,
    }));
    let response = send(app, "/me", Some(&format!("Bearer {}", expired))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error_description"]
        .as_str()
        .unwrap()
        .starts_with("Token validation failed: "));

    let response = send(app, "/public", Some("Basic dXNlcjpwYXNz")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
