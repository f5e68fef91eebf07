//! # IdP Authentication Hosts
//!
//! Wires [`idp_auth`] into axum applications. Two adapters are provided,
//! matching the two ways a host can register request handling:
//!
//! - **pipeline** (default): a tower `Layer` composed into the router's
//!   service stack, configured from the `WpIdpAuth` section
//! - **middleware** (default): a function middleware in the ordered
//!   middleware chain, with cookie-session sign-in settings
//!
//! Both adapters share the same behaviour per request:
//! - no `Authorization: Bearer` header: the request continues anonymously
//! - invalid token: `401` with `{"error":"invalid_token","error_description":...}`
//! - valid token: the [`ValidationResult`](idp_auth::ValidationResult) is
//!   stored in request extensions, readable through [`Authenticated`]
//!
//! The authenticator itself is available to handlers as
//! `Extension<Arc<dyn IdpAuthenticator>>`.

pub mod bearer;
#[cfg(feature = "middleware")]
pub mod middleware;
#[cfg(feature = "pipeline")]
pub mod pipeline;
pub mod signin;

pub use bearer::{bearer_token, invalid_token, Authenticated, SharedAuthenticator};
pub use signin::{
    BearerSettings, CookieSettings, HostKind, InteractiveSignIn, NoSignIn, SignInConfig,
};

#[cfg(feature = "middleware")]
pub use middleware::{use_idp_auth, MiddlewareAuthenticator};
#[cfg(feature = "pipeline")]
pub use pipeline::{
    add_idp_auth, add_idp_auth_with_options, IdpAuthLayer, IdpAuthService, PipelineAuthenticator,
};
