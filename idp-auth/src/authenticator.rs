//! Authenticator facade
//!
//! Host code depends on [`IdpAuthenticator`] only. Each host runtime
//! supplies one implementation, built once at startup around the shared
//! [`TokenValidator`](crate::validator::TokenValidator) and held as
//! `Arc<dyn IdpAuthenticator>`.

use crate::options::IdpOptions;
use crate::result::ValidationResult;
use async_trait::async_trait;

/// Token validation and sign-in URL construction for one identity provider.
#[async_trait]
pub trait IdpAuthenticator: Send + Sync {
    /// Validate a bearer token.
    ///
    /// Never fails: every problem is reported through the returned result.
    async fn validate_token(&self, token: &str) -> ValidationResult;

    /// URL that starts an interactive sign-in with the identity provider.
    fn authorize_url(&self) -> String;

    /// Options the authenticator was built with.
    fn options(&self) -> &IdpOptions;
}
