//! Middleware host adapter
//!
//! Registers identity-provider authentication as a function middleware in
//! the router's ordered middleware chain, with cookie-session sign-in
//! settings for the host's interactive login.

use crate::bearer::{authenticate, SharedAuthenticator};
use crate::signin::{InteractiveSignIn, SignInConfig};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    Extension, Router,
};
use idp_auth::{
    authorize_url, Clock, ConfigResult, IdpAuthenticator, IdpOptions, SigningKeyResolver,
    TokenValidator, ValidationResult,
};
use std::sync::Arc;

/// [`IdpAuthenticator`] for middleware hosts.
#[derive(Debug, Clone)]
pub struct MiddlewareAuthenticator {
    validator: TokenValidator,
}

impl MiddlewareAuthenticator {
    /// Build the authenticator; fails when authority, client id or redirect
    /// URI is missing.
    pub fn new(options: IdpOptions, keys: Arc<dyn SigningKeyResolver>) -> ConfigResult<Self> {
        options.validate_for_sign_in()?;
        Ok(Self {
            validator: TokenValidator::new(Arc::new(options), keys),
        })
    }

    /// Replace the clock used for lifetime checks.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            validator: self.validator.with_clock(clock),
        }
    }

    /// Underlying validator.
    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }
}

#[async_trait]
impl IdpAuthenticator for MiddlewareAuthenticator {
    async fn validate_token(&self, token: &str) -> ValidationResult {
        self.validator.validate(token).await
    }

    fn authorize_url(&self) -> String {
        authorize_url(self.validator.options())
    }

    fn options(&self) -> &IdpOptions {
        self.validator.options()
    }
}

/// Install authentication in the middleware chain of `router`.
///
/// Fails with `Authority`, `ClientId` or `RedirectUri` when missing.
pub fn use_idp_auth<S>(
    router: Router<S>,
    options: IdpOptions,
    keys: Arc<dyn SigningKeyResolver>,
    sign_in: &mut impl InteractiveSignIn,
) -> ConfigResult<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let authenticator = MiddlewareAuthenticator::new(options, keys)?;
    Ok(use_idp_authenticator(router, Arc::new(authenticator), sign_in))
}

/// Install a prebuilt authenticator.
pub fn use_idp_authenticator<S>(
    router: Router<S>,
    authenticator: SharedAuthenticator,
    sign_in: &mut impl InteractiveSignIn,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let options = authenticator.options();
    sign_in.configure(SignInConfig::for_middleware(options));
    tracing::info!(
        authority = %options.authority,
        client_id = %options.client_id,
        redirect_uri = %options.redirect_uri,
        "Identity-provider authentication registered in middleware chain"
    );

    router
        .layer(middleware::from_fn_with_state(
            authenticator.clone(),
            idp_auth_middleware,
        ))
        .layer(Extension(authenticator))
}

async fn idp_auth_middleware(
    State(authenticator): State<SharedAuthenticator>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Err(rejection) = authenticate(authenticator.as_ref(), &mut request).await {
        return rejection;
    }
    next.run(request).await
}
