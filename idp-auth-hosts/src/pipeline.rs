//! Pipeline host adapter
//!
//! Registers identity-provider authentication as a tower [`Layer`] in the
//! router's service pipeline. Setup reads the `WpIdpAuth` configuration
//! section, or takes ready-made [`IdpOptions`].
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use idp_auth::StaticKeyResolver;
//! use idp_auth_hosts::{pipeline, Authenticated, NoSignIn};
//! use std::sync::Arc;
//!
//! # fn build(config: serde_json::Value) -> Result<Router, idp_auth::ConfigError> {
//! let router = Router::new().route(
//!     "/me",
//!     get(|Authenticated(user): Authenticated| async move {
//!         user.subject().unwrap_or_default().to_string()
//!     }),
//! );
//! let keys = Arc::new(StaticKeyResolver::from_secret("shared-secret"));
//! pipeline::add_idp_auth(router, &config, keys, &mut NoSignIn)
//! # }
//! ```

use crate::bearer::{authenticate, SharedAuthenticator};
use crate::signin::{InteractiveSignIn, SignInConfig};
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    response::Response,
    Extension, Router,
};
use idp_auth::{
    authorize_url, Clock, ConfigResult, IdpAuthenticator, IdpOptions, SigningKeyResolver,
    TokenValidator, ValidationResult,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

/// [`IdpAuthenticator`] for pipeline hosts.
#[derive(Debug, Clone)]
pub struct PipelineAuthenticator {
    validator: TokenValidator,
}

impl PipelineAuthenticator {
    /// Build the authenticator; fails when authority or client id is missing.
    pub fn new(options: IdpOptions, keys: Arc<dyn SigningKeyResolver>) -> ConfigResult<Self> {
        options.validate()?;
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
impl IdpAuthenticator for PipelineAuthenticator {
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

/// Layer that authenticates bearer tokens before the inner service runs.
#[derive(Clone)]
pub struct IdpAuthLayer {
    authenticator: SharedAuthenticator,
}

impl IdpAuthLayer {
    /// Layer backed by `authenticator`.
    pub fn new(authenticator: SharedAuthenticator) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for IdpAuthLayer {
    type Service = IdpAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdpAuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Service produced by [`IdpAuthLayer`].
#[derive(Clone)]
pub struct IdpAuthService<S> {
    inner: S,
    authenticator: SharedAuthenticator,
}

impl<S> Service<Request<Body>> for IdpAuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            if let Err(rejection) = authenticate(authenticator.as_ref(), &mut request).await {
                return Ok(rejection);
            }
            ready_inner.call(request).await
        })
    }
}

/// Register authentication from the `WpIdpAuth` section of `config_root`.
///
/// Fails with `WpIdpAuth:Authority` / `WpIdpAuth:ClientId` when either is
/// missing; the host should abort startup.
pub fn add_idp_auth<S>(
    router: Router<S>,
    config_root: &serde_json::Value,
    keys: Arc<dyn SigningKeyResolver>,
    sign_in: &mut impl InteractiveSignIn,
) -> ConfigResult<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let options = IdpOptions::from_config(config_root)?;
    options.validate_section()?;
    add_idp_auth_with_options(router, options, keys, sign_in)
}

/// Register authentication with explicit options.
///
/// Builds the authenticator once, installs [`IdpAuthLayer`], exposes the
/// authenticator as `Extension<Arc<dyn IdpAuthenticator>>` and configures
/// the host's native sign-in.
pub fn add_idp_auth_with_options<S>(
    router: Router<S>,
    options: IdpOptions,
    keys: Arc<dyn SigningKeyResolver>,
    sign_in: &mut impl InteractiveSignIn,
) -> ConfigResult<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let authenticator = PipelineAuthenticator::new(options, keys)?;
    Ok(install(router, Arc::new(authenticator), sign_in))
}

/// Register a prebuilt authenticator.
pub fn add_idp_authenticator<S>(
    router: Router<S>,
    authenticator: SharedAuthenticator,
    sign_in: &mut impl InteractiveSignIn,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    install(router, authenticator, sign_in)
}

fn install<S>(
    router: Router<S>,
    authenticator: SharedAuthenticator,
    sign_in: &mut impl InteractiveSignIn,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let options = authenticator.options();
    sign_in.configure(SignInConfig::for_pipeline(options));
    tracing::info!(
        authority = %options.authority,
        client_id = %options.client_id,
        "Identity-provider authentication registered in pipeline"
    );

    router
        .layer(IdpAuthLayer::new(authenticator.clone()))
        .layer(Extension(authenticator))
}
