//! Native interactive sign-in configuration
//!
//! The adapters do not run the OpenID Connect redirect flow themselves.
//! They derive a [`SignInConfig`] from [`IdpOptions`] and hand it to the
//! host's own sign-in stack through [`InteractiveSignIn`].

use idp_auth::{IdpOptions, ValidationParameters};
use std::time::Duration;
use url::Url;

/// Callback path used when the redirect URI is missing or unparsable.
pub const DEFAULT_CALLBACK_PATH: &str = "/signin-oidc";

/// Tenant used when the authority does not name one.
pub const COMMON_TENANT: &str = "common";

/// Page the middleware host redirects to when sign-in fails.
pub const ERROR_PATH: &str = "/Error";

/// Cookie authentication type used by the middleware host.
pub const COOKIE_SCHEME: &str = "Cookies";

/// Session cookie name used by the middleware host.
pub const COOKIE_NAME: &str = "WpIdpAuth.Cookie";

/// Session cookie lifetime used by the middleware host.
pub const COOKIE_LIFETIME: Duration = Duration::from_secs(8 * 60 * 60);

/// Host's interactive sign-in stack.
///
/// Called exactly once, while the adapter is being registered.
pub trait InteractiveSignIn {
    /// Apply the derived configuration.
    fn configure(&mut self, config: SignInConfig);
}

/// Sign-in stack that ignores its configuration, for API-only hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignIn;

impl InteractiveSignIn for NoSignIn {
    fn configure(&mut self, _config: SignInConfig) {}
}

/// Which adapter produced a [`SignInConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Tower layer in the service pipeline
    Pipeline,
    /// Function middleware with cookie sessions
    Middleware,
}

/// Session cookie settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Authentication type the cookie is issued under
    pub scheme: String,
    /// Cookie name
    pub name: String,
    /// Session lifetime
    pub expire: Duration,
    /// Whether activity renews the lifetime
    pub sliding_expiration: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            scheme: COOKIE_SCHEME.to_string(),
            name: COOKIE_NAME.to_string(),
            expire: COOKIE_LIFETIME,
            sliding_expiration: true,
        }
    }
}

/// Bearer authentication settings for the pipeline host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerSettings {
    /// Token issuer authority
    pub authority: String,
    /// Primary audience (the client id)
    pub audience: String,
    /// Metadata must be fetched over HTTPS
    pub require_https_metadata: bool,
    /// Explicit metadata address, if configured
    pub metadata_address: Option<String>,
}

/// Everything the host's sign-in stack needs, derived from [`IdpOptions`].
#[derive(Clone, PartialEq, Eq)]
pub struct SignInConfig {
    /// Adapter that produced this configuration
    pub host: HostKind,
    /// Identity-provider authority URL
    pub authority: String,
    /// `scheme://host` of the authority
    pub instance: Option<String>,
    /// Host name of the authority
    pub domain: Option<String>,
    /// Tenant named by the authority, see [`tenant_id`]
    pub tenant_id: Option<String>,
    /// Client identifier
    pub client_id: String,
    /// Client secret, redacted in `Debug`
    pub client_secret: Option<String>,
    /// Path the identity provider posts back to
    pub callback_path: String,
    /// Redirect URI sent with the authorization request
    pub redirect_uri: String,
    /// Where the provider returns after sign-out
    pub post_logout_redirect_uri: String,
    /// OAuth response type
    pub response_type: String,
    /// Space-separated scopes
    pub scope: String,
    /// Metadata must be fetched over HTTPS
    pub require_https_metadata: bool,
    /// Explicit metadata address, if configured
    pub metadata_address: Option<String>,
    /// Token validation rules shared with the bearer path
    pub validation: ValidationParameters,
    /// Set for the pipeline host only
    pub bearer: Option<BearerSettings>,
    /// Set for the middleware host only
    pub cookie: Option<CookieSettings>,
}

impl std::fmt::Debug for SignInConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInConfig")
            .field("host", &self.host)
            .field("authority", &self.authority)
            .field("instance", &self.instance)
            .field("domain", &self.domain)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("callback_path", &self.callback_path)
            .field("redirect_uri", &self.redirect_uri)
            .field("response_type", &self.response_type)
            .field("scope", &self.scope)
            .field("require_https_metadata", &self.require_https_metadata)
            .field("metadata_address", &self.metadata_address)
            .field("bearer", &self.bearer)
            .field("cookie", &self.cookie)
            .finish_non_exhaustive()
    }
}

impl SignInConfig {
    fn base(host: HostKind, options: &IdpOptions) -> Self {
        Self {
            host,
            authority: options.authority.clone(),
            instance: instance(&options.authority),
            domain: domain(&options.authority),
            tenant_id: tenant_id(&options.authority),
            client_id: options.client_id.clone(),
            client_secret: options.client_secret.clone(),
            callback_path: callback_path(&options.redirect_uri),
            redirect_uri: options.redirect_uri.clone(),
            post_logout_redirect_uri: options.redirect_uri.clone(),
            response_type: options.response_type.clone(),
            scope: options.scope.clone(),
            require_https_metadata: options.require_https,
            metadata_address: options
                .metadata_address
                .clone()
                .filter(|address| !address.trim().is_empty()),
            validation: ValidationParameters::from_options(options),
            bearer: None,
            cookie: None,
        }
    }

    /// Configuration for the pipeline host: web sign-in plus bearer settings.
    pub fn for_pipeline(options: &IdpOptions) -> Self {
        let mut config = Self::base(HostKind::Pipeline, options);
        config.bearer = Some(BearerSettings {
            authority: options.authority.clone(),
            audience: options.client_id.clone(),
            require_https_metadata: options.require_https,
            metadata_address: config.metadata_address.clone(),
        });
        config
    }

    /// Configuration for the middleware host: cookie session plus OIDC.
    pub fn for_middleware(options: &IdpOptions) -> Self {
        let mut config = Self::base(HostKind::Middleware, options);
        config.cookie = Some(CookieSettings::default());
        config
    }

    /// Where to send the browser when sign-in fails with `message`.
    pub fn failure_redirect(&self, message: &str) -> String {
        failure_redirect(message)
    }
}

/// `scheme://host` of `authority`.
pub fn instance(authority: &str) -> Option<String> {
    let url = parse(authority)?;
    Some(format!("{}://{}", url.scheme(), url.host_str()?))
}

/// Host name of `authority`.
pub fn domain(authority: &str) -> Option<String> {
    parse(authority)?.host_str().map(str::to_string)
}

/// Tenant named by the last path segment of `authority`.
///
/// Only the path of the parsed URL is considered, never the host:
/// - `https://login.example.com/contoso` gives `contoso`
/// - no path segment, or a last segment of `v2.0`, gives [`COMMON_TENANT`]
/// - a blank value or one that is not an absolute URL gives `None`
pub fn tenant_id(authority: &str) -> Option<String> {
    let url = parse(authority)?;
    let last = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last());

    match last {
        Some(segment) if segment != "v2.0" => Some(segment.to_string()),
        _ => Some(COMMON_TENANT.to_string()),
    }
}

/// Path component of `redirect_uri`, or [`DEFAULT_CALLBACK_PATH`].
pub fn callback_path(redirect_uri: &str) -> String {
    parse(redirect_uri)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|| DEFAULT_CALLBACK_PATH.to_string())
}

/// `/Error?message=<escaped message>`.
pub fn failure_redirect(message: &str) -> String {
    format!("{}?message={}", ERROR_PATH, urlencoding::encode(message))
}

fn parse(value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Url::parse(value).ok()
}
