//! # IdP Authentication
//!
//! This crate validates identity-provider bearer tokens and builds the
//! authorization URL for interactive sign-in, independent of the web host
//! that calls it.
//!
//! ## Overview
//!
//! The idp-auth crate handles:
//! - **Options**: the `WpIdpAuth` configuration section, from JSON or environment
//! - **Validation**: signature, issuer, audience and lifetime checks with 5 minute skew
//! - **Claims**: subject, tenant and email extraction with fixed precedence
//! - **Authorize URL**: the `/oauth2/v2.0/authorize` sign-in link
//! - **Keys**: static key sets and JWKS discovery (optional)
//!
//! Host adapters live in `idp-auth-hosts` and implement [`IdpAuthenticator`].
//!
//! ## Features
//!
//! - `jwks` (default): JWKS key resolution over HTTP using reqwest
//!
//! ## Usage
//!
//! ### Token validation
//!
//! ```rust,no_run
//! use idp_auth::{IdpOptions, StaticKeyResolver, TokenValidator};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let options = Arc::new(
//!     IdpOptions::new("https://login.example.com/contoso", "client-id")
//!         .with_valid_audiences(["api://orders"]),
//! );
//! let keys = Arc::new(StaticKeyResolver::from_secret("shared-secret"));
//!
//! let validator = TokenValidator::new(options, keys);
//! let result = validator.validate("eyJ...").await;
//! if result.is_valid() {
//!     println!("subject: {:?}", result.subject());
//! } else {
//!     println!("rejected: {:?}", result.error_message());
//! }
//! # }
//! ```
//!
//! ### Authorize URL
//!
//! ```rust
//! use idp_auth::{authorize_url, IdpOptions};
//!
//! let options = IdpOptions::new("https://login.example.com/", "abc")
//!     .with_redirect_uri("https://app/cb")
//!     .with_scope("openid profile")
//!     .with_response_type("code");
//!
//! assert_eq!(
//!     authorize_url(&options),
//!     "https://login.example.com/oauth2/v2.0/authorize?client_id=abc&redirect_uri=https%3A%2F%2Fapp%2Fcb&response_type=code&scope=openid%20profile&response_mode=form_post"
//! );
//! ```
//!
//! ### Configuration
//!
//! ```rust
//! use idp_auth::IdpOptions;
//! use serde_json::json;
//!
//! let root = json!({
//!     "WpIdpAuth": {
//!         "Authority": "https://login.example.com/contoso",
//!         "ClientId": "client-id",
//!         "ValidAudiences": ["api://orders"]
//!     }
//! });
//! let options = IdpOptions::from_config(&root).unwrap();
//! assert_eq!(options.effective_issuers(), vec!["https://login.example.com/contoso"]);
//! ```

pub mod authenticator;
pub mod authorize;
pub mod claims;
pub mod error;
#[cfg(feature = "jwks")]
pub mod jwks;
pub mod keys;
pub mod options;
pub mod result;
pub mod token;
pub mod validator;

// Re-export main types
pub use authenticator::IdpAuthenticator;
pub use authorize::{authorize_url, AUTHORIZE_PATH};
pub use claims::ClaimSet;
pub use error::{ConfigError, ConfigResult, KeyError, Rejection, ValidationError};
pub use keys::{SigningKeyResolver, StaticKeyResolver};
pub use options::{IdpOptions, CONFIG_SECTION, DEFAULT_RESPONSE_TYPE, DEFAULT_SCOPE};
pub use result::ValidationResult;
pub use validator::{
    Clock, FixedClock, SystemClock, TokenValidator, ValidationParameters, CLOCK_SKEW_SECS,
};

#[cfg(feature = "jwks")]
pub use jwks::JwksKeyResolver;

// Re-exported so callers can build keys without a direct dependency.
pub use jsonwebtoken::{Algorithm, DecodingKey};
