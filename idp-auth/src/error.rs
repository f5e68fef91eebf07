//! Error types for identity-provider authentication
//!
//! Configuration errors are the only errors returned as `Err` from this
//! crate's setup paths. Per-token failures are carried as values inside a
//! [`ValidationResult`](crate::result::ValidationResult).

use thiserror::Error;

/// Configuration error raised while building options or registering an
/// adapter. Hosts must abort startup on this error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required setting is missing or blank
    #[error("{0} is required.")]
    Missing(String),

    /// A setting is present but unusable
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// The configuration section could not be bound to options
    #[error("Configuration section '{section}' could not be bound: {message}")]
    Binding {
        /// Section name.
        section: String,
        /// Error message from the binder.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reason a well-formed token was refused by signature, issuer, audience or
/// lifetime checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Token carries no signature or declares `alg: none`
    #[error("Signature validation failed. The token does not have a signature.")]
    Unsigned,

    /// Header names an algorithm that cannot be verified
    #[error("Signature validation failed. Algorithm '{0}' is not supported.")]
    UnsupportedAlgorithm(String),

    /// No usable verification key
    #[error("Signature validation failed. {0}")]
    SigningKey(String),

    /// Signature does not match the signing input
    #[error("Signature validation failed. The signature is invalid.")]
    InvalidSignature,

    /// `iss` is absent or blank
    #[error("Issuer validation failed. The token does not have an issuer.")]
    MissingIssuer,

    /// `iss` is not an accepted issuer
    #[error("Issuer validation failed. Issuer: '{0}'. Did not match any valid issuer.")]
    InvalidIssuer(String),

    /// `aud` is absent or empty
    #[error("Audience validation failed. The token does not have an audience.")]
    MissingAudience,

    /// No `aud` value is an accepted audience
    #[error("Audience validation failed. Audiences: '{0}'. Did not match any valid audience.")]
    InvalidAudience(String),

    /// `exp` is absent
    #[error("Lifetime validation failed. The token is missing an expiration time.")]
    MissingExpiration,

    /// `exp` lies before now minus the clock skew
    #[error("Lifetime validation failed. The token expired at '{expires}', current time is '{now}'.")]
    Expired {
        /// Expiration time (RFC 3339).
        expires: String,
        /// Validation time (RFC 3339).
        now: String,
    },

    /// `nbf` lies after now plus the clock skew
    #[error("Lifetime validation failed. The token is not valid before '{not_before}', current time is '{now}'.")]
    NotYetValid {
        /// Not-before time (RFC 3339).
        not_before: String,
        /// Validation time (RFC 3339).
        now: String,
    },

    /// `nbf` is later than `exp`
    #[error("Lifetime validation failed. Not before '{not_before}' is after expiration '{expires}'.")]
    InvalidLifetime {
        /// Not-before time (RFC 3339).
        not_before: String,
        /// Expiration time (RFC 3339).
        expires: String,
    },
}

/// Failure of a single validation call.
///
/// The `Display` output of each variant is the exact error message exposed
/// through [`ValidationResult::error_message`](crate::result::ValidationResult::error_message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Token text was empty or whitespace
    #[error("Token is null or empty")]
    Empty,

    /// Token is not a compact signed structure
    #[error("Token cannot be read")]
    Unreadable,

    /// Signature, issuer, audience or lifetime check failed
    #[error("Token validation failed: {0}")]
    Rejected(#[from] Rejection),

    /// Anything else that went wrong during processing
    #[error("Error validating token: {0}")]
    Unexpected(String),
}

/// Error returned by a [`SigningKeyResolver`](crate::keys::SigningKeyResolver).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// No key with the requested `kid` exists, even after a refresh
    #[error("No signing key found for kid '{0}'.")]
    KeyNotFound(String),

    /// The key set is empty or no default key applies
    #[error("No signing key is available to validate the token.")]
    NoKeys,

    /// The key is declared for a different algorithm than the token uses
    #[error("Signing key '{kid}' is declared for {declared}, but the token uses {requested}.")]
    AlgorithmMismatch {
        /// Key identifier.
        kid: String,
        /// Algorithm the key set declares.
        declared: String,
        /// Algorithm named in the token header.
        requested: String,
    },

    /// Key material could not be fetched (network, discovery, parse)
    #[error("Signing keys are unavailable: {0}")]
    Unavailable(String),

    /// Key material exists but cannot be turned into a verification key
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

impl From<KeyError> for ValidationError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::KeyNotFound(_) | KeyError::NoKeys | KeyError::AlgorithmMismatch { .. } => {
                ValidationError::Rejected(Rejection::SigningKey(err.to_string()))
            }
            KeyError::Unavailable(_) | KeyError::InvalidKey(_) => {
                ValidationError::Unexpected(err.to_string())
            }
        }
    }
}

impl ValidationError {
    /// Check if this error should be logged at warn level.
    ///
    /// Rejected and unreadable tokens are expected traffic; unexpected
    /// failures usually point at key material or infrastructure.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ValidationError::Unexpected(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Empty => "TOKEN_EMPTY",
            ValidationError::Unreadable => "TOKEN_UNREADABLE",
            ValidationError::Rejected(_) => "TOKEN_REJECTED",
            ValidationError::Unexpected(_) => "VALIDATION_ERROR",
        }
    }
}
