//! Bearer token validation
//!
//! [`TokenValidator`] is the single implementation of the validation
//! algorithm shared by every host adapter:
//!
//! 1. reject empty input
//! 2. parse the compact token
//! 3. verify the signature with key material from the injected resolver
//! 4. check issuer, audience and lifetime (5 minute clock skew)
//! 5. extract identity claims
//!
//! Every failure is returned as an invalid [`ValidationResult`]; the
//! validator never returns `Err` and never panics on untrusted input.

use crate::claims::ClaimSet;
use crate::error::{Rejection, ValidationError};
use crate::keys::SigningKeyResolver;
use crate::options::IdpOptions;
use crate::result::ValidationResult;
use crate::token::CompactToken;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use jsonwebtoken::Algorithm;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// Tolerance applied to `exp` and `nbf` in both directions.
pub const CLOCK_SKEW_SECS: i64 = 300;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Rules derived once from [`IdpOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationParameters {
    /// Accepted issuers
    pub valid_issuers: Vec<String>,
    /// Accepted audiences
    pub valid_audiences: Vec<String>,
    /// Lifetime tolerance
    pub clock_skew: Duration,
    /// Unsigned tokens are refused
    pub require_signed_tokens: bool,
    /// `exp` must be present
    pub require_expiration_time: bool,
}

impl ValidationParameters {
    /// Parameters for `options`, with effective issuer/audience sets applied.
    pub fn from_options(options: &IdpOptions) -> Self {
        Self {
            valid_issuers: options.effective_issuers(),
            valid_audiences: options.effective_audiences(),
            clock_skew: Duration::seconds(CLOCK_SKEW_SECS),
            require_signed_tokens: true,
            require_expiration_time: true,
        }
    }
}

/// Validates bearer tokens against one identity provider.
///
/// Holds no per-call state and is safe to share across tasks.
#[derive(Clone)]
pub struct TokenValidator {
    options: Arc<IdpOptions>,
    parameters: ValidationParameters,
    keys: Arc<dyn SigningKeyResolver>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("options", &self.options)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator bound to `options` and a key resolver.
    pub fn new(options: Arc<IdpOptions>, keys: Arc<dyn SigningKeyResolver>) -> Self {
        let parameters = ValidationParameters::from_options(&options);
        Self {
            options,
            parameters,
            keys,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for lifetime checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound options.
    pub fn options(&self) -> &IdpOptions {
        &self.options
    }

    /// Derived validation rules.
    pub fn parameters(&self) -> &ValidationParameters {
        &self.parameters
    }

    /// Validate `token` and extract its identity.
    pub async fn validate(&self, token: &str) -> ValidationResult {
        match self.try_validate(token).await {
            Ok(claims) => ValidationResult::valid(claims),
            Err(err) => {
                if err.is_server_error() {
                    tracing::warn!(error = %err, "Token validation error");
                } else {
                    tracing::debug!(code = err.error_code(), error = %err, "Token rejected");
                }
                ValidationResult::from(err)
            }
        }
    }

    async fn try_validate(&self, text: &str) -> Result<ClaimSet, ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let token = CompactToken::parse(text).ok_or(ValidationError::Unreadable)?;

        self.verify_signature(&token).await?;

        let payload = token.payload();
        self.check_issuer(payload)?;
        self.check_audience(payload)?;
        self.check_lifetime(payload)?;

        Ok(ClaimSet::from_payload(payload))
    }

    async fn verify_signature(&self, token: &CompactToken<'_>) -> Result<(), ValidationError> {
        if token.is_unsigned() {
            if self.parameters.require_signed_tokens {
                return Err(Rejection::Unsigned.into());
            }
            return Ok(());
        }

        let header = token.header();
        let alg = Algorithm::from_str(&header.alg)
            .map_err(|_| Rejection::UnsupportedAlgorithm(header.alg.clone()))?;

        let key = self.keys.resolve(header.kid.as_deref(), alg).await?;

        let verified = jsonwebtoken::crypto::verify(
            token.signature(),
            token.signing_input().as_bytes(),
            &key,
            alg,
        )
        .map_err(|e| {
            tracing::debug!(kid = ?header.kid, alg = ?alg, error = %e, "Signature check errored");
            Rejection::InvalidSignature
        })?;

        if verified {
            Ok(())
        } else {
            Err(Rejection::InvalidSignature.into())
        }
    }

    fn check_issuer(&self, payload: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
        let issuer = match payload.get("iss") {
            Some(Value::String(iss)) if !iss.trim().is_empty() => iss,
            _ => return Err(Rejection::MissingIssuer.into()),
        };

        if self.parameters.valid_issuers.iter().any(|valid| valid == issuer) {
            Ok(())
        } else {
            Err(Rejection::InvalidIssuer(issuer.clone()).into())
        }
    }

    fn check_audience(&self, payload: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
        let audiences: Vec<&str> = match payload.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if audiences.is_empty() {
            return Err(Rejection::MissingAudience.into());
        }

        let accepted = audiences
            .iter()
            .any(|aud| self.parameters.valid_audiences.iter().any(|valid| valid == aud));
        if accepted {
            Ok(())
        } else {
            Err(Rejection::InvalidAudience(audiences.join(", ")).into())
        }
    }

    fn check_lifetime(&self, payload: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
        let expires = numeric_date(payload, "exp")?;
        let not_before = numeric_date(payload, "nbf")?;

        if expires.is_none() && self.parameters.require_expiration_time {
            return Err(Rejection::MissingExpiration.into());
        }

        if let (Some(nbf), Some(exp)) = (not_before, expires) {
            if nbf > exp {
                return Err(Rejection::InvalidLifetime {
                    not_before: rfc3339(nbf),
                    expires: rfc3339(exp),
                }
                .into());
            }
        }

        let now = self.clock.now();
        let skew = self.parameters.clock_skew;

        if let Some(nbf) = not_before {
            if nbf > now + skew {
                return Err(Rejection::NotYetValid {
                    not_before: rfc3339(nbf),
                    now: rfc3339(now),
                }
                .into());
            }
        }

        if let Some(exp) = expires {
            if exp < now - skew {
                return Err(Rejection::Expired {
                    expires: rfc3339(exp),
                    now: rfc3339(now),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Read a NumericDate claim (seconds since the epoch, fractions truncated).
fn numeric_date(
    payload: &serde_json::Map<String, Value>,
    claim: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(value) = payload.get(claim) else {
        return Ok(None);
    };

    let seconds = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
        .ok_or_else(|| {
            ValidationError::Unexpected(format!("The '{}' claim is not a numeric date.", claim))
        })?;

    DateTime::from_timestamp(seconds, 0).map(Some).ok_or_else(|| {
        ValidationError::Unexpected(format!("The '{}' claim is out of range.", claim))
    })
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::StaticKeyResolver;
    use serde_json::json;

    fn validator_at(now: DateTime<Utc>) -> TokenValidator {
        let options = Arc::new(IdpOptions::new("https://idp.example.com", "client"));
        TokenValidator::new(options, Arc::new(StaticKeyResolver::new()))
            .with_clock(Arc::new(FixedClock(now)))
    }

    fn payload(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parameters_from_options() {
        let options = IdpOptions::new("https://idp", "client").with_valid_audiences(["api"]);
        let parameters = ValidationParameters::from_options(&options);
        assert_eq!(parameters.valid_issuers, vec!["https://idp"]);
        assert_eq!(parameters.valid_audiences, vec!["api"]);
        assert_eq!(parameters.clock_skew, Duration::minutes(5));
        assert!(parameters.require_signed_tokens);
    }

    #[test]
    fn test_lifetime_skew_boundaries() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let validator = validator_at(now);
        let t = now.timestamp();

        assert!(validator
            .check_lifetime(&payload(json!({ "exp": t - 300 })))
            .is_ok());
        assert!(validator
            .check_lifetime(&payload(json!({ "exp": t - 301 })))
            .is_err());
        assert!(validator
            .check_lifetime(&payload(json!({ "nbf": t + 300, "exp": t + 600 })))
            .is_ok());
        assert!(validator
            .check_lifetime(&payload(json!({ "nbf": t + 301, "exp": t + 600 })))
            .is_err());
    }

    #[test]
    fn test_lifetime_requires_exp() {
        let validator = validator_at(Utc::now());
        assert_eq!(
            validator.check_lifetime(&payload(json!({}))),
            Err(ValidationError::Rejected(Rejection::MissingExpiration))
        );
    }

    #[test]
    fn test_lifetime_rejects_inverted_window() {
        let now = Utc::now();
        let validator = validator_at(now);
        let t = now.timestamp();
        let result = validator.check_lifetime(&payload(json!({ "nbf": t + 10, "exp": t })));
        assert!(matches!(
            result,
            Err(ValidationError::Rejected(Rejection::InvalidLifetime { .. }))
        ));
    }

    #[test]
    fn test_non_numeric_dates_are_unexpected() {
        let validator = validator_at(Utc::now());
        let result = validator.check_lifetime(&payload(json!({ "exp": "tomorrow" })));
        assert!(matches!(result, Err(ValidationError::Unexpected(_))));
    }

    #[test]
    fn test_fractional_dates_are_truncated() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let validator = validator_at(now);
        let exp = (now.timestamp() - 300) as f64 + 0.75;
        assert!(validator.check_lifetime(&payload(json!({ "exp": exp }))).is_ok());
    }

    #[test]
    fn test_audience_array() {
        let validator = validator_at(Utc::now());
        assert!(validator
            .check_audience(&payload(json!({ "aud": ["other", "client"] })))
            .is_ok());
        assert_eq!(
            validator.check_audience(&payload(json!({ "aud": ["a", "b"] }))),
            Err(ValidationError::Rejected(Rejection::InvalidAudience(
                "a, b".to_string()
            )))
        );
        assert_eq!(
            validator.check_audience(&payload(json!({}))),
            Err(ValidationError::Rejected(Rejection::MissingAudience))
        );
    }

    #[test]
    fn test_issuer_exact_match() {
        let validator = validator_at(Utc::now());
        assert!(validator
            .check_issuer(&payload(json!({ "iss": "https://idp.example.com" })))
            .is_ok());
        assert!(validator
            .check_issuer(&payload(json!({ "iss": "https://idp.example.com/" })))
            .is_err());
        assert_eq!(
            validator.check_issuer(&payload(json!({ "iss": 42 }))),
            Err(ValidationError::Rejected(Rejection::MissingIssuer))
        );
    }
}
