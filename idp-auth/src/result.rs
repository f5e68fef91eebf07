//! Outcome of a token validation call.

use crate::claims::{self, ClaimSet};
use crate::error::ValidationError;
use serde::Serialize;
use std::collections::HashMap;

/// Result of validating one bearer token.
///
/// Either the identity fields are populated (`is_valid() == true`) or an
/// error message is present, never both. Build one with
/// [`ValidationResult::valid`] or [`ValidationResult::invalid`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    additional_claims: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl ValidationResult {
    /// Build a successful result from the claims of a validated token.
    pub fn valid(claims: ClaimSet) -> Self {
        let map = claims.into_map();
        Self {
            is_valid: true,
            subject: claims::first_of(&map, claims::SUBJECT_CLAIMS),
            tenant_id: claims::first_of(&map, claims::TENANT_CLAIMS),
            email: claims::first_of(&map, claims::EMAIL_CLAIMS),
            additional_claims: map,
            error_message: None,
        }
    }

    /// Build a failed result carrying `message`.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            subject: None,
            tenant_id: None,
            email: None,
            additional_claims: HashMap::new(),
            error_message: Some(message.into()),
        }
    }

    /// Whether the token passed every check.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Subject (user identifier).
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Tenant identifier.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Email address.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Every claim in the token, keyed by claim type.
    pub fn additional_claims(&self) -> &HashMap<String, String> {
        &self.additional_claims
    }

    /// Look up a single claim value.
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.additional_claims.get(claim_type).map(String::as_str)
    }

    /// Error message when validation failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

impl From<ValidationError> for ValidationResult {
    fn from(err: ValidationError) -> Self {
        ValidationResult::invalid(err.to_string())
    }
}
