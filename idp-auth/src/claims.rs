//! Claim extraction
//!
//! A validated token payload is flattened into `(claim type, value)` pairs
//! the way identity frameworks expose them: array claims contribute one
//! claim per element, scalars are rendered as text, nested objects as JSON.
//!
//! Identity fields are picked from fixed precedence chains. The chains
//! follow Azure AD naming (`oid`, `tid`) alongside the OIDC standard
//! claims and must not be reordered: downstream consumers rely on them.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Name-identifier claim type (WS-Federation URI form).
pub const NAME_IDENTIFIER: &str =
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";

/// Email claim type (WS-Federation URI form).
pub const EMAIL_ADDRESS: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";

/// Subject precedence.
pub const SUBJECT_CLAIMS: &[&str] = &[NAME_IDENTIFIER, "sub", "oid"];

/// Tenant precedence.
pub const TENANT_CLAIMS: &[&str] = &["tid", "tenant_id"];

/// Email precedence.
pub const EMAIL_CLAIMS: &[&str] = &[EMAIL_ADDRESS, "email", "preferred_username"];

/// Flattened claims of a token, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: Vec<(String, String)>,
}

impl ClaimSet {
    /// Flatten a JSON payload object into claims.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let mut claims = Vec::with_capacity(payload.len());
        for (claim_type, value) in payload {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = render(item) {
                            claims.push((claim_type.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = render(other) {
                        claims.push((claim_type.clone(), text));
                    }
                }
            }
        }
        Self { claims }
    }

    /// First value of `claim_type`, if present.
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(t, _)| t == claim_type)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over all claims.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.claims.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    /// Number of claims, duplicates included.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Whether the set holds no claims.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Collapse into a map; the first value seen for a claim type wins.
    pub fn into_map(self) -> HashMap<String, String> {
        let mut map = HashMap::with_capacity(self.claims.len());
        for (claim_type, value) in self.claims {
            map.entry(claim_type).or_insert(value);
        }
        map
    }
}

/// First claim present among `precedence`.
pub fn first_of(claims: &HashMap<String, String>, precedence: &[&str]) -> Option<String> {
    precedence
        .iter()
        .find_map(|claim_type| claims.get(*claim_type).cloned())
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}
