//! Signing-key resolution
//!
//! The validator never fetches key material itself. It asks an injected
//! [`SigningKeyResolver`] for the verification key matching the token's
//! `kid` and algorithm. [`StaticKeyResolver`] serves keys known at startup;
//! `JwksKeyResolver` (feature `jwks`) serves the issuer's published set.

use crate::error::KeyError;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use std::collections::HashMap;
use std::str::FromStr;

/// Source of verification keys for incoming tokens.
#[async_trait]
pub trait SigningKeyResolver: Send + Sync {
    /// Resolve the key for a token signed with `alg`, optionally identified by `kid`.
    async fn resolve(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey, KeyError>;
}

/// Verification key with the algorithm its publisher declared for it.
#[derive(Clone)]
pub(crate) struct KeyEntry {
    pub(crate) key: DecodingKey,
    /// `None` when the key does not restrict its algorithm
    pub(crate) algorithm: Option<Algorithm>,
}

impl KeyEntry {
    fn any_algorithm(key: DecodingKey) -> Self {
        Self {
            key,
            algorithm: None,
        }
    }

    /// The key, if it may verify a token signed with `alg`.
    pub(crate) fn for_algorithm(&self, kid: &str, alg: Algorithm) -> Result<DecodingKey, KeyError> {
        match self.algorithm {
            Some(declared) if declared != alg => Err(KeyError::AlgorithmMismatch {
                kid: kid.to_string(),
                declared: format!("{:?}", declared),
                requested: format!("{:?}", alg),
            }),
            _ => Ok(self.key.clone()),
        }
    }
}

/// Fixed in-memory key set.
///
/// Tokens with a `kid` are matched by id; tokens without one use the default
/// key, or the only key when the set holds exactly one. Keys loaded from a
/// JWK set with an `alg` only verify tokens signed with that algorithm.
#[derive(Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, KeyEntry>,
    default_key: Option<DecodingKey>,
}

impl std::fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyResolver")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .field("default_key", &self.default_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StaticKeyResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with a single HMAC secret used for every token.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
        Self::new().with_default_key(DecodingKey::from_secret(secret.as_ref()))
    }

    /// Resolver holding every signing key of a JWK set that carries a `kid`.
    pub fn from_jwk_set(set: &JwkSet) -> Result<Self, KeyError> {
        Ok(Self {
            keys: decoding_keys(set)?,
            default_key: None,
        })
    }

    /// Add a key under `kid`.
    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), KeyEntry::any_algorithm(key));
        self
    }

    /// Set the key used for tokens without a `kid`.
    pub fn with_default_key(mut self, key: DecodingKey) -> Self {
        self.default_key = Some(key);
        self
    }

    /// Number of keys addressable by `kid`.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the resolver has no keys at all.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.default_key.is_none()
    }
}

#[async_trait]
impl SigningKeyResolver for StaticKeyResolver {
    async fn resolve(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey, KeyError> {
        match kid {
            Some(kid) => match (self.keys.get(kid), &self.default_key) {
                (Some(entry), _) => entry.for_algorithm(kid, alg),
                (None, Some(key)) => Ok(key.clone()),
                (None, None) => Err(KeyError::KeyNotFound(kid.to_string())),
            },
            None => lookup_without_kid(&self.keys, self.default_key.as_ref(), alg),
        }
    }
}

pub(crate) fn lookup_without_kid(
    keys: &HashMap<String, KeyEntry>,
    default_key: Option<&DecodingKey>,
    alg: Algorithm,
) -> Result<DecodingKey, KeyError> {
    if let Some(key) = default_key {
        return Ok(key.clone());
    }
    let mut entries = keys.iter();
    match (entries.next(), entries.next()) {
        (Some((kid, only)), None) => only.for_algorithm(kid, alg),
        _ => Err(KeyError::NoKeys),
    }
}

/// Convert the signing keys of a JWK set into decoding keys by `kid`.
///
/// Encryption keys, keys declaring a non-signing `alg` and keys without a
/// `kid` are skipped; a key that cannot be converted fails the whole set.
pub(crate) fn decoding_keys(set: &JwkSet) -> Result<HashMap<String, KeyEntry>, KeyError> {
    let mut keys = HashMap::new();
    for jwk in &set.keys {
        if is_encryption_key(jwk) {
            continue;
        }
        let Some(kid) = jwk.common.key_id.clone() else {
            tracing::debug!("Skipping JWK without kid");
            continue;
        };
        let algorithm = match jwk.common.key_algorithm {
            None => None,
            Some(declared) => match signing_algorithm(declared) {
                Some(alg) => Some(alg),
                None => {
                    tracing::debug!(kid = %kid, alg = ?declared, "Skipping JWK with non-signing alg");
                    continue;
                }
            },
        };
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| KeyError::InvalidKey(format!("kid '{}': {}", kid, e)))?;
        keys.insert(kid, KeyEntry { key, algorithm });
    }
    Ok(keys)
}

fn is_encryption_key(jwk: &Jwk) -> bool {
    matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

/// JWS algorithm for a JWK `alg`, `None` for encryption algorithms.
fn signing_algorithm(declared: KeyAlgorithm) -> Option<Algorithm> {
    let name = serde_json::to_value(declared).ok()?;
    Algorithm::from_str(name.as_str()?).ok()
}
