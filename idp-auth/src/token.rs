//! Compact JWS parsing
//!
//! Splits `header.payload.signature`, decodes the base64url segments and
//! parses the JSON header and payload. Nothing here is trusted: the parsed
//! token still has to pass signature and claim checks.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Map, Value};

/// JOSE header fields the validator needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm as written in the token
    pub alg: String,
    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type
    #[serde(default)]
    pub typ: Option<String>,
}

/// A structurally valid, not yet verified, compact token.
#[derive(Debug, Clone)]
pub struct CompactToken<'a> {
    header: TokenHeader,
    payload: Map<String, Value>,
    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> CompactToken<'a> {
    /// Parse compact serialization. Returns `None` when the text is not a
    /// three-segment base64url JWS with JSON header and JSON object payload.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim();
        let (signing_input, signature) = text.rsplit_once('.')?;
        let (header_b64, payload_b64) = signing_input.split_once('.')?;
        if payload_b64.contains('.') {
            return None;
        }

        let header: TokenHeader = serde_json::from_slice(&decode_segment(header_b64)?).ok()?;
        let payload = match serde_json::from_slice(&decode_segment(payload_b64)?).ok()? {
            Value::Object(map) => map,
            _ => return None,
        };
        if !signature.is_empty() {
            decode_segment(signature)?;
        }

        Some(Self {
            header,
            payload,
            signing_input,
            signature,
        })
    }

    /// Decoded header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Decoded payload claims.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// `header.payload` as it appeared on the wire.
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// Base64url signature segment (empty for unsigned tokens).
    pub fn signature(&self) -> &'a str {
        self.signature
    }

    /// Whether the token claims to be unsigned.
    pub fn is_unsigned(&self) -> bool {
        self.signature.is_empty() || self.header.alg.eq_ignore_ascii_case("none")
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if segment.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(segment).ok()
}
