//! Identity-provider options
//!
//! `IdpOptions` describes one identity provider endpoint and the rules used
//! to validate its tokens. Options are built once at startup (from a bound
//! configuration section, the environment, or code) and shared read-only by
//! every validation call.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Name of the configuration section holding the options.
pub const CONFIG_SECTION: &str = "WpIdpAuth";

/// Default scope requested during interactive sign-in.
pub const DEFAULT_SCOPE: &str = "openid profile email";

/// Default OIDC response type.
pub const DEFAULT_RESPONSE_TYPE: &str = "code id_token";

/// Identity-provider options.
///
/// Keys bind in PascalCase (`Authority`, `ClientId`, ...) so that the same
/// configuration section serves every host.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct IdpOptions {
    /// Base issuer endpoint (e.g. `https://login.microsoftonline.com/{tenant}`)
    pub authority: String,

    /// Client (application) ID
    pub client_id: String,

    /// Client secret, required by some flows
    pub client_secret: Option<String>,

    /// Redirect URI after interactive sign-in
    pub redirect_uri: String,

    /// Space-separated scopes
    pub scope: String,

    /// OIDC response type
    pub response_type: String,

    /// Require HTTPS for metadata and key discovery
    pub require_https: bool,

    /// Metadata address override; discovered from the authority when absent
    pub metadata_address: Option<String>,

    /// Accepted audiences; `[client_id]` when empty
    pub valid_audiences: Vec<String>,

    /// Accepted issuers; `[authority]` when empty
    pub valid_issuers: Vec<String>,
}

impl Default for IdpOptions {
    fn default() -> Self {
        Self {
            authority: String::new(),
            client_id: String::new(),
            client_secret: None,
            redirect_uri: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            response_type: DEFAULT_RESPONSE_TYPE.to_string(),
            require_https: true,
            metadata_address: None,
            valid_audiences: Vec::new(),
            valid_issuers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for IdpOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdpOptions")
            .field("authority", &self.authority)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("response_type", &self.response_type)
            .field("require_https", &self.require_https)
            .field("metadata_address", &self.metadata_address)
            .field("valid_audiences", &self.valid_audiences)
            .field("valid_issuers", &self.valid_issuers)
            .finish()
    }
}

impl IdpOptions {
    /// Create options for an authority and client, with defaults for the rest.
    pub fn new(authority: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// Set the client secret.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// Set the requested scopes.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the response type.
    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = response_type.into();
        self
    }

    /// Set whether HTTPS is required for metadata.
    pub fn with_require_https(mut self, require: bool) -> Self {
        self.require_https = require;
        self
    }

    /// Override the metadata address.
    pub fn with_metadata_address(mut self, address: impl Into<String>) -> Self {
        self.metadata_address = Some(address.into());
        self
    }

    /// Replace the accepted audiences.
    pub fn with_valid_audiences<I, S>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_audiences = audiences.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the accepted issuers.
    pub fn with_valid_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    /// Audiences a token may carry.
    pub fn effective_audiences(&self) -> Vec<String> {
        if self.valid_audiences.is_empty() {
            vec![self.client_id.clone()]
        } else {
            self.valid_audiences.clone()
        }
    }

    /// Issuers a token may come from.
    pub fn effective_issuers(&self) -> Vec<String> {
        if self.valid_issuers.is_empty() {
            vec![self.authority.clone()]
        } else {
            self.valid_issuers.clone()
        }
    }

    /// OIDC discovery document address.
    pub fn metadata_url(&self) -> String {
        match self.metadata_address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => format!(
                "{}/.well-known/openid-configuration",
                self.authority.trim_end_matches('/')
            ),
        }
    }

    /// Check the settings every authenticator needs.
    pub fn validate(&self) -> ConfigResult<()> {
        self.require("Authority", &self.authority)?;
        self.require("ClientId", &self.client_id)
    }

    /// Check the settings interactive sign-in additionally needs.
    pub fn validate_for_sign_in(&self) -> ConfigResult<()> {
        self.validate()?;
        self.require("RedirectUri", &self.redirect_uri)
    }

    /// Same as [`validate`](Self::validate), but names keys with their
    /// section prefix (`WpIdpAuth:Authority`).
    pub fn validate_section(&self) -> ConfigResult<()> {
        self.validate().map_err(|err| match err {
            ConfigError::Missing(key) => ConfigError::Missing(format!("{CONFIG_SECTION}:{key}")),
            other => other,
        })
    }

    fn require(&self, key: &str, value: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Missing(key.to_string()));
        }
        Ok(())
    }

    /// Bind the `WpIdpAuth` section of a host configuration tree.
    ///
    /// A missing section yields default options; required settings are
    /// checked separately by [`validate`](Self::validate).
    pub fn from_config(root: &serde_json::Value) -> ConfigResult<Self> {
        match root.get(CONFIG_SECTION) {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(section) => {
                serde_json::from_value(section.clone()).map_err(|e| ConfigError::Binding {
                    section: CONFIG_SECTION.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Load options from environment variables.
    ///
    /// Environment variables (lists are comma-separated):
    /// - `WpIdpAuth__Authority`
    /// - `WpIdpAuth__ClientId`
    /// - `WpIdpAuth__ClientSecret`
    /// - `WpIdpAuth__RedirectUri`
    /// - `WpIdpAuth__Scope` (default: `openid profile email`)
    /// - `WpIdpAuth__ResponseType` (default: `code id_token`)
    /// - `WpIdpAuth__RequireHttps` (default: true)
    /// - `WpIdpAuth__MetadataAddress`
    /// - `WpIdpAuth__ValidAudiences`
    /// - `WpIdpAuth__ValidIssuers`
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load options through an arbitrary `WpIdpAuth__<Key>` lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{CONFIG_SECTION}__{key}"));
        let list = |key: &str| {
            get(key)
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        };
        let default = Self::default();

        let require_https = match get("RequireHttps") {
            None => default.require_https,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: format!("{CONFIG_SECTION}:RequireHttps"),
                        message: format!("'{raw}' is not a boolean"),
                    })
                }
            },
        };

        Ok(Self {
            authority: get("Authority").unwrap_or_default(),
            client_id: get("ClientId").unwrap_or_default(),
            client_secret: get("ClientSecret"),
            redirect_uri: get("RedirectUri").unwrap_or_default(),
            scope: get("Scope").unwrap_or(default.scope),
            response_type: get("ResponseType").unwrap_or(default.response_type),
            require_https,
            metadata_address: get("MetadataAddress"),
            valid_audiences: list("ValidAudiences"),
            valid_issuers: list("ValidIssuers"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let options = IdpOptions::default();
        assert_eq!(options.scope, "openid profile email");
        assert_eq!(options.response_type, "code id_token");
        assert!(options.require_https);
        assert!(options.valid_audiences.is_empty());
        assert!(options.valid_issuers.is_empty());
    }

    #[test]
    fn test_effective_sets_fall_back() {
        let options = IdpOptions::new("https://login.example.com/tenant", "client-a");
        assert_eq!(options.effective_audiences(), vec!["client-a"]);
        assert_eq!(
            options.effective_issuers(),
            vec!["https://login.example.com/tenant"]
        );

        let options = options
            .with_valid_audiences(["api://one", "api://two"])
            .with_valid_issuers(["https://sts.example.com/"]);
        assert_eq!(options.effective_audiences(), vec!["api://one", "api://two"]);
        assert_eq!(options.effective_issuers(), vec!["https://sts.example.com/"]);
    }

    #[test]
    fn test_validate_required_settings() {
        assert_eq!(
            IdpOptions::new("  ", "client").validate(),
            Err(ConfigError::Missing("Authority".to_string()))
        );
        assert_eq!(
            IdpOptions::new("https://idp", "").validate(),
            Err(ConfigError::Missing("ClientId".to_string()))
        );
        assert_eq!(
            IdpOptions::new("https://idp", "").validate_section(),
            Err(ConfigError::Missing("WpIdpAuth:ClientId".to_string()))
        );
        assert!(IdpOptions::new("https://idp", "client").validate().is_ok());
    }

    #[test]
    fn test_validate_for_sign_in_requires_redirect() {
        let options = IdpOptions::new("https://idp", "client");
        assert_eq!(
            options.validate_for_sign_in(),
            Err(ConfigError::Missing("RedirectUri".to_string()))
        );
        assert!(options
            .with_redirect_uri("https://app/signin-oidc")
            .validate_for_sign_in()
            .is_ok());
    }

    #[test]
    fn test_from_config_binds_section() {
        let root = json!({
            "Logging": { "Level": "info" },
            "WpIdpAuth": {
                "Authority": "https://login.example.com/contoso",
                "ClientId": "abc",
                "ClientSecret": "s3cret",
                "RequireHttps": false,
                "ValidAudiences": ["api://abc"]
            }
        });

        let options = IdpOptions::from_config(&root).unwrap();
        assert_eq!(options.authority, "https://login.example.com/contoso");
        assert_eq!(options.client_id, "abc");
        assert_eq!(options.client_secret.as_deref(), Some("s3cret"));
        assert!(!options.require_https);
        assert_eq!(options.valid_audiences, vec!["api://abc"]);
        // untouched keys keep their defaults
        assert_eq!(options.scope, DEFAULT_SCOPE);
        assert_eq!(options.response_type, DEFAULT_RESPONSE_TYPE);
    }

    #[test]
    fn test_from_config_missing_section() {
        let options = IdpOptions::from_config(&json!({})).unwrap();
        assert_eq!(options, IdpOptions::default());
        assert!(options.validate_section().is_err());
    }

    #[test]
    fn test_from_config_type_mismatch() {
        let root = json!({ "WpIdpAuth": { "RequireHttps": "sometimes" } });
        assert!(matches!(
            IdpOptions::from_config(&root),
            Err(ConfigError::Binding { .. })
        ));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("WpIdpAuth__Authority", "https://idp.example.com"),
            ("WpIdpAuth__ClientId", "client"),
            ("WpIdpAuth__RequireHttps", "false"),
            ("WpIdpAuth__ValidIssuers", "https://a, https://b,"),
        ]
        .into_iter()
        .collect();

        let options =
            IdpOptions::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(options.authority, "https://idp.example.com");
        assert!(!options.require_https);
        assert_eq!(options.valid_issuers, vec!["https://a", "https://b"]);
        assert!(options.valid_audiences.is_empty());
        assert_eq!(options.scope, DEFAULT_SCOPE);
    }

    #[test]
    fn test_from_lookup_rejects_bad_bool() {
        let result = IdpOptions::from_lookup(|key| {
            (key == "WpIdpAuth__RequireHttps").then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_metadata_url() {
        let options = IdpOptions::new("https://login.example.com/tenant/", "c");
        assert_eq!(
            options.metadata_url(),
            "https://login.example.com/tenant/.well-known/openid-configuration"
        );
        let options = options.with_metadata_address("https://meta.example.com/oidc.json");
        assert_eq!(options.metadata_url(), "https://meta.example.com/oidc.json");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let options = IdpOptions::new("https://idp", "client").with_client_secret("hunter2");
        let printed = format!("{:?}", options);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("[REDACTED]"));
    }
}
