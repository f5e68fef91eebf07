//! Authorization endpoint URL construction.

use crate::options::IdpOptions;

/// Authorization endpoint path appended to the authority.
pub const AUTHORIZE_PATH: &str = "/oauth2/v2.0/authorize";

/// Build the URL that starts an interactive sign-in.
///
/// Query parameters are emitted in a fixed order (`client_id`,
/// `redirect_uri`, `response_type`, `scope`, `response_mode=form_post`);
/// identity providers configured for this shape compare it literally.
/// Values are percent-encoded, leaving only `A-Z a-z 0-9 - . _ ~` as is.
pub fn authorize_url(options: &IdpOptions) -> String {
    let base = options.authority.trim_end_matches('/');
    let params = [
        ("client_id", options.client_id.as_str()),
        ("redirect_uri", options.redirect_uri.as_str()),
        ("response_type", options.response_type.as_str()),
        ("scope", options.scope.as_str()),
    ];

    let mut query: Vec<String> = params
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect();
    query.push("response_mode=form_post".to_string());

    format!("{}{}?{}", base, AUTHORIZE_PATH, query.join("&"))
}
