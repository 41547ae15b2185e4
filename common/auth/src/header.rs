use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::{AuthError, AuthResult};

/// Token validators the guard knows how to dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Bearer,
}

impl TokenType {
    pub const BEARER: &'static str = "bearer";

    fn from_scheme(scheme: &str) -> Option<Self> {
        // Auth schemes are case-insensitive (RFC 7235 section 2.1).
        scheme
            .eq_ignore_ascii_case(Self::BEARER)
            .then_some(TokenType::Bearer)
    }
}

/// Parse `Authorization: <scheme> <credential>` (RFC 6749 section 7.1).
pub fn parse_authorization(headers: &HeaderMap) -> AuthResult<(TokenType, String)> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    if value.is_empty() {
        return Err(AuthError::MissingAuthorization);
    }
    let raw = value
        .to_str()
        .map_err(|_| AuthError::UnsupportedTokenType)?;

    let (scheme, credential) = split_credentials(raw).ok_or(AuthError::UnsupportedTokenType)?;
    let token_type = TokenType::from_scheme(scheme).ok_or(AuthError::UnsupportedTokenType)?;
    Ok((token_type, credential.to_owned()))
}

fn split_credentials(raw: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = raw.trim_start().split_once(char::is_whitespace)?;
    let credential = rest.trim_start();
    if scheme.is_empty() || credential.is_empty() {
        return None;
    }
    Some((scheme, credential))
}
