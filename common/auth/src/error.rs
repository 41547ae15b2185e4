use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures visible to callers of the guard.
///
/// Every verification, claim, expiry and revocation problem is reported as
/// [`AuthError::InvalidToken`] so a client cannot tell which check rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing \"Authorization\" in headers")]
    MissingAuthorization,
    #[error("unsupported token type")]
    UnsupportedTokenType,
    #[error("the access token provided is expired, revoked, malformed, or invalid")]
    InvalidToken,
    #[error("the request requires higher privileges than provided by the access token")]
    InsufficientPermission,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthorization
            | AuthError::UnsupportedTokenType
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermission => StatusCode::FORBIDDEN,
        }
    }

    /// RFC 6750 error code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "missing_authorization",
            AuthError::UnsupportedTokenType => "unsupported_token_type",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InsufficientPermission => "insufficient_permission",
        }
    }

    /// Render the error as a response whose challenge names `realm`.
    pub fn into_response_for_realm(self, realm: Option<&str>) -> Response {
        let body = ErrorBody {
            error: self.code(),
            error_description: self.to_string(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.challenge(realm)) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        response
    }

    fn challenge(&self, realm: Option<&str>) -> String {
        let mut challenge = String::from("Bearer");
        let mut params = Vec::new();
        if let Some(realm) = realm {
            params.push(format!("realm=\"{realm}\""));
        }
        // A bare challenge carries no error code (RFC 6750 section 3.1).
        if !matches!(self, AuthError::MissingAuthorization) {
            params.push(format!("error=\"{}\"", self.code()));
            params.push(format!("error_description=\"{self}\""));
        }
        if !params.is_empty() {
            challenge.push(' ');
            challenge.push_str(&params.join(", "));
        }
        challenge
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    error_description: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.into_response_for_realm(None)
    }
}

/// Soft failures inside the token verifier. These are logged and then
/// collapsed into [`AuthError::InvalidToken`]; they never reach callers.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("token carries no readable issuer")]
    MissingIssuer,
    #[error("no verification key resolved for issuer '{0}'")]
    NoKey(String),
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("algorithm {0:?} is not accepted for realm keys")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),
    #[error("failed to parse verification key for issuer '{0}': {1}")]
    KeyParse(String, String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}
