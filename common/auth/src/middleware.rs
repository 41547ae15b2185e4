use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AuthError;
use crate::guard::{with_current_token, ResourceProtector};
use crate::permissions::PermissionSet;
use crate::request::AuthorizationRequest;
use crate::token::Token;

/// Per-route guard policy for [`require_token`].
///
/// ```ignore
/// let route = get(handler).layer(axum::middleware::from_fn_with_state(
///     Protection::new(guard.clone()).require("reports:read"),
///     require_token,
/// ));
/// ```
#[derive(Clone)]
pub struct Protection {
    guard: Arc<ResourceProtector>,
    permissions: PermissionSet,
    optional: bool,
}

impl Protection {
    pub fn new(guard: Arc<ResourceProtector>) -> Self {
        Self {
            guard,
            permissions: PermissionSet::none(),
            optional: false,
        }
    }

    pub fn require(mut self, permissions: impl Into<PermissionSet>) -> Self {
        self.permissions = permissions.into();
        self
    }

    /// Let requests without an `Authorization` header through anonymously.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Middleware running the guard before the inner handler. On success the
/// token is stored in the request's extensions as [`CurrentToken`].
pub async fn require_token(
    State(protection): State<Protection>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let snapshot = AuthorizationRequest::from_parts(&parts);
    let token = match protection
        .guard
        .authorize(&snapshot, protection.permissions.clone(), protection.optional)
        .await
    {
        Ok(token) => token,
        Err(err) => return protection.guard.error_response(err),
    };

    if let Some(token) = &token {
        parts.extensions.insert(CurrentToken(token.clone()));
    }
    let request = Request::from_parts(parts, body);
    with_current_token(token, next.run(request)).await
}

/// Extracts the token stored by [`require_token`]. Use `Option<CurrentToken>`
/// on optionally protected routes.
#[derive(Debug, Clone)]
pub struct CurrentToken(pub Token);

impl CurrentToken {
    pub fn into_inner(self) -> Token {
        self.0
    }
}

impl std::ops::Deref for CurrentToken {
    type Target = Token;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentToken>()
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
