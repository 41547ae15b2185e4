use std::future::Future;
use std::sync::Arc;

use axum::response::Response;
use tracing::info;

use crate::config::{ConfigError, GuardConfig};
use crate::error::{AuthError, AuthResult};
use crate::header::parse_authorization;
use crate::permissions::{has_permissions, NoPermissions, PermissionLookup, PermissionSet};
use crate::realm::{HttpRealmFetcher, RealmFetcher, RealmKeyResolver};
use crate::request::AuthorizationRequest;
use crate::revocation::{NeverRevoked, RevocationCheck};
use crate::token::Token;
use crate::verifier::TokenVerifier;

tokio::task_local! {
    static CURRENT_TOKEN: Option<Token>;
}

/// Token of the request currently running inside [`ResourceProtector::protect`]
/// or the `require_token` middleware. `None` outside such a scope, or when an
/// optional guard let an anonymous request through.
pub fn current_token() -> Option<Token> {
    CURRENT_TOKEN.try_with(Clone::clone).ok().flatten()
}

pub(crate) async fn with_current_token<F: Future>(token: Option<Token>, future: F) -> F::Output {
    CURRENT_TOKEN.scope(token, future).await
}

/// Guards request handlers with bearer-token authentication and
/// role-derived permissions.
#[derive(Clone)]
pub struct ResourceProtector {
    verifier: TokenVerifier,
    permissions: Arc<dyn PermissionLookup>,
    revocation: Arc<dyn RevocationCheck>,
}

impl ResourceProtector {
    pub fn builder(config: GuardConfig) -> ResourceProtectorBuilder {
        ResourceProtectorBuilder::new(config)
    }

    pub fn config(&self) -> &GuardConfig {
        self.verifier.config()
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Parse, authenticate and authorize `request`.
    pub async fn validate_request(
        &self,
        request: &AuthorizationRequest,
        permissions: &PermissionSet,
    ) -> AuthResult<Token> {
        let (_token_type, token_string) = parse_authorization(request.headers())?;
        let token = self.verifier.authenticate(&token_string).await;
        self.validate_token(token, permissions).await
    }

    /// Ordered state checks; the first failure wins.
    pub async fn validate_token(
        &self,
        token: Option<Token>,
        permissions: &PermissionSet,
    ) -> AuthResult<Token> {
        let token = token.ok_or(AuthError::InvalidToken)?;
        if token.is_expired() {
            return Err(AuthError::InvalidToken);
        }
        if self.revocation.is_revoked(&token).await {
            return Err(AuthError::InvalidToken);
        }
        if !has_permissions(&token, permissions, self.permissions.as_ref()) {
            return Err(AuthError::InsufficientPermission);
        }
        Ok(token)
    }

    /// Direct call: the validated token, or the structured failure.
    pub async fn acquire_token(
        &self,
        request: &AuthorizationRequest,
        permissions: impl Into<PermissionSet>,
    ) -> AuthResult<Token> {
        let token = self.validate_request(request, &permissions.into()).await?;
        info!(
            subject = %token.subject,
            issuer = token.issuer.as_deref().unwrap_or_default(),
            "token authenticated"
        );
        Ok(token)
    }

    /// Scoped acquisition: run `scope` with the validated token. Guard
    /// failures, and any [`AuthError`] the scope returns, come back as a
    /// ready-to-send error response.
    pub async fn acquire<F, Fut, T>(
        &self,
        request: &AuthorizationRequest,
        permissions: impl Into<PermissionSet>,
        scope: F,
    ) -> Result<T, Response>
    where
        F: FnOnce(Token) -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        let token = self
            .acquire_token(request, permissions)
            .await
            .map_err(|err| self.error_response(err))?;
        scope(token).await.map_err(|err| self.error_response(err))
    }

    /// Guard wrapper: run `operation` only once the request is authorized.
    ///
    /// With `optional`, a request without any `Authorization` header still
    /// runs the operation, anonymously; every other failure blocks it. The
    /// token is visible to the operation through [`current_token`].
    pub async fn protect<F, Fut, T>(
        &self,
        request: &AuthorizationRequest,
        permissions: impl Into<PermissionSet>,
        optional: bool,
        operation: F,
    ) -> Result<T, Response>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self
            .authorize(request, permissions, optional)
            .await
            .map_err(|err| self.error_response(err))?;
        Ok(with_current_token(token, operation()).await)
    }

    pub(crate) async fn authorize(
        &self,
        request: &AuthorizationRequest,
        permissions: impl Into<PermissionSet>,
        optional: bool,
    ) -> AuthResult<Option<Token>> {
        match self.acquire_token(request, permissions).await {
            Ok(token) => Ok(Some(token)),
            Err(AuthError::MissingAuthorization) if optional => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn error_response(&self, err: AuthError) -> Response {
        err.into_response_for_realm(self.config().realm_name.as_deref())
    }
}

pub struct ResourceProtectorBuilder {
    config: GuardConfig,
    fetcher: Option<Arc<dyn RealmFetcher>>,
    permissions: Arc<dyn PermissionLookup>,
    revocation: Arc<dyn RevocationCheck>,
}

impl ResourceProtectorBuilder {
    fn new(config: GuardConfig) -> Self {
        Self {
            config,
            fetcher: None,
            permissions: Arc::new(NoPermissions),
            revocation: Arc::new(NeverRevoked),
        }
    }

    pub fn with_realm_fetcher(mut self, fetcher: impl RealmFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn with_permission_lookup(mut self, lookup: impl PermissionLookup + 'static) -> Self {
        self.permissions = Arc::new(lookup);
        self
    }

    pub fn with_revocation_check(mut self, check: impl RevocationCheck + 'static) -> Self {
        self.revocation = Arc::new(check);
        self
    }

    pub fn build(self) -> Result<ResourceProtector, ConfigError> {
        let fetcher: Arc<dyn RealmFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpRealmFetcher::from_config(&self.config)?),
        };
        let resolver = RealmKeyResolver::new(&self.config, fetcher);
        let verifier = TokenVerifier::new(Arc::new(self.config), resolver);
        Ok(ResourceProtector {
            verifier,
            permissions: self.permissions,
            revocation: self.revocation,
        })
    }
}
