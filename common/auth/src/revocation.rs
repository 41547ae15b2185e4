use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::token::Token;

/// Answers whether an otherwise valid token has been revoked.
#[async_trait]
pub trait RevocationCheck: Send + Sync {
    async fn is_revoked(&self, token: &Token) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRevoked;

#[async_trait]
impl RevocationCheck for NeverRevoked {
    async fn is_revoked(&self, _token: &Token) -> bool {
        false
    }
}

/// In-process denylist keyed by `jti`. Tokens without `jti` are never matched.
#[derive(Debug, Clone, Default)]
pub struct RevokedTokenIds {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl RevokedTokenIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, token_id: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(token_id.into());
    }

    pub fn contains(&self, token_id: &str) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.contains(token_id)
    }
}

#[async_trait]
impl RevocationCheck for RevokedTokenIds {
    async fn is_revoked(&self, token: &Token) -> bool {
        token
            .token_id
            .as_deref()
            .is_some_and(|token_id| self.contains(token_id))
    }
}
