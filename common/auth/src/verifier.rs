use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::GuardConfig;
use crate::error::VerificationError;
use crate::issuer::unverified_issuer;
use crate::keys::decoding_key;
use crate::realm::RealmKeyResolver;
use crate::token::Token;

const REQUIRED_CLAIMS: [&str; 3] = ["exp", "aud", "sub"];

/// Authenticates bearer token strings against per-issuer realm keys.
#[derive(Clone)]
pub struct TokenVerifier {
    config: Arc<GuardConfig>,
    resolver: RealmKeyResolver,
}

impl TokenVerifier {
    pub fn new(config: Arc<GuardConfig>, resolver: RealmKeyResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn resolver(&self) -> &RealmKeyResolver {
        &self.resolver
    }

    /// Verify `presented` and build its [`Token`].
    ///
    /// Never errors: every failure is logged and reported as `None`, leaving
    /// the caller to choose the error it surfaces.
    pub async fn authenticate(&self, presented: &str) -> Option<Token> {
        let token = self.effective_token(presented);
        match self.verify(token).await {
            Ok(token) => Some(token),
            Err(err) => {
                info!(error = %err, "authenticate token failed");
                None
            }
        }
    }

    /// Apply the static-token override to the presented credential.
    fn effective_token<'a>(&'a self, presented: &'a str) -> &'a str {
        match self.config.static_token.as_deref() {
            Some(static_token) if self.config.disable_auth => static_token,
            Some(static_token) if presented != static_token => "",
            _ => presented,
        }
    }

    async fn verify(&self, token: &str) -> Result<Token, VerificationError> {
        let issuer = unverified_issuer(token).ok_or(VerificationError::MissingIssuer)?;
        let material = self
            .resolver
            .resolve(&issuer)
            .await
            .ok_or_else(|| VerificationError::NoKey(issuer.clone()))?;

        let header =
            decode_header(token).map_err(|err| VerificationError::InvalidHeader(err.to_string()))?;
        let key = decoding_key(&issuer, &material, header.alg)?;

        let mut validation = Validation::new(header.alg);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);
        validation.set_issuer(&[issuer.as_str()]);
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &key, &validation)?;
        let token = Token::try_from(token_data.claims)?;
        debug!(issuer = %issuer, subject = %token.subject, "verified token successfully");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::{RealmFetchError, RealmFetcher};
    use async_trait::async_trait;

    struct NoRealms;

    #[async_trait]
    impl RealmFetcher for NoRealms {
        async fn fetch_json(&self, _url: &str) -> Result<Value, RealmFetchError> {
            Err(RealmFetchError::Status(404))
        }
    }

    fn verifier(config: GuardConfig) -> TokenVerifier {
        let resolver = RealmKeyResolver::new(&config, Arc::new(NoRealms));
        TokenVerifier::new(Arc::new(config), resolver)
    }

    #[test]
    fn override_substitutes_when_auth_disabled() {
        let verifier = verifier(GuardConfig::new().with_static_token("T").with_disable_auth(true));
        assert_eq!(verifier.effective_token("anything"), "T");
        assert_eq!(verifier.effective_token(""), "T");
    }

    #[test]
    fn override_blanks_mismatched_tokens() {
        let verifier = verifier(GuardConfig::new().with_static_token("T"));
        assert_eq!(verifier.effective_token("T"), "T");
        assert_eq!(verifier.effective_token("other"), "");
    }

    #[test]
    fn no_override_passes_through() {
        let verifier = verifier(GuardConfig::new().with_disable_auth(true));
        assert_eq!(verifier.effective_token("abc"), "abc");
    }

    #[tokio::test]
    async fn garbage_tokens_are_soft_failures() {
        let verifier = verifier(GuardConfig::new());
        assert!(verifier.authenticate("").await.is_none());
        assert!(verifier.authenticate("not.a.jwt").await.is_none());
    }
}
