use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VerificationError;

/// Claims of a bearer token whose signature has been verified.
///
/// Only the verifier constructs these; the raw claim object is kept exactly
/// as it was signed.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub subject: String,
    pub audience: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub token_id: Option<String>,
    /// `None` when the `roles` claim is absent or is not an array of strings.
    pub roles: Option<Vec<String>>,
    raw: Value,
}

impl Token {
    pub fn claims(&self) -> &Value {
        &self.raw
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles
            .as_deref()
            .is_some_and(|roles| roles.iter().any(|value| value == role))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Deserialize)]
struct TokenRepr {
    sub: String,
    aud: AudienceRepr,
    exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<Value> for Token {
    type Error = VerificationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let repr: TokenRepr = serde_json::from_value(value.clone())
            .map_err(|err| VerificationError::InvalidJson(err.to_string()))?;

        let expires_at = Utc
            .timestamp_opt(repr.exp, 0)
            .single()
            .ok_or_else(|| VerificationError::InvalidClaim("exp", repr.exp.to_string()))?;

        // Optional claims are read leniently; an odd shape leaves them unset.
        let issued_at = value
            .get("iat")
            .and_then(Value::as_i64)
            .and_then(|iat| Utc.timestamp_opt(iat, 0).single());
        let issuer = string_claim(&value, "iss");
        let token_id = string_claim(&value, "jti");
        let roles = value.get("roles").and_then(string_list);

        let audience = match repr.aud {
            AudienceRepr::Single(item) => vec![item],
            AudienceRepr::Many(items) => items,
        };

        Ok(Self {
            subject: repr.sub,
            audience,
            expires_at,
            issued_at,
            issuer,
            token_id,
            roles,
            raw: value,
        })
    }
}

fn string_claim(claims: &Value, name: &str) -> Option<String> {
    claims.get(name).and_then(Value::as_str).map(str::to_owned)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_owned))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn builds_from_claims_and_keeps_raw() {
        let exp = Utc::now().timestamp() + 600;
        let raw = json!({
            "sub": "user-1",
            "aud": ["api", "admin"],
            "exp": exp,
            "iss": "https://idp.example/realms/a",
            "roles": ["editor"],
            "custom": { "nested": true }
        });
        let token = Token::try_from(raw.clone()).expect("token");
        assert_eq!(token.subject, "user-1");
        assert_eq!(token.audience, vec!["api", "admin"]);
        assert_eq!(token.expires_at.timestamp(), exp);
        assert!(token.has_role("editor"));
        assert_eq!(token.claims(), &raw);
        assert_eq!(token.claim("custom"), Some(&json!({ "nested": true })));
    }

    #[test]
    fn missing_roles_is_distinct_from_empty() {
        let exp = Utc::now().timestamp() + 600;
        let token = Token::try_from(json!({ "sub": "u", "aud": "api", "exp": exp })).expect("token");
        assert!(token.roles.is_none());
        let token = Token::try_from(json!({ "sub": "u", "aud": "api", "exp": exp, "roles": [] }))
            .expect("token");
        assert_eq!(token.roles, Some(Vec::new()));
    }

    #[test]
    fn odd_optional_claims_are_left_unset() {
        let exp = Utc::now().timestamp() + 600;
        let raw = json!({
            "sub": "u",
            "aud": "api",
            "exp": exp,
            "iat": "yesterday",
            "iss": 7,
            "jti": 12345,
            "roles": "admin"
        });
        let token = Token::try_from(raw.clone()).expect("token");
        assert!(token.issued_at.is_none());
        assert!(token.issuer.is_none());
        assert!(token.token_id.is_none());
        assert!(token.roles.is_none());
        assert_eq!(token.claims(), &raw);

        let token = Token::try_from(json!({ "sub": "u", "aud": "api", "exp": exp, "roles": ["a", 1] }))
            .expect("token");
        assert!(token.roles.is_none());
    }

    #[test]
    fn mandatory_claims_are_required() {
        let exp = Utc::now().timestamp() + 600;
        for raw in [
            json!({ "aud": "api", "exp": exp }),
            json!({ "sub": "u", "exp": exp }),
            json!({ "sub": "u", "aud": "api" }),
        ] {
            let err = Token::try_from(raw).expect_err("should fail");
            assert!(matches!(err, VerificationError::InvalidJson(_)));
        }
    }

    #[test]
    fn expiry_is_strict() {
        let now = Utc::now();
        let token = Token::try_from(json!({ "sub": "u", "aud": "api", "exp": now.timestamp() }))
            .expect("token");
        assert!(token.is_expired_at(now + Duration::seconds(1)));
        assert!(!token.is_expired_at(now - Duration::seconds(1)));
    }
}
