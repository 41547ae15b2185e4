use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::Value;

/// Read the `iss` claim from a compact JWT without verifying anything.
///
/// The result only selects which key to verify with; it is never a trust
/// decision. Malformed input of any kind yields `None`.
pub fn unverified_issuer(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE.decode(pad(payload)).ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    match claims.get("iss")? {
        Value::String(issuer) if !issuer.is_empty() => Some(issuer.clone()),
        _ => None,
    }
}

fn pad(segment: &str) -> String {
    let segment = segment.trim_end_matches('=');
    let missing = (4 - segment.len() % 4) % 4;
    let mut padded = String::with_capacity(segment.len() + missing);
    padded.push_str(segment);
    padded.extend(std::iter::repeat('=').take(missing));
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_with(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn reads_issuer_from_unpadded_payload() {
        let token = token_with(&serde_json::json!({ "iss": "https://idp.example/realms/a", "sub": "u" }));
        assert_eq!(
            unverified_issuer(&token).as_deref(),
            Some("https://idp.example/realms/a")
        );
    }

    #[test]
    fn missing_issuer_is_none() {
        let token = token_with(&serde_json::json!({ "sub": "u" }));
        assert!(unverified_issuer(&token).is_none());
        let token = token_with(&serde_json::json!({ "iss": "" }));
        assert!(unverified_issuer(&token).is_none());
        let token = token_with(&serde_json::json!({ "iss": 42 }));
        assert!(unverified_issuer(&token).is_none());
    }

    #[test]
    fn malformed_tokens_are_none() {
        assert!(unverified_issuer("").is_none());
        assert!(unverified_issuer("no-dots-here").is_none());
        assert!(unverified_issuer("a.!!!not-base64!!!.c").is_none());
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(unverified_issuer(&not_json).is_none());
        let not_object = format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(unverified_issuer(&not_object).is_none());
    }

    #[test]
    fn padding_rounds_up_to_multiple_of_four() {
        assert_eq!(pad("ab"), "ab==");
        assert_eq!(pad("abc"), "abc=");
        assert_eq!(pad("abcd"), "abcd");
        assert_eq!(pad("ab=="), "ab==");
    }
}
