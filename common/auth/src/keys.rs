use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey};

use crate::error::VerificationError;

const PEM_LINE_WIDTH: usize = 64;

/// Public-key families a realm key may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

fn family(algorithm: Algorithm) -> Option<KeyFamily> {
    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Some(KeyFamily::Rsa),
        Algorithm::ES256 | Algorithm::ES384 => Some(KeyFamily::Ec),
        Algorithm::EdDSA => Some(KeyFamily::Ed),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
    }
}

/// Build a decoding key from opaque realm key material.
///
/// Accepts a PEM document, a bare base64 `SubjectPublicKeyInfo` (the form
/// realm endpoints usually serve under `public_key`), or a JWK object.
/// Symmetric algorithms are refused: realm keys are public.
pub fn decoding_key(
    issuer: &str,
    material: &str,
    algorithm: Algorithm,
) -> Result<DecodingKey, VerificationError> {
    let family = family(algorithm).ok_or(VerificationError::UnsupportedAlgorithm(algorithm))?;
    let material = material.trim();
    if material.is_empty() {
        return Err(VerificationError::NoKey(issuer.to_owned()));
    }
    let key_err = |err: jsonwebtoken::errors::Error| {
        VerificationError::KeyParse(issuer.to_owned(), err.to_string())
    };

    if material.starts_with('{') {
        let jwk: Jwk = serde_json::from_str(material)
            .map_err(|err| VerificationError::KeyParse(issuer.to_owned(), err.to_string()))?;
        return DecodingKey::from_jwk(&jwk).map_err(key_err);
    }

    let pem = if material.starts_with("-----BEGIN") {
        material.to_owned()
    } else {
        wrap_public_key_pem(material)
    };
    match family {
        KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem.as_bytes()),
        KeyFamily::Ec => DecodingKey::from_ec_pem(pem.as_bytes()),
        KeyFamily::Ed => DecodingKey::from_ed_pem(pem.as_bytes()),
    }
    .map_err(key_err)
}

fn wrap_public_key_pem(base64_der: &str) -> String {
    let compact: String = base64_der.split_whitespace().collect();
    let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
    for line in compact.as_bytes().chunks(PEM_LINE_WIDTH) {
        // chunks of an ASCII string stay on char boundaries
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END PUBLIC KEY-----\n");
    pem
}
