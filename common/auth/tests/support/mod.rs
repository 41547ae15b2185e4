#![allow(dead_code)]

use std::sync::OnceLock;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use common_realm_auth::AuthorizationRequest;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::EncodePublicKey;
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const ISSUER: &str = "https://idp.example/realms/main";
pub const AUDIENCE: &str = "orders-api";

pub struct KeyMaterial {
    pub encoding: EncodingKey,
    pub public_pem: String,
    /// Bare base64 `SubjectPublicKeyInfo`, as realm endpoints serve it.
    pub public_der_b64: String,
}

fn generate_key_material() -> KeyMaterial {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .expect("public pem");
    let public_der = public_key.to_public_key_der().expect("public der");

    KeyMaterial {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        public_pem,
        public_der_b64: STANDARD.encode(public_der.as_bytes()),
    }
}

pub fn signing_key() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(generate_key_material)
}

pub fn foreign_key() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(generate_key_material)
}

/// Mandatory claims for `issuer`, valid for ten minutes.
pub fn claims(issuer: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "iss": issuer,
        "sub": "user-42",
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
    })
}

pub fn sign(key: &KeyMaterial, claims: &Value) -> String {
    encode(&Header::new(Algorithm::RS256), claims, &key.encoding).expect("sign token")
}

pub fn mint(claims: &Value) -> String {
    sign(signing_key(), claims)
}

pub fn with_authorization(value: &str) -> AuthorizationRequest {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(value).expect("header value"),
    );
    AuthorizationRequest::from_headers(headers)
}

pub fn bearer(token: &str) -> AuthorizationRequest {
    with_authorization(&format!("Bearer {token}"))
}
