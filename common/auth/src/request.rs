use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};

/// Read-only snapshot of the parts of an incoming request the guard needs.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    method: Method,
    path: String,
    body: Bytes,
    headers: HeaderMap,
}

impl AuthorizationRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        body: impl Into<Bytes>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            body: body.into(),
            headers,
        }
    }

    /// Snapshot request head parts. The body is not captured.
    pub fn from_parts(parts: &Parts) -> Self {
        let path = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str().to_owned())
            .unwrap_or_else(|| parts.uri.path().to_owned());
        Self::new(parts.method.clone(), path, Bytes::new(), parts.headers.clone())
    }

    /// Bare request carrying only headers, for non-HTTP callers and tests.
    pub fn from_headers(headers: HeaderMap) -> Self {
        Self::new(Method::GET, "/", Bytes::new(), headers)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
