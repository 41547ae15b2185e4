use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use common_realm_auth::{
    require_token, AuthorizationRequest, CurrentToken, Protection, ResourceProtector,
};
use serde_json::{json, Value};

pub const ORDERS_READ: &str = "orders:read";
pub const ORDERS_REFUND: &str = "orders:refund";

#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<ResourceProtector>,
}

impl AppState {
    pub fn new(guard: ResourceProtector) -> Self {
        Self {
            guard: Arc::new(guard),
        }
    }

    fn protection(&self) -> Protection {
        Protection::new(self.guard.clone())
    }
}

pub fn build_router(state: AppState) -> Router {
    let authenticated = from_fn_with_state(state.protection(), require_token);
    let can_read = from_fn_with_state(state.protection().require(ORDERS_READ), require_token);
    let anyone = from_fn_with_state(state.protection().optional(), require_token);

    Router::new()
        .route("/healthz", get(health))
        .route("/me", get(me).route_layer(authenticated))
        .route("/orders", get(list_orders).route_layer(can_read))
        .route("/orders/:order_id/refund", post(refund_order))
        .route("/catalog", get(catalog).route_layer(anyone))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn me(token: CurrentToken) -> Json<Value> {
    Json(token.claims().clone())
}

async fn list_orders(token: CurrentToken) -> Json<Value> {
    Json(json!({ "owner": token.subject, "orders": [] }))
}

async fn catalog(token: Option<CurrentToken>) -> Json<Value> {
    let viewer = token.map(|token| token.subject.clone());
    Json(json!({ "viewer": viewer, "items": ["espresso", "flat white"] }))
}

/// Checks the refund permission in the handler instead of a route layer.
async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, Response> {
    let request = AuthorizationRequest::new(method, uri.to_string(), body, headers);
    state
        .guard
        .acquire(&request, ORDERS_REFUND, |token| async move {
            tracing::info!(order_id = %order_id, subject = %token.subject, "refund approved");
            Ok(Json(json!({ "order_id": order_id, "refunded_by": token.subject })))
        })
        .await
}
