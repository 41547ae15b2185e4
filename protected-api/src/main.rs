use std::env;
use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use common_realm_auth::{GuardConfig, ResourceProtector, RolePermissionMap};
use protected_api::{build_router, AppState};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let guard = build_guard_from_env()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([HeaderValue::from_static(
            "http://localhost:3000",
        )]))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);
    let app = build_router(AppState::new(guard)).layer(cors);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8090);
    let ip: IpAddr = host.parse().context("HOST must be an IP address")?;
    let addr = SocketAddr::from((ip, port));

    info!(%addr, "starting protected-api");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_guard_from_env() -> anyhow::Result<ResourceProtector> {
    let config = GuardConfig::from_env().context("invalid AUTH_* configuration")?;
    if config.disable_auth {
        warn!("AUTH_DISABLE is set; every request authenticates as the static token");
    }
    info!(realms = config.realms.len(), static_issuer = ?config.static_issuer, "configuring resource guard");

    let mut builder = ResourceProtector::builder(config);
    if let Ok(path) = env::var("AUTH_ROLE_PERMISSIONS_FILE") {
        let map = RolePermissionMap::from_json_file(&path)
            .with_context(|| format!("loading role permissions from {path}"))?;
        builder = builder.with_permission_lookup(map);
    }

    builder.build().context("building resource guard")
}
