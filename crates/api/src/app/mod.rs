//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: engine, ledger, bus, board and vendor coordinator wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: `{kind, message}` error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use reqflow_infra::config::EngineConfig;
use reqflow_infra::vendor::{SimulatedVendorGateway, VendorGateway};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::StartupError;

/// Build the full HTTP router (public entrypoint used by `main.rs`), backed by
/// the simulated vendor gateway.
pub async fn build_app(config: EngineConfig) -> Result<Router, StartupError> {
    build_app_with(config, Arc::new(SimulatedVendorGateway::new())).await
}

/// Same router with a caller-supplied vendor gateway.
pub async fn build_app_with(
    config: EngineConfig,
    gateway: Arc<dyn VendorGateway>,
) -> Result<Router, StartupError> {
    let jwt = Arc::new(reqflow_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(config, gateway)?);

    // Protected routes: require a verified principal.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new()))
}
