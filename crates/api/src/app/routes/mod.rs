use axum::{
    routing::{get, post},
    Router,
};

pub mod common;
pub mod dashboard;
pub mod inventory;
pub mod requisitions;
pub mod system;
pub mod vendor;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/requisitions", requisitions::router())
        .route("/stats/overview", get(dashboard::stats_overview))
        .route("/stats/departments", get(dashboard::stats_departments))
        .route("/activity", get(dashboard::activity))
        .route("/departments/pending", get(dashboard::pending_by_department))
        .route("/escalations", get(dashboard::escalations))
        .nest("/inventory", inventory::router())
        .route("/vendor/orders", get(vendor::tracked_orders))
        .route("/vendor/poll", post(vendor::poll))
}
