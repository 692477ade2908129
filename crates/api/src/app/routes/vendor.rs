use std::sync::Arc;

use axum::{extract::Extension, Json};

use reqflow_auth::Permission;
use reqflow_infra::vendor::{PollReport, TrackedOrder};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

const VENDOR_OPS: [Permission; 2] = [Permission::VENDOR_ORDER, Permission::VENDOR_CONFIRM];

/// Run one poll cycle now instead of waiting for the background poller.
pub async fn poll(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<PollReport>, ApiError> {
    authz::require(&principal, &Permission::VENDOR_CONFIRM)?;
    Ok(Json(services.coordinator.poll_once().await))
}

pub async fn tracked_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<TrackedOrder>>, ApiError> {
    authz::require_any(&principal, &VENDOR_OPS)?;
    Ok(Json(services.coordinator.tracked_orders()))
}
