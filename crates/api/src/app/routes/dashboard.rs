use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    Json,
};
use chrono::Utc;

use reqflow_auth::Permission;
use reqflow_infra::projections::{BoardStats, DepartmentLoad, Escalation, PendingCount};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub async fn stats_overview(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<BoardStats>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    Ok(Json(services.board.stats(principal.read_scope())?))
}

pub async fn stats_departments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<DepartmentLoad>>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    Ok(Json(services.board.by_department(principal.read_scope())?))
}

pub async fn activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ActivityQuery>, QueryRejection>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    let Query(query) = query?;

    let entries = services.board.recent_activity(query.limit, principal.read_scope())?;
    Ok(Json(entries.iter().map(dto::audit_entry_to_json).collect()))
}

pub async fn pending_by_department(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<PendingCount>>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    Ok(Json(services.board.pending_by_department(principal.read_scope())?))
}

pub async fn escalations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<Escalation>>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    Ok(Json(services.escalations(Utc::now(), principal.read_scope())?))
}
