use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use reqflow_auth::Permission;

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items))
        .route("/alerts", get(stock_alerts))
        .route("/items", post(register_item))
        .route("/items/:name", get(get_item))
        .route("/items/:name/receive", post(receive_stock))
        .route("/items/:name/movements", get(get_movements))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    authz::require(&principal, &Permission::INVENTORY_READ)?;
    let records = services.ledger().records()?;
    Ok(Json(records.iter().map(dto::inventory_to_json).collect()))
}

/// Items at or below their reorder threshold.
pub async fn stock_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    authz::require(&principal, &Permission::INVENTORY_READ)?;
    let records = services.ledger().low_stock()?;
    Ok(Json(records.iter().map(dto::inventory_to_json).collect()))
}

pub async fn register_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::RegisterItemRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    authz::require(&principal, &Permission::INVENTORY_WRITE)?;
    let Json(body) = body?;

    let department = body
        .department
        .unwrap_or_else(|| principal.department().clone());
    let record = services.ledger().register_item(
        &body.item_name,
        department,
        body.initial_quantity,
        body.minimum_quantity,
    )?;

    tracing::info!(item = %record.item_name, quantity = record.quantity_available, "inventory item registered");
    Ok((StatusCode::CREATED, Json(dto::inventory_to_json(&record))).into_response())
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authz::require(&principal, &Permission::INVENTORY_READ)?;
    match services.ledger().record(&name)? {
        Some(record) => Ok(Json(dto::inventory_to_json(&record))),
        None => Err(ApiError::NotFound(format!("item '{name}' not found"))),
    }
}

/// Warehouse stock-in.
pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
    body: Result<Json<dto::ReceiveStockRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authz::require(&principal, &Permission::INVENTORY_WRITE)?;
    let Json(body) = body?;

    let record = services
        .ledger()
        .receive(&name, body.quantity, body.source, None)?;
    Ok(Json(dto::inventory_to_json(&record)))
}

pub async fn get_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(name): Path<String>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    authz::require(&principal, &Permission::INVENTORY_READ)?;
    let movements = services.ledger().movements(&name)?;
    Ok(Json(movements.iter().map(dto::movement_to_json).collect()))
}
