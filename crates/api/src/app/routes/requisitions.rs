use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use reqflow_auth::{AuthzError, Permission};
use reqflow_core::ExpectedVersion;
use reqflow_infra::projections::{Page, PageRequest, RequisitionSummary};
use reqflow_infra::workflow::{Action, RequisitionDraft, TransitionOutcome};

use crate::app::dto;
use crate::app::errors::ApiError;
use crate::app::routes::common::{ensure_claimed_actor, ensure_visible, parse_requisition_id};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_requisitions).post(create_requisition))
        .route("/:id", get(get_requisition))
        .route("/:id/history", get(get_history))
        .route("/:id/transitions", post(transition))
}

/// Create and submit in one call. Routing into the approval queue follows
/// asynchronously, so the response truthfully reports `submitted`.
pub async fn create_requisition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateRequisitionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    ensure_claimed_actor(&principal, body.requester)?;

    let actor = principal.actor();
    let submit_key = body.idempotency_key.as_ref().map(|k| format!("{k}:submit"));
    let draft = RequisitionDraft {
        department: body.department,
        items: body.items,
        priority: body.priority.unwrap_or_default(),
    };

    let created = services.engine.create(&actor, draft, body.idempotency_key)?;
    let submitted = services.engine.apply(
        created.id,
        &actor,
        Action::Submit,
        ExpectedVersion::Exact(created.version),
        submit_key,
    )?;

    Ok((StatusCode::CREATED, Json(submitted)).into_response())
}

pub async fn transition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let id = parse_requisition_id(&id)?;
    let Json(body) = body?;
    ensure_claimed_actor(&principal, body.actor)?;

    let action = Action::from_parts(&body.action, body.payload)?;
    let expected = ExpectedVersion::from(body.expected_version);

    let outcome = services.engine.apply(
        id,
        &principal.actor(),
        action,
        expected,
        body.idempotency_key,
    )?;
    Ok(Json(outcome))
}

pub async fn get_requisition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    let id = parse_requisition_id(&id)?;

    let (req, history) = services.engine.requisition_with_history(id)?;
    ensure_visible(&principal, id, req.department())?;
    Ok(Json(dto::requisition_to_json(&req, &history)))
}

pub async fn get_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    let id = parse_requisition_id(&id)?;

    let req = services.engine.requisition(id)?;
    ensure_visible(&principal, id, req.department())?;
    let history = services.engine.history(id)?;
    Ok(Json(history.iter().map(dto::audit_entry_to_json).collect()))
}

/// Board-backed list: lags the engine by bus latency.
pub async fn list_requisitions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListQuery>, QueryRejection>,
) -> Result<Json<Page<RequisitionSummary>>, ApiError> {
    authz::require(&principal, &Permission::REQUISITIONS_READ)?;
    let Query(query) = query?;

    let mut filter = query.filter()?;
    if let Some(own) = principal.read_scope() {
        match &filter.department {
            Some(asked) if asked != own => {
                return Err(AuthzError::denied(format!(
                    "cannot list requisitions of {asked} from {own}"
                ))
                .into());
            }
            _ => filter.department = Some(own.clone()),
        }
    }
    let page = PageRequest::new(query.page, query.per_page)?;
    Ok(Json(services.board.list(&filter, page)?))
}
