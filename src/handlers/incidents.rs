use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::rejected;
use crate::{
    auth::{AuthUser, Capabilities},
    entities::incident::{self, IncidentType},
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct IncidentRequest {
    pub kind: IncidentType,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncidentResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    pub kind: IncidentType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl From<incident::Model> for IncidentResponse {
    fn from(model: incident::Model) -> Self {
        Self {
            id: model.id,
            item_id: model.item_id,
            kind: model.kind,
            description: model.description,
            timestamp: model.timestamp,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/incidents",
    summary = "Record incident",
    description = "Records damage or a write-off; the item moves to DAMAGED or WRITTEN_OFF",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = IncidentRequest,
    responses(
        (status = 201, description = "Incident recorded", body = ApiResponse<IncidentResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Incident not allowed in the item's state", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Incidents"
)]
pub async fn record_incident(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<IncidentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<IncidentResponse>>), ServiceError> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_record_incident, "record incidents")?;
    let Path(id) = path.map_err(rejected)?;
    let Json(payload) = payload.map_err(rejected)?;

    let recorded = state
        .services
        .incidents
        .record(&caps, id, payload.kind, &payload.description)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(recorded.into())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/incidents",
    summary = "List incidents",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Incidents of the item", body = ApiResponse<Vec<IncidentResponse>>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Incidents"
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<IncidentResponse>> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_read, "view incidents")?;
    let Path(id) = path.map_err(rejected)?;

    let incidents = state.services.incidents.list(&caps, id).await?;
    Ok(Json(ApiResponse::success(
        incidents.into_iter().map(IncidentResponse::from).collect(),
    )))
}
