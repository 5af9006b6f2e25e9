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

use super::{items::ItemResponse, rejected};
use crate::{
    auth::{AuthUser, Capabilities},
    entities::custody_transfer,
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferRequest {
    pub new_holder: String,
    pub note: Option<String>,
}

/// One entry of an item's custody chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustodyEntryResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Empty when the item left the owning organization.
    pub previous_holder: Option<String>,
    pub new_holder: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: i32,
    pub note: Option<String>,
}

impl From<custody_transfer::Model> for CustodyEntryResponse {
    fn from(model: custody_transfer::Model) -> Self {
        Self {
            id: model.id,
            item_id: model.item_id,
            previous_holder: model.previous_holder,
            new_holder: model.new_holder,
            timestamp: model.timestamp,
            sequence: model.sequence,
            note: model.note,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferResponse {
    pub previous_holder: Option<String>,
    pub new_holder: String,
    pub item: ItemResponse,
}

#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/transfers",
    summary = "Transfer custody",
    description = "Hands an item to a new holder and appends the hand-over to its custody chain",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = TransferRequest,
    responses(
        (status = 201, description = "Custody transferred", body = ApiResponse<TransferResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item cannot be transferred in its current state", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Custody"
)]
pub async fn transfer_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TransferResponse>>), ServiceError> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_transfer, "transfer items")?;
    let Path(id) = path.map_err(rejected)?;
    let Json(payload) = payload.map_err(rejected)?;

    let outcome = state
        .services
        .custody
        .transfer(&caps, id, &payload.new_holder, payload.note)
        .await?;

    let response = TransferResponse {
        previous_holder: outcome.previous_holder,
        new_holder: outcome.new_holder,
        item: outcome.item.into(),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/transfers",
    summary = "Custody history",
    description = "Full custody chain of an item, oldest first",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Custody chain", body = ApiResponse<Vec<CustodyEntryResponse>>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Custody"
)]
pub async fn custody_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<CustodyEntryResponse>> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_read, "view custody history")?;
    let Path(id) = path.map_err(rejected)?;

    let entries = state.services.custody.history(&caps, id).await?;
    Ok(Json(ApiResponse::success(
        entries.into_iter().map(CustodyEntryResponse::from).collect(),
    )))
}
