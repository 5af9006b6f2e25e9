use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{items::ItemResponse, rejected};
use crate::{
    auth::{AuthUser, Capabilities},
    entities::item::ItemCondition,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Condition the lender receives the item in.
    pub condition: ItemCondition,
    pub notes: Option<String>,
    /// Defaults to now.
    pub returned_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/return",
    summary = "Return borrowed item",
    description = "Gives borrowed equipment back to its lender and closes its custody chain",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Item returned", body = ApiResponse<ItemResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item is owned, already returned or written off", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Returns"
)]
pub async fn return_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReturnRequest>, JsonRejection>,
) -> ApiResult<ItemResponse> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_return, "return items")?;
    let Path(id) = path.map_err(rejected)?;
    let Json(payload) = payload.map_err(rejected)?;

    let item = state
        .services
        .returns
        .return_item(
            &caps,
            id,
            payload.condition,
            payload.notes,
            payload.returned_at,
        )
        .await?;
    Ok(Json(ApiResponse::success(item.into())))
}
