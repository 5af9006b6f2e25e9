use axum::{
    extract::{rejection::PathRejection, Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use super::rejected;
use crate::{
    auth::{AuthUser, Capabilities},
    services::dashboard::DashboardCounts,
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/activities/{activity_id}/dashboard",
    summary = "Dashboard counts",
    description = "Totals of items, pending returns, items on loan and damaged items",
    params(("activity_id" = Uuid, Path, description = "Activity id")),
    responses(
        (status = 200, description = "Counts for the activity", body = ApiResponse<DashboardCounts>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard_counts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<DashboardCounts> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_read, "view the dashboard")?;
    let Path(activity_id) = path.map_err(rejected)?;

    let counts = state.services.dashboard.counts(&caps, activity_id).await?;
    Ok(Json(ApiResponse::success(counts)))
}
