use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{rejected, PageQuery};
use crate::{
    auth::{AuthUser, Capabilities},
    entities::item::{self, AssignmentType, Category, ItemCondition, ItemState, OwnershipType},
    errors::ServiceError,
    services::items::{CreateItemInput, ItemFilters, UpdateItemInput},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// Item as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub quantity: i32,
    pub code: Option<String>,
    pub ownership_type: OwnershipType,
    pub lender_name: Option<String>,
    pub lender_contact: Option<String>,
    pub assigned_to: Option<String>,
    pub assignment_type: AssignmentType,
    /// Who physically has the item; empty until the first hand-over.
    pub current_holder: Option<String>,
    pub state: ItemState,
    pub condition: ItemCondition,
    pub returned: bool,
    pub returned_at: Option<DateTime<Utc>>,
    pub observations: Option<String>,
    /// Pass back as `expected_version` on update to detect concurrent edits.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<item::Model> for ItemResponse {
    fn from(model: item::Model) -> Self {
        Self {
            id: model.id,
            activity_id: model.activity_id,
            name: model.name,
            description: model.description,
            category: model.category,
            quantity: model.quantity,
            code: model.code,
            ownership_type: model.ownership_type,
            lender_name: model.lender_name,
            lender_contact: model.lender_contact,
            assigned_to: model.assigned_to,
            assignment_type: model.assignment_type,
            current_holder: model.current_holder,
            state: model.state,
            condition: model.condition,
            returned: model.returned,
            returned_at: model.returned_at,
            observations: model.observations,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    #[serde(flatten)]
    pub item: CreateItemInput,
    /// Create one coded record per unit instead of one consolidated record.
    #[serde(default)]
    pub create_individual_units: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateItemsResponse {
    pub created_count: usize,
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedItemResponse {
    pub id: Uuid,
    pub deleted: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/activities/{activity_id}/items",
    summary = "List items",
    description = "Paginated list of an activity's equipment with optional filters",
    params(
        ("activity_id" = Uuid, Path, description = "Activity id"),
        ItemFilters,
        PageQuery,
    ),
    responses(
        (status = 200, description = "Items retrieved", body = ApiResponse<PaginatedResponse<ItemResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    filters: Result<Query<ItemFilters>, QueryRejection>,
    paging: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<PaginatedResponse<ItemResponse>> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_read, "view items")?;
    let Path(activity_id) = path.map_err(rejected)?;
    let Query(filters) = filters.map_err(rejected)?;
    let Query(paging) = paging.map_err(rejected)?;

    let page = paging.page.unwrap_or(1).max(1);
    let limit = state.config.page_size(paging.limit);

    let (records, total) = state
        .services
        .items
        .list(&caps, activity_id, &filters, page, limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: records.into_iter().map(ItemResponse::from).collect(),
        total,
        page,
        limit,
        total_pages: (total + limit - 1) / limit,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/activities/{activity_id}/items",
    summary = "Register items",
    description = "Registers equipment for an activity, optionally as individually coded units",
    params(("activity_id" = Uuid, Path, description = "Activity id")),
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Items created", body = ApiResponse<CreateItemsResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Items"
)]
pub async fn create_items(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreateItemsResponse>>), ServiceError> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_create, "create items")?;
    let Path(activity_id) = path.map_err(rejected)?;
    let Json(payload) = payload.map_err(rejected)?;

    let created = state
        .services
        .items
        .create(
            &caps,
            activity_id,
            payload.item,
            payload.create_individual_units,
        )
        .await?;

    let response = CreateItemsResponse {
        created_count: created.created_count,
        items: created.items.into_iter().map(ItemResponse::from).collect(),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

#[utoipa::path(
    get,
    path = "/api/v1/activities/{activity_id}/items/by-code/{code}",
    summary = "Get item by code",
    params(
        ("activity_id" = Uuid, Path, description = "Activity id"),
        ("code" = String, Path, description = "Unit code, e.g. TENT-003"),
    ),
    responses(
        (status = 200, description = "Item retrieved", body = ApiResponse<ItemResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Items"
)]
pub async fn get_item_by_code(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<(Uuid, String)>, PathRejection>,
) -> ApiResult<ItemResponse> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_read, "view items")?;
    let Path((activity_id, code)) = path.map_err(rejected)?;

    let item = state
        .services
        .items
        .get_by_code(&caps, activity_id, &code)
        .await?;
    Ok(Json(ApiResponse::success(item.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    summary = "Get item",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item retrieved", body = ApiResponse<ItemResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<ItemResponse> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_read, "view items")?;
    let Path(id) = path.map_err(rejected)?;

    let item = state.services.items.get(&caps, id).await?;
    Ok(Json(ApiResponse::success(item.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    summary = "Update item",
    description = "Edits descriptive fields; lifecycle fields are read-only here",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = UpdateItemInput,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<ItemResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Modified concurrently or invalid transition", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateItemInput>, JsonRejection>,
) -> ApiResult<ItemResponse> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_edit, "edit items")?;
    let Path(id) = path.map_err(rejected)?;
    let Json(payload) = payload.map_err(rejected)?;

    let item = state
        .services
        .items
        .update(&caps, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(item.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    summary = "Delete item",
    description = "Removes an item together with its custody history and incidents",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted", body = ApiResponse<DeletedItemResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<DeletedItemResponse> {
    let caps = user.capabilities();
    Capabilities::require(caps.can_delete, "delete items")?;
    let Path(id) = path.map_err(rejected)?;

    state.services.items.delete(&caps, id).await?;
    Ok(Json(ApiResponse::success(DeletedItemResponse {
        id,
        deleted: true,
    })))
}
