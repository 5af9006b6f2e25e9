use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gear Custody API",
        version = "0.1.0",
        description = r#"
# Gear Custody API

Tracks the equipment used during an activity: what exists, who holds it, what
happened to it and whether borrowed gear went back to its lender.

## Authentication

Every `/api/v1` endpoint except `/status` and `/health` requires a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Permissions: `inventory:read`, `inventory:create`, `inventory:update`,
`inventory:delete`, `inventory:transfer`, `inventory:incident`,
`inventory:return`. The `admin` role grants all of them.

## Error Handling

```json
{
  "error": "Conflict",
  "message": "Invalid transition: cannot transfer an item that is WRITTEN_OFF",
  "request_id": "req-abc123xyz",
  "timestamp": "2026-07-14T10:30:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Items", description = "Equipment registry"),
        (name = "Custody", description = "Hand-overs and custody history"),
        (name = "Incidents", description = "Damage and write-off records"),
        (name = "Returns", description = "Returning borrowed equipment to its lender"),
        (name = "Dashboard", description = "Per-activity counters")
    ),
    paths(
        crate::handlers::items::list_items,
        crate::handlers::items::create_items,
        crate::handlers::items::get_item_by_code,
        crate::handlers::items::get_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,
        crate::handlers::custody::transfer_item,
        crate::handlers::custody::custody_history,
        crate::handlers::incidents::record_incident,
        crate::handlers::incidents::list_incidents,
        crate::handlers::returns::return_item,
        crate::handlers::dashboard::dashboard_counts,
    ),
    components(
        schemas(
            crate::handlers::items::ItemResponse,
            crate::handlers::items::CreateItemRequest,
            crate::handlers::items::CreateItemsResponse,
            crate::handlers::items::DeletedItemResponse,
            crate::services::items::CreateItemInput,
            crate::services::items::UpdateItemInput,
            crate::handlers::custody::TransferRequest,
            crate::handlers::custody::TransferResponse,
            crate::handlers::custody::CustodyEntryResponse,
            crate::handlers::incidents::IncidentRequest,
            crate::handlers::incidents::IncidentResponse,
            crate::handlers::returns::ReturnRequest,
            crate::services::dashboard::DashboardCounts,
            crate::entities::item::Category,
            crate::entities::item::OwnershipType,
            crate::entities::item::AssignmentType,
            crate::entities::item::ItemState,
            crate::entities::item::ItemCondition,
            crate::entities::incident::IncidentType,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by the secured paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_custody_routes() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Gear Custody API"));
        assert!(json.contains("/api/v1/items/{id}/transfers"));
        assert!(json.contains("/api/v1/activities/{activity_id}/dashboard"));
        assert!(json.contains("\"Bearer\""));
    }
}
