//! HTTP tests driving the full router.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use gear_custody_api::auth::consts as perm;
use serde_json::json;

#[tokio::test]
async fn status_and_health_do_not_require_a_token() {
    let app = TestApp::new().await;

    let status = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(status.status(), StatusCode::OK);
    let body = response_json(status).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["service"], "gear-custody-api");

    let health = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);
    let body = response_json(health).await;
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn item_routes_require_a_valid_token() {
    let app = TestApp::new().await;
    let uri = format!("/api/v1/activities/{}/items", app.activity_id);

    let missing = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, &uri, None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_transfer_and_read_back_over_http() {
    let app = TestApp::new().await;
    let items_uri = format!("/api/v1/activities/{}/items", app.activity_id);

    let created = app
        .request_authenticated(
            Method::POST,
            &items_uri,
            Some(json!({
                "name": "Extension cord",
                "category": "ELECTRICAL",
                "quantity": 3,
                "code_prefix": "ext",
                "create_individual_units": true
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = response_json(created).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["created_count"], 3);
    assert_eq!(body["data"]["items"][0]["code"], "EXT-001");
    assert_eq!(body["data"]["items"][0]["state"], "AVAILABLE");
    assert!(body["meta"]["timestamp"].is_string());
    let item_id = body["data"]["items"][0]["id"]
        .as_str()
        .expect("item id")
        .to_string();

    let transfer = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/transfers", item_id),
            Some(json!({ "new_holder": "Alice", "note": "stage lights" })),
        )
        .await;
    assert_eq!(transfer.status(), StatusCode::CREATED);
    let body = response_json(transfer).await;
    assert!(body["data"]["previous_holder"].is_null());
    assert_eq!(body["data"]["item"]["current_holder"], "Alice");
    assert_eq!(body["data"]["item"]["state"], "IN_USE");

    let history = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/items/{}/transfers", item_id),
            None,
        )
        .await;
    assert_eq!(history.status(), StatusCode::OK);
    let body = response_json(history).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["sequence"], 1);

    let by_code = app
        .request_authenticated(
            Method::GET,
            &format!(
                "/api/v1/activities/{}/items/by-code/EXT-001",
                app.activity_id
            ),
            None,
        )
        .await;
    assert_eq!(by_code.status(), StatusCode::OK);
    assert_eq!(response_json(by_code).await["data"]["id"], item_id.as_str());

    let listed = app
        .request_authenticated(
            Method::GET,
            &format!("{}?state=IN_USE&page=1&limit=10", items_uri),
            None,
        )
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = response_json(listed).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 10);
    assert_eq!(body["data"]["total_pages"], 1);

    let dashboard = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/activities/{}/dashboard", app.activity_id),
            None,
        )
        .await;
    let body = response_json(dashboard).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["on_loan"], 1);
}

#[tokio::test]
async fn validation_errors_are_bad_requests() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/activities/{}/items", app.activity_id),
            Some(json!({
                "name": "Canoe",
                "quantity": 1,
                "ownership_type": "BORROWED"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("lender_name")));
}

#[tokio::test]
async fn invalid_transitions_are_conflicts() {
    let app = TestApp::new().await;
    let item = app.seed_owned("Lamp").await;

    let incident = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/incidents", item.id),
            Some(json!({ "kind": "WRITE_OFF", "description": "shattered" })),
        )
        .await;
    assert_eq!(incident.status(), StatusCode::CREATED);

    let transfer = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/transfers", item.id),
            Some(json!({ "new_holder": "Bob" })),
        )
        .await;
    assert_eq!(transfer.status(), StatusCode::CONFLICT);
    let body = response_json(transfer).await;
    assert_eq!(
        body["message"],
        "Invalid transition: cannot transfer an item that is WRITTEN_OFF"
    );

    let incidents = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/items/{}/incidents", item.id),
            None,
        )
        .await;
    let body = response_json(incidents).await;
    assert_eq!(body["data"][0]["kind"], "WRITE_OFF");
}

#[tokio::test]
async fn return_over_http() {
    let app = TestApp::new().await;
    let item = app.seed_borrowed("Canoe", "Sea scouts").await;

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/return", item.id),
            Some(json!({ "condition": "POOR", "notes": "paddle missing" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["returned"], true);
    assert_eq!(body["data"]["state"], "RETURNED");
    assert_eq!(body["data"]["condition"], "POOR");
    assert_eq!(body["data"]["current_holder"], "Sea scouts");
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let app = TestApp::new().await;
    let item = app.seed_owned("Lamp").await;
    let reader = app.token_with_permissions(&[perm::INVENTORY_READ]);

    let read = app
        .request(
            Method::GET,
            &format!("/api/v1/items/{}", item.id),
            None,
            Some(&reader),
        )
        .await;
    assert_eq!(read.status(), StatusCode::OK);

    let delete = app
        .request(
            Method::DELETE,
            &format!("/api/v1/items/{}", item.id),
            None,
            Some(&reader),
        )
        .await;
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    let still_there = app
        .request_authenticated(Method::GET, &format!("/api/v1/items/{}", item.id), None)
        .await;
    assert_eq!(still_there.status(), StatusCode::OK);
}

#[tokio::test]
async fn update_and_delete_over_http() {
    let app = TestApp::new().await;
    let item = app.seed_owned("Hammer").await;
    let uri = format!("/api/v1/items/{}", item.id);

    let updated = app
        .request_authenticated(
            Method::PUT,
            &uri,
            Some(json!({ "name": "Club hammer", "expected_version": item.version })),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = response_json(updated).await;
    assert_eq!(body["data"]["name"], "Club hammer");
    assert_eq!(body["data"]["version"], item.version + 1);

    let stale = app
        .request_authenticated(
            Method::PUT,
            &uri,
            Some(json!({ "name": "Sledge", "expected_version": item.version })),
        )
        .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);

    let deleted = app
        .request_authenticated(Method::DELETE, &uri, None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(response_json(deleted).await["data"]["deleted"], true);

    let gone = app.request_authenticated(Method::GET, &uri, None).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_id_is_echoed_in_errors() {
    let app = TestApp::new().await;
    let response = app
        .request_authenticated(
            Method::GET,
            &format!("/api/v1/items/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("request id header");

    let body = response_json(response).await;
    assert_eq!(body["request_id"], header.as_str());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body["paths"]["/api/v1/items/{id}/return"].is_object());
}

#[tokio::test]
async fn page_out_of_range_is_a_bad_request() {
    let app = TestApp::new().await;
    app.seed_owned("Lamp").await;

    let response = app
        .request_authenticated(
            Method::GET,
            &format!(
                "/api/v1/activities/{}/items?page=18446744073709551615&limit=100",
                app.activity_id
            ),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().is_some_and(|m| m.contains("page")));
}

#[tokio::test]
async fn capability_is_checked_before_request_shape() {
    let app = TestApp::new().await;
    let reader = app.token_with_permissions(&[perm::INVENTORY_READ]);

    let malformed_transfer = app
        .request(
            Method::POST,
            "/api/v1/items/not-a-uuid/transfers",
            Some(json!({ "note": "no holder" })),
            Some(&reader),
        )
        .await;
    assert_eq!(malformed_transfer.status(), StatusCode::FORBIDDEN);

    let malformed_delete = app
        .request(
            Method::DELETE,
            "/api/v1/items/not-a-uuid",
            None,
            Some(&reader),
        )
        .await;
    assert_eq!(malformed_delete.status(), StatusCode::FORBIDDEN);

    let item = app.seed_owned("Lamp").await;
    let missing_field = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/items/{}/transfers", item.id),
            Some(json!({ "note": "no holder" })),
        )
        .await;
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);
    let body = response_json(missing_field).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("new_holder")));
    assert!(body["request_id"].is_string());

    let bad_id = app
        .request_authenticated(Method::GET, "/api/v1/items/not-a-uuid", None)
        .await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(bad_id).await["error"], "Bad Request");
}
