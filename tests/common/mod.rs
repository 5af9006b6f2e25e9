#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use gear_custody_api::{
    app_router,
    auth::{consts as perm, Capabilities},
    config::AppConfig,
    db,
    entities::item::{self, ItemCondition, OwnershipType},
    events::{self, EventSender},
    services::items::CreateItemInput,
    AppState,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_custody_integration_tests";

/// Application state backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub activity_id: Uuid,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.cors_allow_any_origin = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let token = state
            .auth
            .issue_token("leader-1", vec![perm::ROLE_ADMIN.to_string()], vec![])
            .expect("issue admin token");

        Self {
            router: app_router(state.clone()),
            state,
            activity_id: Uuid::new_v4(),
            token,
            _event_task: event_task,
        }
    }

    /// Bearer token for an admin user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Mints a token carrying only `permissions`.
    pub fn token_with_permissions(&self, permissions: &[&str]) -> String {
        self.state
            .auth
            .issue_token(
                "helper-1",
                vec![],
                permissions.iter().map(|p| p.to_string()).collect(),
            )
            .expect("issue scoped token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Registers one owned item directly through the service layer.
    pub async fn seed_owned(&self, name: &str) -> item::Model {
        self.seed(input(name, OwnershipType::Owned, None)).await
    }

    /// Registers one borrowed item lent by `lender`.
    pub async fn seed_borrowed(&self, name: &str, lender: &str) -> item::Model {
        self.seed(input(name, OwnershipType::Borrowed, Some(lender)))
            .await
    }

    async fn seed(&self, input: CreateItemInput) -> item::Model {
        let created = self
            .state
            .services
            .items
            .create(&Capabilities::all(), self.activity_id, input, false)
            .await
            .expect("seed item");
        created
            .items
            .into_iter()
            .next()
            .expect("one item created")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Minimal registration input; tests tweak the fields they care about.
pub fn input(name: &str, ownership: OwnershipType, lender: Option<&str>) -> CreateItemInput {
    CreateItemInput {
        name: name.to_string(),
        description: None,
        category: Default::default(),
        quantity: 1,
        ownership_type: ownership,
        lender_name: lender.map(str::to_string),
        lender_contact: None,
        assigned_to: None,
        assignment_type: Default::default(),
        condition: Some(ItemCondition::Good),
        observations: None,
        code_prefix: None,
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
