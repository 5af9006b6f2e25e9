pub mod custody;
pub mod dashboard;
pub mod incidents;
pub mod items;
pub mod returns;

use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    custody::CustodyService, dashboard::DashboardService, incidents::IncidentService,
    items::ItemService, returns::ReturnService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub items: Arc<ItemService>,
    pub custody: Arc<CustodyService>,
    pub incidents: Arc<IncidentService>,
    pub returns: Arc<ReturnService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let items = ItemService::new(db_pool.clone(), event_sender.clone())
            .with_max_batch_size(config.max_batch_size as usize);

        Self {
            items: Arc::new(items),
            custody: Arc::new(CustodyService::new(db_pool.clone(), event_sender.clone())),
            incidents: Arc::new(IncidentService::new(db_pool.clone(), event_sender.clone())),
            returns: Arc::new(ReturnService::new(db_pool.clone(), event_sender)),
            dashboard: Arc::new(DashboardService::new(db_pool)),
        }
    }
}

/// Pagination parameters shared by list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Page size, capped by `api_max_page_size`
    pub limit: Option<u64>,
}

/// Maps an extractor rejection into the API's error envelope.
///
/// Handlers take their path, query and body extractors as `Result`s and
/// resolve them only after the caller's capability has been checked.
pub(crate) fn rejected<E: Display>(rejection: E) -> ServiceError {
    ServiceError::ValidationError(rejection.to_string())
}
