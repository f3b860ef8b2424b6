pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::federation::FederatedSearchService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FederatedSearchService>,
}

impl AppState {
    pub fn new(service: Arc<FederatedSearchService>) -> Self {
        Self { service }
    }
}
