//! HTTP API
//!
//! The run endpoint streams AG-UI events; the rest report liveness.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::controller::RunController;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
}

impl AppState {
    pub fn new(controller: RunController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }
}
