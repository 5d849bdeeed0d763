pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::pipeline::TriagePipeline;
use std::sync::Arc;

/// Header carrying the caller id set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TriagePipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<TriagePipeline>) -> Self {
        Self { pipeline }
    }
}
