//! API interface implementations

pub mod dto;
pub mod metrics_handler;
pub mod router;
pub mod workflow_handler;

pub use dto::ApiResponse;
pub use metrics_handler::init_metrics;
pub use router::build_router;
pub use workflow_handler::AppState;
