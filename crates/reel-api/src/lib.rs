//! HTTP front end for the render service.
//!
//! - `POST /render` renders synchronously and answers with the outcome
//! - `POST /jobs` appends a job for the queue poller
//! - `GET /jobs/:id` reads a job record
//! - health, readiness and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
