//! Render worker.
//!
//! This crate provides:
//! - The render orchestrator (fetch, compose, assemble, encode, publish)
//! - A queue poll loop with backoff and graceful shutdown
//! - Outcome recording shared with the direct HTTP service
//! - Webhook relay for progress and terminal events

pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod webhook;

pub use config::{WebhookConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, PollOutcome};
pub use handler::JobHandler;
pub use logging::JobLogger;
pub use render::{no_progress, ProgressFn, RenderOutput, RenderPipeline, Renderer};
pub use webhook::{JobEvents, WebhookNotifier, WebhookTarget};
