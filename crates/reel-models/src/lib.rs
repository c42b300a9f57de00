//! Shared data models for the Reel renderer.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle
//! - Render specs (scenes, word timings, music)
//! - Encoding configuration and frame geometry
//! - Webhook and service payloads

pub mod encoding;
pub mod frame;
pub mod job;
pub mod render_spec;
pub mod service;
pub mod webhook;

// Re-export common types
pub use encoding::EncodingConfig;
pub use frame::{FrameSize, FrameSizeParseError};
pub use job::{Job, JobId, JobStatus, JobType, RenderResult, TransitionError};
pub use render_spec::{RenderSpec, Scene, Visual, WordTiming, DEFAULT_SCENE_DURATION_SECS};
pub use service::{RenderRequest, RenderResponse, SubmitJobRequest, SubmitJobResponse};
pub use webhook::WebhookEvent;
