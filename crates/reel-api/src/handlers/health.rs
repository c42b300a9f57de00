//! Liveness and readiness.

use std::collections::BTreeMap;
use std::fmt::Display;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Outcome of one dependency check.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Check {
    Ok,
    Error { error: String },
}

impl<T, E: Display> From<Result<T, E>> for Check {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Check::Ok,
            Err(e) => Check::Error { error: e.to_string() },
        }
    }
}

#[derive(Serialize)]
pub struct Readiness {
    status: &'static str,
    checks: BTreeMap<&'static str, Check>,
}

/// Ready when the queue file parses and the storage backend answers.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let checks = BTreeMap::from([
        ("queue", Check::from(state.queue.stats().await)),
        ("storage", Check::from(state.storage.check().await)),
    ]);

    let (code, status) = if checks.values().all(|c| matches!(c, Check::Ok)) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (code, Json(Readiness { status, checks }))
}
