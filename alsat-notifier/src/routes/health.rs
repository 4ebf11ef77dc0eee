use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use alsat_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let scheduler = match &state.scheduler {
        Some(s) if s.is_started() => HealthCheck {
            name: "scheduler".into(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Some(_) => HealthCheck {
            name: "scheduler".into(),
            status: HealthStatus::Degraded,
            message: Some("stopped".into()),
        },
        None => HealthCheck {
            name: "scheduler".into(),
            status: HealthStatus::Healthy,
            message: Some("disabled".into()),
        },
    };
    let job = HealthCheck {
        name: "notification_job".into(),
        status: HealthStatus::Healthy,
        message: state.notifier.is_running().then(|| "running".to_string()),
    };

    Json(
        HealthResponse::healthy("alsat-notifier", env!("CARGO_PKG_VERSION"))
            .with_checks(vec![scheduler, job]),
    )
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
