pub mod health;
pub mod saved_searches;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use alsat_shared::clients::db::lazy_pool;

    use crate::config::AppConfig;
    use crate::jobs::SavedSearchNotifier;
    use crate::AppState;

    /// State over an unreachable database; the job runs against `notifier`.
    pub fn test_state(notifier: Arc<SavedSearchNotifier>) -> Arc<AppState> {
        let config = AppConfig::default();
        Arc::new(AppState {
            db: lazy_pool("postgres://alsat@127.0.0.1:1/none", 1),
            config,
            notifier,
            scheduler: None,
            metrics_handle: PrometheusBuilder::new().build_recorder().handle(),
        })
    }

    fn idle_notifier() -> Arc<SavedSearchNotifier> {
        use crate::jobs::testing::{RecordingDispatcher, RecordingOwner};
        use crate::store::MemoryStore;
        Arc::new(SavedSearchNotifier::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingDispatcher::default()),
            Arc::new(RecordingOwner::default()),
        ))
    }

    #[tokio::test]
    async fn health_reports_service_and_checks() {
        let app = crate::app_router(test_state(idle_notifier()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["service"], "alsat-notifier");
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"][0]["message"], "disabled");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let app = crate::app_router(test_state(idle_notifier()));
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
