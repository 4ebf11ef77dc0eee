pub mod config;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use alsat_shared::clients::db::DbPool;
use alsat_shared::clients::email::EmailClient;
use alsat_shared::clients::rabbitmq::RabbitMQClient;

use config::AppConfig;
use jobs::dispatcher::EmailDispatcher;
use jobs::mailer::{LogMailer, Mailer, ResendMailer};
use jobs::owner::{EventOwnerNotifier, LogOwnerNotifier, OwnerNotifier};
use jobs::{DailySchedule, NotificationScheduler, SavedSearchNotifier};
use store::PgStore;

pub const SERVICE_NAME: &str = "alsat-notifier";

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub notifier: Arc<SavedSearchNotifier>,
    pub scheduler: Option<Arc<NotificationScheduler>>,
    pub metrics_handle: PrometheusHandle,
}

/// Wire the job against Postgres, picking mail and owner channels from config.
pub async fn build_notifier(config: &AppConfig, db: DbPool) -> anyhow::Result<SavedSearchNotifier> {
    let mailer: Arc<dyn Mailer> = match config.resend_api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => {
            tracing::info!(from = %config.from_email, "sending saved search mail through Resend");
            Arc::new(ResendMailer::new(EmailClient::new(key, &config.from_email, &config.from_name)))
        }
        None => {
            tracing::warn!("no Resend API key configured, saved search mail is only logged");
            Arc::new(LogMailer)
        }
    };

    let owner: Arc<dyn OwnerNotifier> = match config.rabbitmq_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => Arc::new(EventOwnerNotifier::new(RabbitMQClient::connect(url).await?, SERVICE_NAME)),
        None => Arc::new(LogOwnerNotifier),
    };

    let dispatcher = Arc::new(EmailDispatcher::new(mailer, config.public_base_url.clone()));
    Ok(SavedSearchNotifier::new(Arc::new(PgStore::new(db)), dispatcher, owner).with_lookback(config.lookback()))
}

pub fn build_scheduler(
    config: &AppConfig,
    notifier: Arc<SavedSearchNotifier>,
) -> anyhow::Result<NotificationScheduler> {
    let schedule = DailySchedule::parse(&config.schedule_times, &config.schedule_utc_offset)?;
    Ok(NotificationScheduler::new(notifier, schedule))
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route(
            "/saved-searches",
            get(routes::saved_searches::list_saved_searches).post(routes::saved_searches::create_saved_search),
        )
        .route(
            "/saved-searches/notifications/trigger",
            post(routes::saved_searches::trigger_notifications),
        )
        .route("/saved-searches/:id", delete(routes::saved_searches::delete_saved_search))
        .route(
            "/saved-searches/:id/notifications",
            post(routes::saved_searches::toggle_notifications),
        )
        .route("/saved-searches/:id/active", post(routes::saved_searches::toggle_active))
        .layer(axum::middleware::from_fn(alsat_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
