use std::sync::Arc;

use alsat_notifier::config::AppConfig;
use alsat_notifier::{app_router, build_notifier, build_scheduler, AppState, SERVICE_NAME};
use alsat_shared::clients::db::create_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    alsat_shared::middleware::init_tracing(SERVICE_NAME);
    let metrics_handle = alsat_shared::middleware::init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    // Read by the auth extractors.
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let notifier = Arc::new(build_notifier(&config, db.clone()).await?);

    let scheduler = if config.scheduler_enabled {
        let scheduler = Arc::new(build_scheduler(&config, notifier.clone())?);
        scheduler.start();
        Some(scheduler)
    } else {
        tracing::info!("notification scheduler disabled");
        None
    };

    let state = Arc::new(AppState {
        db,
        config,
        notifier,
        scheduler: scheduler.clone(),
        metrics_handle,
    });

    let app = app_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "{SERVICE_NAME} starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    Ok(())
}
