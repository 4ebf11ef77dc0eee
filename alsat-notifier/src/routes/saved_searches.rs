use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use alsat_shared::errors::{AppError, AppResult, ErrorCode};
use alsat_shared::middleware::AdminUser;
use alsat_shared::types::api::ApiResponse;
use alsat_shared::types::auth::AuthUser;
use alsat_shared::types::pagination::{Paginated, PaginationParams};

use crate::jobs::{JobError, NotificationRun};
use crate::models::{SavedSearchFilters, SavedSearchView};
use crate::services::saved_search_service;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSavedSearchRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(custom = "non_negative_prices")]
    pub filters: SavedSearchFilters,
    #[serde(default)]
    pub email_notifications: bool,
}

fn non_negative_prices(filters: &SavedSearchFilters) -> Result<(), ValidationError> {
    if filters.has_negative_price() {
        let mut err = ValidationError::new("negative_price");
        err.message = Some("prices must not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ToggleNotificationsRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ToggleActiveRequest {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: i32,
    pub deleted: bool,
}

/// GET /saved-searches
pub async fn list_saved_searches(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<SavedSearchView>>>> {
    let (limit, offset) = params.sql_bounds();
    let (items, total) =
        saved_search_service::list_saved_searches(&state.db, auth_user.id, limit, offset)?;

    let views = items.into_iter().map(SavedSearchView::from).collect();
    let total = u64::try_from(total).unwrap_or_default();
    Ok(Json(ApiResponse::ok(Paginated::new(views, total, &params))))
}

/// POST /saved-searches
pub async fn create_saved_search(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(mut req): Json<CreateSavedSearchRequest>,
) -> AppResult<Json<ApiResponse<SavedSearchView>>> {
    req.name = req.name.trim().to_string();
    req.validate().map_err(|e| {
        AppError::with_details(
            ErrorCode::InvalidSearchFilters,
            "invalid saved search",
            serde_json::json!({ "reason": e.to_string() }),
        )
    })?;

    let search = saved_search_service::create_saved_search(
        &state.db,
        auth_user.id,
        &req.name,
        &req.filters,
        req.email_notifications,
    )?;

    Ok(Json(ApiResponse::ok(search.into())))
}

/// DELETE /saved-searches/:id
pub async fn delete_saved_search(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<DeletedResponse>>> {
    saved_search_service::delete_saved_search(&state.db, id, auth_user.id)?;
    Ok(Json(ApiResponse::ok(DeletedResponse { id, deleted: true })))
}

/// POST /saved-searches/:id/notifications
pub async fn toggle_notifications(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<ToggleNotificationsRequest>,
) -> AppResult<Json<ApiResponse<SavedSearchView>>> {
    let search = saved_search_service::set_email_notifications(&state.db, id, auth_user.id, req.enabled)?;
    Ok(Json(ApiResponse::ok(search.into())))
}

/// POST /saved-searches/:id/active
pub async fn toggle_active(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(req): Json<ToggleActiveRequest>,
) -> AppResult<Json<ApiResponse<SavedSearchView>>> {
    let search = saved_search_service::set_active(&state.db, id, auth_user.id, req.active)?;
    Ok(Json(ApiResponse::ok(search.into())))
}

/// POST /saved-searches/notifications/trigger
/// Runs the notification job now. Requires AdminUser.
pub async fn trigger_notifications(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<NotificationRun>>> {
    tracing::info!(admin_id = admin.id, "manual saved search notification run requested");
    let run = state.notifier.run().await.map_err(job_error)?;
    Ok(Json(ApiResponse::ok(run)))
}

fn job_error(err: JobError) -> AppError {
    match err {
        JobError::AlreadyRunning => AppError::new(ErrorCode::NotificationJobRunning, err.to_string()),
        other => {
            let cause = std::error::Error::source(&other).map(|s| s.to_string());
            AppError::with_details(
                ErrorCode::NotificationJobFailed,
                other.to_string(),
                serde_json::json!({ "cause": cause }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    use alsat_shared::middleware::jwt_secret;
    use alsat_shared::types::auth::{Claims, UserRole};

    use crate::jobs::testing::{listing, saved_search, user, GatedDispatcher, RecordingDispatcher, RecordingOwner};
    use crate::jobs::SavedSearchNotifier;
    use crate::routes::tests::test_state;
    use crate::store::MemoryStore;

    fn bearer(role: UserRole) -> String {
        let token = encode(
            &Header::default(),
            &Claims::new(7, role, 3600),
            &EncodingKey::from_secret(jwt_secret().as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    fn trigger(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/saved-searches/notifications/trigger");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn seeded_notifier() -> Arc<SavedSearchNotifier> {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(user(1, Some("ayse@example.com")));
        store.insert_search(saved_search(1, 1, r#"{"city":"İstanbul","minPrice":1000000,"maxPrice":2000000}"#));
        store.insert_listing(listing(1, "İstanbul", 1_500_000));
        store.insert_listing(listing(2, "Ankara", 1_500_000));
        Arc::new(SavedSearchNotifier::new(
            store,
            Arc::new(RecordingDispatcher::default()),
            Arc::new(RecordingOwner::default()),
        ))
    }

    #[tokio::test]
    async fn trigger_requires_a_token() {
        let app = crate::app_router(test_state(seeded_notifier()));
        let response = app.oneshot(trigger(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn trigger_rejects_non_admin() {
        let app = crate::app_router(test_state(seeded_notifier()));
        let response = app.oneshot(trigger(Some(&bearer(UserRole::User)))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E0005");
    }

    #[tokio::test]
    async fn admin_trigger_returns_the_run() {
        let app = crate::app_router(test_state(seeded_notifier()));
        let response = app.oneshot(trigger(Some(&bearer(UserRole::Admin)))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total_searches"], 1);
        assert_eq!(body["data"]["notifications_sent"], 1);
        assert_eq!(body["data"]["details"][0]["matching_listings"], 1);
        assert_eq!(body["data"]["details"][0]["status"], "success");
    }

    #[tokio::test]
    async fn overlapping_trigger_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(user(1, Some("ayse@example.com")));
        store.insert_search(saved_search(1, 1, "{}"));
        store.insert_listing(listing(1, "Ankara", 100));
        let gate = Arc::new(GatedDispatcher::default());
        let notifier = Arc::new(SavedSearchNotifier::new(store, gate.clone(), Arc::new(RecordingOwner::default())));

        let background = tokio::spawn({
            let notifier = notifier.clone();
            async move { notifier.run().await }
        });
        gate.entered.notified().await;

        let app = crate::app_router(test_state(notifier));
        let response = app.oneshot(trigger(Some(&bearer(UserRole::Admin)))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["error"]["code"], "E8003");

        gate.release.notify_one();
        background.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn saved_search_routes_require_auth() {
        let app = crate::app_router(test_state(seeded_notifier()));
        let response = app
            .oneshot(Request::builder().uri("/saved-searches").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_name_is_rejected_before_touching_the_database() {
        let app = crate::app_router(test_state(seeded_notifier()));
        let request = Request::builder()
            .method("POST")
            .uri("/saved-searches")
            .header("Authorization", bearer(UserRole::User))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"name":"   ","filters":{"city":"Ankara"}}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "E8002");
    }

    #[tokio::test]
    async fn negative_price_filter_is_rejected() {
        let app = crate::app_router(test_state(seeded_notifier()));
        let request = Request::builder()
            .method("POST")
            .uri("/saved-searches")
            .header("Authorization", bearer(UserRole::User))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"name":"Ucuz","filters":{"maxPrice":-1}}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "E8002");
        assert!(body["error"]["details"]["reason"]
            .as_str()
            .unwrap()
            .contains("prices must not be negative"));
    }

    #[test]
    fn fatal_job_errors_carry_their_cause() {
        let err = job_error(JobError::LoadSearches(crate::store::StoreError::Unavailable(
            "connection refused".into(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            AppError::Known { code, details, .. } => {
                assert_eq!(code, ErrorCode::NotificationJobFailed);
                assert_eq!(details.unwrap()["cause"], "store unavailable: connection refused");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
