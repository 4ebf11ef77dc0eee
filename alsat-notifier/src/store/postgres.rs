use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Timestamptz};

use alsat_shared::clients::db::DbPool;

use super::{ListingQuery, NotificationStore, StoreError};
use crate::models::{Listing, SavedSearch, User};
use crate::schema::{listings, saved_searches, users};

/// Diesel/Postgres backend. Queries run on the blocking pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| {
                tracing::error!(error = %e, "failed to get db connection");
                StoreError::Unavailable(e.to_string())
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn eligible_searches(&self) -> Result<Vec<SavedSearch>, StoreError> {
        self.run(|conn| {
            let searches: Vec<SavedSearch> = saved_searches::table
                .filter(saved_searches::email_notifications.eq(true))
                .filter(saved_searches::is_active.eq(true))
                .order(saved_searches::id.asc())
                .select(SavedSearch::as_select())
                .load(conn)?;
            Ok(searches)
        })
        .await
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, StoreError> {
        self.run(move |conn| {
            let user: Option<User> = users::table
                .find(user_id)
                .select(User::as_select())
                .first(conn)
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn find_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError> {
        let query = query.clone();
        self.run(move |conn| {
            let mut sql = listings::table
                .select(Listing::as_select())
                .filter(listings::status.eq(query.status.as_str()))
                .filter(listings::created_at.ge(query.created_since))
                .into_boxed();

            if let Some(category_id) = query.category_id {
                sql = sql.filter(listings::category_id.eq(category_id));
            }
            if let Some(city) = query.city {
                sql = sql.filter(listings::city.eq(city));
            }
            if let Some(district) = query.district {
                sql = sql.filter(listings::district.eq(district));
            }

            let rows: Vec<Listing> = sql.order(listings::created_at.asc()).load(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn mark_notified(
        &self,
        search_id: i32,
        notified_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.run(move |conn| {
            let updated = diesel::sql_query(
                "UPDATE saved_searches \
                 SET last_notified_at = $1, updated_at = NOW() \
                 WHERE id = $2 \
                 AND (last_notified_at IS NULL OR last_notified_at < $1)",
            )
            .bind::<Timestamptz, _>(notified_at)
            .bind::<Integer, _>(search_id)
            .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }
}
