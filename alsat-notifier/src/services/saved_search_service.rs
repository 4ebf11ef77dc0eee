use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use alsat_shared::clients::db::DbPool;
use alsat_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{NewSavedSearch, SavedSearch, SavedSearchFilters};
use crate::schema::saved_searches;

fn conn(pool: &DbPool) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
    pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        AppError::new(ErrorCode::ServiceUnavailable, "database connection error")
    })
}

fn not_found(err: diesel::result::Error) -> AppError {
    match err {
        diesel::result::Error::NotFound => {
            AppError::new(ErrorCode::SavedSearchNotFound, "saved search not found")
        }
        other => AppError::Database(other),
    }
}

/// List a user's saved searches, newest first.
pub fn list_saved_searches(
    pool: &DbPool,
    user_id: i32,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<SavedSearch>, i64)> {
    let mut conn = conn(pool)?;

    let total: i64 = saved_searches::table
        .filter(saved_searches::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)?;

    let items = saved_searches::table
        .filter(saved_searches::user_id.eq(user_id))
        .order((saved_searches::created_at.desc(), saved_searches::id.desc()))
        .limit(limit)
        .offset(offset)
        .select(SavedSearch::as_select())
        .load(&mut conn)?;

    Ok((items, total))
}

pub fn create_saved_search(
    pool: &DbPool,
    user_id: i32,
    name: &str,
    filters: &SavedSearchFilters,
    email_notifications: bool,
) -> AppResult<SavedSearch> {
    let mut conn = conn(pool)?;

    let new_search = NewSavedSearch {
        user_id,
        name: name.to_string(),
        filters: filters.to_json(),
        email_notifications,
    };

    let search = diesel::insert_into(saved_searches::table)
        .values(&new_search)
        .returning(SavedSearch::as_returning())
        .get_result(&mut conn)?;

    tracing::debug!(search_id = search.id, user_id, "saved search created");
    Ok(search)
}

/// Delete a saved search owned by `user_id`.
pub fn delete_saved_search(pool: &DbPool, search_id: i32, user_id: i32) -> AppResult<()> {
    let mut conn = conn(pool)?;

    let deleted = diesel::delete(
        saved_searches::table
            .filter(saved_searches::id.eq(search_id))
            .filter(saved_searches::user_id.eq(user_id)),
    )
    .execute(&mut conn)?;

    if deleted == 0 {
        return Err(AppError::new(ErrorCode::SavedSearchNotFound, "saved search not found"));
    }
    tracing::debug!(search_id, user_id, "saved search deleted");
    Ok(())
}

pub fn set_email_notifications(
    pool: &DbPool,
    search_id: i32,
    user_id: i32,
    enabled: bool,
) -> AppResult<SavedSearch> {
    let mut conn = conn(pool)?;

    diesel::update(
        saved_searches::table
            .filter(saved_searches::id.eq(search_id))
            .filter(saved_searches::user_id.eq(user_id)),
    )
    .set((
        saved_searches::email_notifications.eq(enabled),
        saved_searches::updated_at.eq(diesel::dsl::now),
    ))
    .returning(SavedSearch::as_returning())
    .get_result(&mut conn)
    .map_err(not_found)
}

pub fn set_active(pool: &DbPool, search_id: i32, user_id: i32, active: bool) -> AppResult<SavedSearch> {
    let mut conn = conn(pool)?;

    diesel::update(
        saved_searches::table
            .filter(saved_searches::id.eq(search_id))
            .filter(saved_searches::user_id.eq(user_id)),
    )
    .set((
        saved_searches::is_active.eq(active),
        saved_searches::updated_at.eq(diesel::dsl::now),
    ))
    .returning(SavedSearch::as_returning())
    .get_result(&mut conn)
    .map_err(not_found)
}
