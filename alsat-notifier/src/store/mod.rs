//! Read/write access to users, listings and saved searches as the
//! notification job needs it.
//!
//! [`PgStore`] is the production backend; [`MemoryStore`] backs tests and
//! local dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Listing, ListingStatus, SavedSearch, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection could be obtained.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Listing lookup pushed down to the store. Only exact-match criteria live
/// here; price ranges are applied in memory afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub status: ListingStatus,
    pub created_since: DateTime<Utc>,
    pub category_id: Option<i32>,
    pub city: Option<String>,
    pub district: Option<String>,
}

impl ListingQuery {
    pub fn matches(&self, listing: &Listing) -> bool {
        listing.has_status(self.status)
            && listing.created_at >= self.created_since
            && self.category_id.map_or(true, |c| listing.category_id == c)
            && self.city.as_deref().map_or(true, |c| listing.city == c)
            && self
                .district
                .as_deref()
                .map_or(true, |d| listing.district.as_deref() == Some(d))
    }
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Saved searches with email notifications on and the search active, in store order.
    async fn eligible_searches(&self) -> Result<Vec<SavedSearch>, StoreError>;

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, StoreError>;

    async fn find_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError>;

    /// Move the search's watermark to `notified_at`.
    ///
    /// Never moves it backwards: returns `Ok(false)` and leaves the row alone
    /// when the stored value is already at or past `notified_at`.
    async fn mark_notified(
        &self,
        search_id: i32,
        notified_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
