use chrono::{DateTime, Duration, Utc};

use crate::jobs::matcher;
use crate::models::{Listing, ListingStatus, SavedSearchFilters};
use crate::store::{ListingQuery, NotificationStore, StoreError};

/// Earliest creation time a listing may have to be considered.
///
/// The later of the search's watermark and `now - lookback`.
pub fn window_start(
    last_notified_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: Duration,
) -> DateTime<Utc> {
    let floor = now - lookback;
    match last_notified_at {
        Some(watermark) if watermark > floor => watermark,
        _ => floor,
    }
}

/// Active listings inside the window that match `filters`.
///
/// Category, city and district are pushed down to the store; the price range
/// is applied here. An unreachable store yields no candidates.
pub async fn find_candidates(
    store: &dyn NotificationStore,
    filters: &SavedSearchFilters,
    last_notified_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Result<Vec<Listing>, StoreError> {
    let query = ListingQuery {
        status: ListingStatus::Active,
        created_since: window_start(last_notified_at, now, lookback),
        category_id: filters.category_id,
        city: filters.city.clone(),
        district: filters.district.clone(),
    };

    let listings = match store.find_listings(&query).await {
        Ok(listings) => listings,
        Err(e) if e.is_unavailable() => {
            tracing::warn!(error = %e, "listing store unavailable, no candidates");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    Ok(matcher::narrow(filters, listings))
}
