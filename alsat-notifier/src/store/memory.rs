use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ListingQuery, NotificationStore, StoreError};
use crate::models::{Listing, SavedSearch, User};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    listings: BTreeMap<i32, Listing>,
    searches: BTreeMap<i32, SavedSearch>,
}

/// In-process store with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    failing_listing_cities: Mutex<HashSet<String>>,
    failing_watermarks: Mutex<HashSet<i32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    pub fn insert_user(&self, user: User) {
        if let Ok(mut tables) = self.tables() {
            tables.users.insert(user.id, user);
        }
    }

    pub fn insert_listing(&self, listing: Listing) {
        if let Ok(mut tables) = self.tables() {
            tables.listings.insert(listing.id, listing);
        }
    }

    pub fn insert_search(&self, search: SavedSearch) {
        if let Ok(mut tables) = self.tables() {
            tables.searches.insert(search.id, search);
        }
    }

    pub fn search(&self, id: i32) -> Option<SavedSearch> {
        self.tables().ok()?.searches.get(&id).cloned()
    }

    /// Every call fails with [`StoreError::Unavailable`] while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Listing queries for `city` fail with a backend error.
    pub fn fail_listings_in(&self, city: &str) {
        if let Ok(mut cities) = self.failing_listing_cities.lock() {
            cities.insert(city.to_string());
        }
    }

    /// Watermark updates for `search_id` fail with a backend error.
    pub fn fail_watermark_for(&self, search_id: i32) {
        if let Ok(mut ids) = self.failing_watermarks.lock() {
            ids.insert(search_id);
        }
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn eligible_searches(&self) -> Result<Vec<SavedSearch>, StoreError> {
        self.check_online()?;
        Ok(self
            .tables()?
            .searches
            .values()
            .filter(|s| s.is_eligible())
            .cloned()
            .collect())
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        Ok(self.tables()?.users.get(&user_id).cloned())
    }

    async fn find_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, StoreError> {
        self.check_online()?;
        if let Some(city) = &query.city {
            let failing = self
                .failing_listing_cities
                .lock()
                .map(|c| c.contains(city))
                .unwrap_or(false);
            if failing {
                return Err(StoreError::Backend(format!("listing query for {city} timed out")));
            }
        }

        let mut rows: Vec<Listing> = self
            .tables()?
            .listings
            .values()
            .filter(|l| query.matches(l))
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.created_at);
        Ok(rows)
    }

    async fn mark_notified(
        &self,
        search_id: i32,
        notified_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        let failing = self
            .failing_watermarks
            .lock()
            .map(|ids| ids.contains(&search_id))
            .unwrap_or(false);
        if failing {
            return Err(StoreError::Backend(format!("update of saved search {search_id} rejected")));
        }

        let mut tables = self.tables()?;
        let Some(search) = tables.searches.get_mut(&search_id) else {
            return Ok(false);
        };
        if search.last_notified_at.is_some_and(|prev| prev >= notified_at) {
            return Ok(false);
        }
        search.last_notified_at = Some(notified_at);
        search.updated_at = notified_at;
        Ok(true)
    }
}
