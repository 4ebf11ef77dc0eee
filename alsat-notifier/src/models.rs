use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

use crate::schema::{listings, saved_searches, users};

// --- Users ---

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: String,
}

impl User {
    /// Email address usable for delivery, if any.
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

// --- Listings ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Sold,
    Deleted,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = listings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Listing {
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub title: String,
    pub price: i64,
    pub currency: String,
    pub city: String,
    pub district: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn has_status(&self, status: ListingStatus) -> bool {
        self.status == status.as_str()
    }
}

// --- Saved searches ---

/// Criteria a saved search matches listings against. Absent fields match anything.
///
/// Stored as JSON text in `saved_searches.filters`; keys are camelCase as
/// written by the web client, snake_case is accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchFilters {
    #[serde(default, alias = "category_id", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i32>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, alias = "min_price", skip_serializing_if = "Option::is_none")]
    pub min_price: Option<i64>,
    #[serde(default, alias = "max_price", skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

impl SavedSearchFilters {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn has_negative_price(&self) -> bool {
        self.min_price.is_some_and(|p| p < 0) || self.max_price.is_some_and(|p| p < 0)
    }

    pub fn to_json(&self) -> String {
        // Plain struct of options and strings; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = saved_searches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SavedSearch {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub filters: String,
    pub email_notifications: bool,
    pub is_active: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedSearch {
    pub fn is_eligible(&self) -> bool {
        self.email_notifications && self.is_active
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = saved_searches)]
pub struct NewSavedSearch {
    pub user_id: i32,
    pub name: String,
    pub filters: String,
    pub email_notifications: bool,
}

/// Saved search as returned to its owner, with filters decoded.
#[derive(Debug, Serialize)]
pub struct SavedSearchView {
    pub id: i32,
    pub name: String,
    pub filters: serde_json::Value,
    pub email_notifications: bool,
    pub is_active: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SavedSearch> for SavedSearchView {
    fn from(search: SavedSearch) -> Self {
        // A malformed blob is shown as-is rather than failing the whole listing.
        let filters = serde_json::from_str(&search.filters)
            .unwrap_or(serde_json::Value::String(search.filters.clone()));
        Self {
            id: search.id,
            name: search.name,
            filters,
            email_notifications: search.email_notifications,
            is_active: search.is_active,
            last_notified_at: search.last_notified_at,
            created_at: search.created_at,
        }
    }
}
