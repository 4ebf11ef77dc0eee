use crate::models::{Listing, SavedSearchFilters};

/// Whether `listing` satisfies every criterion present in `filters`.
///
/// Missing criteria match anything. Price bounds are inclusive; an inverted
/// range (`min_price > max_price`) simply never matches.
pub fn matches(filters: &SavedSearchFilters, listing: &Listing) -> bool {
    if let Some(category_id) = filters.category_id {
        if listing.category_id != category_id {
            return false;
        }
    }
    if let Some(city) = filters.city.as_deref() {
        if listing.city != city {
            return false;
        }
    }
    if let Some(district) = filters.district.as_deref() {
        if listing.district.as_deref() != Some(district) {
            return false;
        }
    }
    if let Some(min) = filters.min_price {
        if listing.price < min {
            return false;
        }
    }
    if let Some(max) = filters.max_price {
        if listing.price > max {
            return false;
        }
    }
    true
}

/// Keep only the listings matching `filters`, preserving order.
pub fn narrow(filters: &SavedSearchFilters, listings: Vec<Listing>) -> Vec<Listing> {
    listings.into_iter().filter(|l| matches(filters, l)).collect()
}
