use std::collections::HashSet;

use crate::models::Listing;

/// Collapse a batch to one listing per id, keeping the first occurrence and input order.
pub fn dedupe(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| seen.insert(listing.id.clone()))
        .collect()
}
