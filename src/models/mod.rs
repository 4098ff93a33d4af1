use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in `Listing::raw_excerpt`
pub const EXCERPT_LEN: usize = 500;

/// One candidate listing as handed over by a content source: the visible text of the
/// card and the markup of the same element.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawFragment {
    pub text: String,
    pub html: String,
}

impl RawFragment {
    pub fn new(text: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: html.into(),
        }
    }
}

/// All fragments collected from a single search target
#[derive(Debug, Clone, Default)]
pub struct TargetBatch {
    pub target: String,
    pub fragments: Vec<RawFragment>,
}

/// Normalized rental listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub url: String,
    pub address: Option<String>,
    pub neighborhood: String,
    /// Nominal monthly rent
    pub price: Option<i64>,
    /// Net effective rent, equal to `price` unless a "net effective" amount was advertised
    pub net_price: Option<i64>,
    /// 0 for a studio
    pub beds: Option<u32>,
    pub baths: Option<f64>,
    pub sqft: Option<u32>,
    pub has_laundry: bool,
    pub is_no_fee: bool,
    pub raw_excerpt: String,
}

impl Listing {
    /// Rent used for criteria checks and ordering.
    pub fn effective_price(&self) -> Option<i64> {
        self.net_price.or(self.price)
    }
}

/// Store-side projection of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub listing: Listing,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl ListingRecord {
    pub fn first_sighting(listing: &Listing, observed_at: DateTime<Utc>) -> Self {
        Self {
            listing: listing.clone(),
            first_seen: observed_at,
            last_seen: observed_at,
        }
    }

    /// Merge a repeat sighting into the stored record.
    ///
    /// Only `last_seen`, `price` and `net_price` follow the incoming listing; `first_seen`
    /// and every other field keep the values from the first sighting.
    pub fn merge(&self, incoming: &Listing, observed_at: DateTime<Utc>) -> Self {
        let mut merged = self.clone();
        merged.last_seen = observed_at;
        merged.listing.price = incoming.price;
        merged.listing.net_price = incoming.net_price;
        merged
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertKind {
    NewListing,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::NewListing => "new_listing",
        }
    }
}

/// Entry of the append-only audit log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    pub listing_id: String,
    pub kind: AlertKind,
    pub message: String,
}

impl AlertEvent {
    pub fn new_listing(listing: &Listing, timestamp: DateTime<Utc>) -> Self {
        let price = listing
            .effective_price()
            .map(|p| format!("${}", p))
            .unwrap_or_else(|| "price n/a".to_string());
        let beds = match listing.beds {
            Some(0) => "studio".to_string(),
            Some(n) => format!("{} bed", n),
            None => "? bed".to_string(),
        };

        Self {
            timestamp,
            listing_id: listing.id.clone(),
            kind: AlertKind::NewListing,
            message: format!(
                "{} · {} · {} · {}",
                price, beds, listing.neighborhood, listing.url
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Listing;

    pub fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            url: format!("https://streeteasy.com/rental/{}", id.trim_start_matches("se_")),
            address: Some("1 Franklin Ave".to_string()),
            neighborhood: "Crown Heights".to_string(),
            price: Some(4000),
            net_price: Some(4000),
            beds: Some(2),
            baths: Some(1.0),
            sqft: None,
            has_laundry: false,
            is_no_fee: false,
            raw_excerpt: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::listing;
    use super::*;
    use chrono::Duration;

    #[test]
    fn effective_price_prefers_net() {
        let mut l = listing("se_1");
        l.price = Some(4200);
        l.net_price = Some(3900);
        assert_eq!(l.effective_price(), Some(3900));

        l.net_price = None;
        assert_eq!(l.effective_price(), Some(4200));
    }

    #[test]
    fn merge_updates_only_mutable_fields() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(6);
        let original = listing("se_1");
        let record = ListingRecord::first_sighting(&original, t0);

        let mut incoming = original.clone();
        incoming.price = Some(3800);
        incoming.net_price = Some(3600);
        incoming.address = Some("somewhere else".to_string());
        incoming.beds = Some(3);
        incoming.has_laundry = true;

        let merged = record.merge(&incoming, t1);
        assert_eq!(merged.first_seen, t0);
        assert_eq!(merged.last_seen, t1);
        assert_eq!(merged.listing.price, Some(3800));
        assert_eq!(merged.listing.net_price, Some(3600));
        assert_eq!(merged.listing.address, original.address);
        assert_eq!(merged.listing.beds, Some(2));
        assert!(!merged.listing.has_laundry);
    }

    #[test]
    fn new_listing_alert_message() {
        let mut l = listing("se_42");
        l.beds = Some(0);
        let alert = AlertEvent::new_listing(&l, Utc::now());
        assert_eq!(alert.listing_id, "se_42");
        assert_eq!(alert.kind.as_str(), "new_listing");
        assert!(alert.message.starts_with("$4000 · studio · Crown Heights"));
    }
}
