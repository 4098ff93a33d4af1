use crate::config::SearchConfig;
use crate::models::Listing;

/// Decide whether a listing matches the search criteria.
///
/// Only values that are present can reject a listing: an unknown price, bed count or
/// bath count never fails its check.
pub fn keep(listing: &Listing, config: &SearchConfig) -> bool {
    if let Some(price) = listing.effective_price() {
        if price > config.max_price {
            return false;
        }
    }

    if let Some(beds) = listing.beds {
        if beds < config.min_beds || beds > config.max_beds {
            return false;
        }
    }

    if let Some(baths) = listing.baths {
        if baths < config.min_baths {
            return false;
        }
    }

    true
}

/// Preferred feature keywords mentioned in the listing excerpt.
pub fn preferred_hits<'c>(listing: &Listing, config: &'c SearchConfig) -> Vec<&'c str> {
    let excerpt = listing.raw_excerpt.to_lowercase();
    config
        .preferred_features
        .iter()
        .map(String::as_str)
        .filter(|kw| excerpt.contains(&kw.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::listing;

    fn criteria() -> SearchConfig {
        SearchConfig {
            max_price: 4500,
            min_beds: 2,
            max_beds: 4,
            min_baths: 1.0,
            ..SearchConfig::default()
        }
    }

    fn with(price: Option<i64>, beds: Option<u32>, baths: Option<f64>) -> Listing {
        Listing {
            price,
            net_price: price,
            beds,
            baths,
            ..listing("se_1")
        }
    }

    #[test]
    fn criteria_scenario() {
        let config = criteria();
        assert!(!keep(&with(Some(5000), Some(2), Some(1.0)), &config));
        assert!(keep(&with(Some(4000), Some(3), Some(1.0)), &config));
        assert!(keep(&with(Some(4000), Some(2), None), &config));
    }

    #[test]
    fn absent_fields_never_reject() {
        let config = criteria();
        assert!(keep(&with(None, None, None), &config));
        assert!(keep(&with(None, Some(3), None), &config));
        assert!(keep(&with(Some(4500), None, None), &config));
    }

    #[test]
    fn bed_range_is_inclusive() {
        let config = criteria();
        assert!(keep(&with(None, Some(2), None), &config));
        assert!(keep(&with(None, Some(4), None), &config));
        assert!(!keep(&with(None, Some(1), None), &config));
        assert!(!keep(&with(None, Some(5), None), &config));
        assert!(!keep(&with(None, Some(0), None), &config));
    }

    #[test]
    fn half_baths_below_minimum() {
        let mut config = criteria();
        config.min_baths = 1.5;
        assert!(!keep(&with(None, None, Some(1.0)), &config));
        assert!(keep(&with(None, None, Some(1.5)), &config));
    }

    #[test]
    fn net_effective_rent_is_compared() {
        let config = criteria();
        let mut l = with(Some(4700), Some(2), Some(1.0));
        assert!(!keep(&l, &config));
        l.net_price = Some(4300);
        assert!(keep(&l, &config));
    }

    #[test]
    fn preferred_features_are_advisory() {
        let config = criteria();
        let mut l = with(Some(5000), Some(2), Some(1.0));
        l.raw_excerpt = "Renovated, In-Unit Washer and Dryer".to_string();
        assert_eq!(preferred_hits(&l, &config), vec!["washer", "dryer", "in-unit"]);
        assert!(!keep(&l, &config));
    }
}
