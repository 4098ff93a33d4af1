//! Field parsers turning loose listing text into typed values.
//!
//! None of these fail: text that doesn't contain the value yields `None` (or `false`).

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Prefix shared by every listing id
pub const ID_PREFIX: &str = "se_";

/// Hex characters kept from the URL digest when no numeric id is present
const HASH_ID_LEN: usize = 12;

const LAUNDRY_KEYWORDS: &[&str] = &[
    "washer",
    "dryer",
    "w/d",
    "laundry in unit",
    "in-unit laundry",
    "washing machine",
    "laundry in-unit",
];

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit run regex must compile"));

static BEDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*bed").expect("beds regex must compile"));

static BATHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*bath").expect("baths regex must compile")
});

static SQFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*)\s*(?:ft²|sq\.?\s*ft|square\s+feet)")
        .expect("sqft regex must compile")
});

static NET_EFFECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(\d[\d,]*)\s*net\s*effective").expect("net effective regex must compile")
});

static TRAILING_NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)(?:\?|$)").expect("listing id regex must compile"));

/// Parse a rent amount like `$4,500` or `4500/mo`.
pub fn parse_price(text: &str) -> Option<i64> {
    let cleaned = text.replace(',', "");
    DIGIT_RUN
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
}

/// Extract bedroom and bathroom counts from text like `2 beds · 1.5 baths`.
///
/// A studio is reported as 0 beds.
pub fn parse_beds_baths(text: &str) -> (Option<u32>, Option<f64>) {
    let beds = match BEDS.captures(text) {
        Some(caps) => caps[1].parse().ok(),
        None if text.to_lowercase().contains("studio") => Some(0),
        None => None,
    };

    let baths = BATHS
        .captures(text)
        .and_then(|caps| caps[1].parse().ok());

    (beds, baths)
}

pub fn parse_sqft(text: &str) -> Option<u32> {
    SQFT.captures(text)
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
}

/// Net effective rent advertised as `$3,900 net effective`.
pub fn parse_net_effective_price(text: &str) -> Option<i64> {
    NET_EFFECTIVE
        .captures(text)
        .and_then(|caps| parse_price(&caps[1]))
}

pub fn detect_laundry(text: &str) -> bool {
    let lower = text.to_lowercase();
    LAUNDRY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn detect_no_fee(text: &str) -> bool {
    text.to_lowercase().contains("no fee")
}

/// Stable listing id for a URL.
///
/// Uses the trailing numeric path segment when there is one, otherwise a truncated
/// SHA-256 digest of the whole URL.
pub fn generate_listing_id(url: &str) -> String {
    if let Some(caps) = TRAILING_NUMERIC_ID.captures(url) {
        return format!("{}{}", ID_PREFIX, &caps[1]);
    }

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}{}", ID_PREFIX, &digest[..HASH_ID_LEN])
}
