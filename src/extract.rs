//! Listing extraction from raw card fragments.
//!
//! Each field is resolved through a [`FieldChain`]: an ordered list of [`Strategy`]
//! values where the first one producing a value wins. Site markup changes between
//! versions and experiments, so every structural lookup has fallbacks and a missing
//! marker only leaves a field empty.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::config::SearchConfig;
use crate::error::ExtractError;
use crate::models::{Listing, RawFragment, EXCERPT_LEN};
use crate::parsers::{
    detect_laundry, detect_no_fee, generate_listing_id, parse_beds_baths,
    parse_net_effective_price, parse_price, parse_sqft,
};

const LISTING_LINK_SELECTORS: &[&str] = &["a[href*='/rental/']"];

const ADDRESS_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-address']",
    ".listingCard-addressLabel",
    ".address",
    "address",
];

const PRICE_SELECTORS: &[&str] = &[
    "[data-testid='listing-card-price']",
    ".listingCard-price",
    ".price",
    "span[class*='price']",
];

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").expect("Failed to parse anchor selector - this is a bug")
});

static CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d[\d,]*").expect("currency regex must compile"));

/// A fragment with its markup parsed once and shared by every strategy.
pub struct ParsedFragment<'a> {
    pub text: &'a str,
    pub markup: Html,
}

impl<'a> ParsedFragment<'a> {
    pub fn new(fragment: &'a RawFragment) -> Self {
        Self {
            text: &fragment.text,
            markup: Html::parse_fragment(&fragment.html),
        }
    }
}

/// One way of pulling a field value out of a fragment.
pub trait Strategy<T> {
    fn name(&self) -> &str;

    fn extract(&self, fragment: &ParsedFragment<'_>) -> Option<T>;
}

/// Text of the first element matching a CSS selector, run through a parser.
pub struct SelectorText<T> {
    css: &'static str,
    selector: Selector,
    parse: fn(&str) -> Option<T>,
}

impl<T> SelectorText<T> {
    pub fn new(css: &'static str, parse: fn(&str) -> Option<T>) -> Self {
        let selector = Selector::parse(css)
            .unwrap_or_else(|e| panic!("Failed to parse selector {css} - this is a bug: {e:?}"));
        Self {
            css,
            selector,
            parse,
        }
    }
}

impl<T> Strategy<T> for SelectorText<T> {
    fn name(&self) -> &str {
        self.css
    }

    fn extract(&self, fragment: &ParsedFragment<'_>) -> Option<T> {
        let element = fragment.markup.select(&self.selector).next()?;
        let text = element.text().collect::<String>();
        (self.parse)(text.trim())
    }
}

/// First non-empty attribute value among elements matching a CSS selector.
pub struct SelectorAttr {
    css: &'static str,
    selector: Selector,
    attr: &'static str,
}

impl SelectorAttr {
    pub fn new(css: &'static str, attr: &'static str) -> Self {
        let selector = Selector::parse(css)
            .unwrap_or_else(|e| panic!("Failed to parse selector {css} - this is a bug: {e:?}"));
        Self {
            css,
            selector,
            attr,
        }
    }
}

impl Strategy<String> for SelectorAttr {
    fn name(&self) -> &str {
        self.css
    }

    fn extract(&self, fragment: &ParsedFragment<'_>) -> Option<String> {
        fragment
            .markup
            .select(&self.selector)
            .filter_map(|el| el.value().attr(self.attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(String::from)
    }
}

/// Any link pointing at the listing site: site-relative paths or hrefs naming the host.
pub struct OnSiteAnchor {
    host: String,
}

impl OnSiteAnchor {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    fn is_on_site(&self, href: &str) -> bool {
        (href.starts_with('/') && !href.starts_with("//"))
            || (!self.host.is_empty() && href.contains(&self.host))
    }
}

impl Strategy<String> for OnSiteAnchor {
    fn name(&self) -> &str {
        "on-site anchor"
    }

    fn extract(&self, fragment: &ParsedFragment<'_>) -> Option<String> {
        fragment
            .markup
            .select(&ANCHOR)
            .filter_map(|el| el.value().attr("href"))
            .map(str::trim)
            .find(|href| self.is_on_site(href))
            .map(String::from)
    }
}

/// First regex match in the visible text, run through a parser.
pub struct TextPattern<T> {
    name: &'static str,
    pattern: &'static Regex,
    parse: fn(&str) -> Option<T>,
}

impl<T> TextPattern<T> {
    pub fn new(name: &'static str, pattern: &'static Regex, parse: fn(&str) -> Option<T>) -> Self {
        Self {
            name,
            pattern,
            parse,
        }
    }
}

impl<T> Strategy<T> for TextPattern<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn extract(&self, fragment: &ParsedFragment<'_>) -> Option<T> {
        let m = self.pattern.find(fragment.text)?;
        (self.parse)(m.as_str())
    }
}

/// Ordered fallback chain for a single field.
pub struct FieldChain<T> {
    field: &'static str,
    strategies: Vec<Box<dyn Strategy<T>>>,
}

impl<T> FieldChain<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl Strategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Value from the first strategy that yields one.
    pub fn resolve(&self, fragment: &ParsedFragment<'_>) -> Option<T> {
        self.strategies.iter().find_map(|strategy| {
            let value = strategy.extract(fragment);
            if value.is_some() {
                debug!(field = self.field, strategy = strategy.name(), "field resolved");
            }
            value
        })
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// "crown-heights" -> "Crown Heights"
fn slug_label(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns raw card fragments into normalized listings.
pub struct ListingExtractor {
    base_url: Url,
    neighborhoods: Vec<(String, String)>,
    default_region: String,
    url_chain: FieldChain<String>,
    address_chain: FieldChain<String>,
    price_chain: FieldChain<i64>,
}

impl ListingExtractor {
    pub fn new(config: &SearchConfig) -> Self {
        let host = config.base_url.host_str().unwrap_or_default().to_string();

        let mut url_chain = FieldChain::new("url");
        for &css in LISTING_LINK_SELECTORS {
            url_chain = url_chain.then(SelectorAttr::new(css, "href"));
        }
        let url_chain = url_chain.then(OnSiteAnchor::new(host));

        let mut address_chain = FieldChain::new("address");
        for &css in ADDRESS_SELECTORS {
            address_chain = address_chain.then(SelectorText::new(css, non_empty));
        }

        let mut price_chain = FieldChain::new("price");
        for &css in PRICE_SELECTORS {
            price_chain = price_chain.then(SelectorText::new(css, parse_price));
        }
        let price_chain = price_chain.then(TextPattern::new("currency scan", &CURRENCY, parse_price));

        Self {
            base_url: config.base_url.clone(),
            neighborhoods: config
                .neighborhoods
                .iter()
                .map(|slug| (slug.to_lowercase(), slug_label(slug)))
                .collect(),
            default_region: config.default_region.clone(),
            url_chain,
            address_chain,
            price_chain,
        }
    }

    /// Build a listing from one fragment.
    ///
    /// Returns `Ok(None)` when the fragment has no listing link, which means it is not a
    /// listing at all.
    pub fn extract(&self, fragment: &RawFragment) -> Result<Option<Listing>, ExtractError> {
        let parsed = ParsedFragment::new(fragment);

        let Some(href) = self.url_chain.resolve(&parsed) else {
            return Ok(None);
        };
        let url = self
            .base_url
            .join(&href)
            .map_err(|source| ExtractError::UnresolvableUrl {
                href: href.clone(),
                source,
            })?
            .to_string();

        let text = parsed.text;
        let price = self.price_chain.resolve(&parsed);
        let (beds, baths) = parse_beds_baths(text);

        Ok(Some(Listing {
            id: generate_listing_id(&url),
            address: self.address_chain.resolve(&parsed),
            neighborhood: self.neighborhood_for(&url),
            price,
            net_price: parse_net_effective_price(text).or(price),
            beds,
            baths,
            sqft: parse_sqft(text),
            has_laundry: detect_laundry(text) || detect_laundry(&fragment.html),
            is_no_fee: detect_no_fee(text),
            raw_excerpt: text.chars().take(EXCERPT_LEN).collect(),
            url,
        }))
    }

    pub fn neighborhood_for(&self, url: &str) -> String {
        let lower = url.to_lowercase();
        self.neighborhoods
            .iter()
            .find(|(slug, _)| lower.contains(slug.as_str()))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| self.default_region.clone())
    }
}
