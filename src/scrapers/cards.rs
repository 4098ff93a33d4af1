use crate::models::RawFragment;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Listing card selectors, most specific first. The first one that matches wins.
const LISTING_CARD_SELECTORS: &[&str] = &[
    "[data-testid='listing-card']",
    ".listingCard",
    ".searchCardList--listItem",
    "article[class*='listing']",
    "div[class*='ListingCard']",
    ".srp-cards article",
];

/// Anything that shows the results have rendered
pub const CARDS_READY_SELECTOR: &str =
    "[data-testid='listing-card'], .listingCard, .searchCardList--listItem, article";

static CARD_SELECTORS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    LISTING_CARD_SELECTORS
        .iter()
        .map(|&css| {
            let selector = Selector::parse(css)
                .unwrap_or_else(|e| panic!("Failed to parse card selector {css} - this is a bug: {e:?}"));
            (css, selector)
        })
        .collect()
});

static LISTING_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href*='/rental/'], a[href*='/building/']")
        .expect("Failed to parse listing link selector - this is a bug")
});

/// Split a search results page into one fragment per listing card.
pub fn split_cards(page_html: &str) -> Vec<RawFragment> {
    let document = Html::parse_document(page_html);

    for (css, selector) in CARD_SELECTORS.iter() {
        let cards: Vec<ElementRef> = document.select(selector).collect();
        if cards.is_empty() {
            continue;
        }

        info!("Found {} listings with selector: {}", cards.len(), css);
        return cards
            .into_iter()
            .map(|card| RawFragment {
                text: visible_text(&card),
                html: card.inner_html(),
            })
            .collect();
    }

    let links = document.select(&LISTING_LINKS).count();
    warn!("No listing cards found, {} potential listing links on page", links);
    Vec::new()
}

/// Elements whose boundaries separate words in rendered text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "br", "dd", "div", "dt", "footer", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "ol", "p", "section", "td", "th", "tr", "ul",
];

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// Rendered text of an element with scripts and styles left out, whitespace collapsed.
///
/// Adjacent inline runs are joined as written (`<b>$</b><b>3,900</b>` reads `$3,900`);
/// block elements start and end a word.
pub fn visible_text(element: &ElementRef) -> String {
    let mut raw = String::new();
    push_text(*element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            push_text(el, out);
            if block {
                out.push(' ');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_matching_selector() {
        let page = r#"
            <html><body>
              <ul>
                <li data-testid="listing-card">
                  <a href="/rental/1">2 beds</a> <span>$4,100</span>
                </li>
                <li data-testid="listing-card">
                  <a href="/rental/2">3 beds</a>
                </li>
              </ul>
              <div class="listingCard">ignored, lower priority</div>
            </body></html>
        "#;

        let cards = split_cards(page);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].text, "2 beds $4,100");
        assert!(cards[0].html.contains(r#"href="/rental/1""#));
        assert_eq!(cards[1].text, "3 beds");
    }

    #[test]
    fn falls_back_to_later_selectors() {
        let page = r#"
            <div class="srp-cards">
              <article><a href="/rental/7">Studio</a></article>
            </div>
        "#;
        let cards = split_cards(page);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].text, "Studio");
    }

    #[test]
    fn page_without_cards() {
        let page = r#"<p>Please verify you are a human</p><a href="/rental/5">x</a>"#;
        assert!(split_cards(page).is_empty());
    }

    #[test]
    fn inline_runs_stay_joined() {
        let page = r#"
            <div class="listingCard"><a href="/rental/8">Unit</a> <b>$</b><b>3,900</b> · 2 beds</div>
        "#;
        let cards = split_cards(page);
        assert_eq!(cards[0].text, "Unit $3,900 · 2 beds");
    }

    #[test]
    fn block_boundaries_separate_words() {
        let page = r#"<div class="listingCard"><p>2 beds</p><p>1 bath</p><div>$4,000</div></div>"#;
        let cards = split_cards(page);
        assert_eq!(cards[0].text, "2 beds 1 bath $4,000");
    }

    #[test]
    fn visible_text_skips_scripts() {
        let page = r#"
            <div class="listingCard">
              <script>window.__data = {"beds": 9}</script>
              <style>.x { color: red }</style>
              <p>2 beds
                 · 1 bath</p>
            </div>
        "#;
        let cards = split_cards(page);
        assert_eq!(cards[0].text, "2 beds · 1 bath");
    }
}
