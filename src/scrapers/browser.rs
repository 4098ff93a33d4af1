use crate::models::RawFragment;
use crate::scrapers::cards::{split_cards, CARDS_READY_SELECTOR};
use crate::scrapers::traits::FragmentSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long to wait for the first listing card to render
const CARD_WAIT: Duration = Duration::from_secs(15);

/// Extra time for lazy-loaded card content after the first card shows up
const SETTLE: Duration = Duration::from_secs(3);

/// Listing cards rendered by headless Chrome
pub struct BrowserSource {
    browser: Browser,
    debug_dir: Option<PathBuf>,
}

impl BrowserSource {
    /// Launch a headless browser. Page HTML and screenshots go to `debug_dir` when set.
    pub fn new(debug_dir: Option<PathBuf>) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        if let Some(dir) = &debug_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create debug dir {}", dir.display()))?;
        }

        Ok(Self { browser, debug_dir })
    }
}

#[async_trait]
impl FragmentSource for BrowserSource {
    async fn fetch(&self, target: &str) -> Result<Vec<RawFragment>> {
        let browser = self.browser.clone();
        let url = target.to_string();
        let debug_dir = self.debug_dir.clone();

        let html = tokio::task::spawn_blocking(move || {
            capture_page(&browser, &url, debug_dir.as_deref())
        })
        .await
        .context("Browser task panicked")??;

        debug!("Captured {} bytes of HTML from {}", html.len(), target);
        Ok(split_cards(&html))
    }

    fn source_name(&self) -> &'static str {
        "browser"
    }
}

/// Render `url` in a fresh tab and return the page HTML. The tab is closed on every path.
fn capture_page(browser: &Browser, url: &str, debug_dir: Option<&Path>) -> Result<String> {
    info!("Fetching: {}", url);
    let tab = browser.new_tab().context("Failed to open browser tab")?;

    let result = render(&tab, url, debug_dir);

    if let Err(e) = tab.close(true) {
        debug!("Failed to close tab: {}", e);
    }

    result
}

fn render(tab: &Tab, url: &str, debug_dir: Option<&Path>) -> Result<String> {
    tab.navigate_to(url)
        .with_context(|| format!("Failed to navigate to {}", url))?;
    tab.wait_until_navigated()
        .with_context(|| format!("Navigation to {} did not finish", url))?;

    if tab
        .wait_for_element_with_custom_timeout(CARDS_READY_SELECTOR, CARD_WAIT)
        .is_err()
    {
        warn!("Timeout waiting for listings, checking page anyway...");
    }
    thread::sleep(SETTLE);

    let html = match tab
        .evaluate("document.documentElement.outerHTML", false)?
        .value
    {
        Some(value) => value.as_str().unwrap_or("").to_string(),
        None => {
            warn!("Could not get HTML from page");
            String::new()
        }
    };

    if let Some(dir) = debug_dir {
        if let Err(e) = save_debug_capture(tab, dir, &html) {
            warn!("Failed to save debug capture: {:#}", e);
        }
    }

    Ok(html)
}

fn save_debug_capture(tab: &Tab, dir: &Path, html: &str) -> Result<()> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");

    let html_path = dir.join(format!("page_{}.html", stamp));
    std::fs::write(&html_path, html)?;

    let screenshot = tab.capture_screenshot(
        Page::CaptureScreenshotFormatOption::Png,
        None,
        None,
        true,
    )?;
    let png_path = dir.join(format!("page_{}.png", stamp));
    std::fs::write(&png_path, screenshot)?;

    info!("Screenshot saved: {}", png_path.display());
    Ok(())
}
