use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://streeteasy.com";

/// Search criteria and targets for one scrape cycle.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Human readable search name
    pub name: String,
    /// Search result pages to scrape
    pub targets: Vec<String>,
    /// Site root, used to resolve relative links
    pub base_url: Url,
    /// Known neighborhood URL slugs, checked in order
    pub neighborhoods: Vec<String>,
    /// Label used when no neighborhood slug matches
    pub default_region: String,
    pub min_beds: u32,
    pub max_beds: u32,
    pub min_baths: f64,
    /// Compared against net effective rent when known
    pub max_price: i64,
    /// Nice-to-have keywords, never used to reject
    pub preferred_features: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            name: "Crown Heights 2BR+ near Franklin Ave".to_string(),
            targets: vec![
                "https://streeteasy.com/for-rent/crown-heights/price:-4500%7Cbeds:2".to_string(),
                "https://streeteasy.com/for-rent/crown-heights/price:-4500%7Cbeds:3".to_string(),
                "https://streeteasy.com/for-rent/prospect-heights/price:-4500%7Cbeds:2"
                    .to_string(),
            ],
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            neighborhoods: vec!["crown-heights".to_string(), "prospect-heights".to_string()],
            default_region: "Brooklyn".to_string(),
            min_beds: 2,
            max_beds: 4,
            min_baths: 1.0,
            max_price: 4500,
            preferred_features: ["laundry", "washer", "dryer", "w/d", "in-unit"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SearchConfig {
    /// Load a search configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search config {}", path.display()))?;
        let config: SearchConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid search config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_beds > self.max_beds {
            bail!(
                "min_beds ({}) is greater than max_beds ({})",
                self.min_beds,
                self.max_beds
            );
        }
        if self.base_url.host_str().is_none() {
            bail!("base_url {} has no host", self.base_url);
        }
        Ok(())
    }
}

/// Where listing cards are fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Browser,
    Http,
}

/// Process settings read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub search_config: Option<PathBuf>,
    pub source: SourceKind,
    pub debug_dir: Option<PathBuf>,
    pub output_path: PathBuf,
    pub dry_run: bool,
    pub target_delay: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source = match var("SCOUT_SOURCE").as_deref().map(str::to_lowercase) {
            None => SourceKind::Browser,
            Some(s) if s == "browser" => SourceKind::Browser,
            Some(s) if s == "http" => SourceKind::Http,
            Some(other) => bail!("SCOUT_SOURCE must be 'browser' or 'http', got '{}'", other),
        };

        let dry_run = match var("SCOUT_DRY_RUN") {
            None => false,
            Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        };

        let target_delay = match var("SCOUT_TARGET_DELAY_SECS") {
            None => Duration::from_secs(3),
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("SCOUT_TARGET_DELAY_SECS is not a number: {}", v))?,
            ),
        };

        Ok(Self {
            db_path: var("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("apartments.db")),
            search_config: var("SCOUT_SEARCH_CONFIG").map(PathBuf::from),
            source,
            debug_dir: var("SCOUT_DEBUG_DIR").map(PathBuf::from),
            output_path: var("SCOUT_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("new_listings.json")),
            dry_run,
            target_delay,
        })
    }

    /// The configured search, or the built-in default when no file is set.
    pub fn load_search_config(&self) -> Result<SearchConfig> {
        match &self.search_config {
            Some(path) => SearchConfig::from_file(path),
            None => Ok(SearchConfig::default()),
        }
    }
}
