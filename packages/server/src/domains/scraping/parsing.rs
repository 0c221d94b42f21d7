//! Listing-page parsing: CSS selectors from a source's config turn raw HTML
//! into normalized job postings.

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use typed_builder::TypedBuilder;
use url::Url;

/// Upper bound on pages followed through `nextPageSelector`
pub const MAX_PAGES_CAP: u32 = 50;

/// Per-source scraping configuration, stored as JSON text on the source.
///
/// Every key is optional; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceConfig {
    /// Matches one element per job posting
    pub listing_selector: String,
    /// Searched within each listing
    pub title_selector: String,
    pub link_selector: String,
    pub company_selector: Option<String>,
    pub location_selector: Option<String>,
    pub description_selector: Option<String>,
    /// Searched in the whole page for the link to the next listing page
    pub next_page_selector: Option<String>,
    pub max_pages: u32,
    /// Extra paths, relative to the base URL, fetched as listing pages
    pub paths: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_selector: "article, .job, .job-listing, li.job".to_string(),
            title_selector: "h2, h3, .title, .job-title".to_string(),
            link_selector: "a[href]".to_string(),
            company_selector: None,
            location_selector: None,
            description_selector: None,
            next_page_selector: None,
            max_pages: 1,
            paths: Vec::new(),
        }
    }
}

impl SourceConfig {
    /// Parse stored config text; `None` or blank yields the defaults.
    pub fn from_stored(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => serde_json::from_str(raw).context("Invalid source config"),
        }
    }

    /// Check every selector compiles.
    pub fn validate(&self) -> Result<()> {
        CompiledSelectors::compile(self).map(|_| ())
    }

    /// Pages to walk per starting URL, clamped to `1..=MAX_PAGES_CAP`.
    pub fn page_limit(&self) -> u32 {
        self.max_pages.clamp(1, MAX_PAGES_CAP)
    }
}

/// A normalized job posting found on a listing page
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct JobPosting {
    #[builder(setter(into))]
    pub title: String,
    /// Absolute URL of the posting
    #[builder(setter(into))]
    pub url: String,
    #[builder(default)]
    pub company: Option<String>,
    #[builder(default)]
    pub location: Option<String>,
    /// Markdown
    #[builder(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedListing {
    pub postings: Vec<JobPosting>,
    pub next_page: Option<Url>,
}

struct CompiledSelectors {
    listing: Selector,
    title: Selector,
    link: Selector,
    company: Option<Selector>,
    location: Option<Selector>,
    description: Option<Selector>,
    next_page: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            listing: compile("listingSelector", &config.listing_selector)?,
            title: compile("titleSelector", &config.title_selector)?,
            link: compile("linkSelector", &config.link_selector)?,
            company: compile_optional("companySelector", &config.company_selector)?,
            location: compile_optional("locationSelector", &config.location_selector)?,
            description: compile_optional("descriptionSelector", &config.description_selector)?,
            next_page: compile_optional("nextPageSelector", &config.next_page_selector)?,
        })
    }
}

fn compile(key: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("{} {:?} is not a valid selector: {:?}", key, selector, e))
}

fn compile_optional(key: &str, selector: &Option<String>) -> Result<Option<Selector>> {
    selector
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| compile(key, s))
        .transpose()
}

/// Extract job postings from one listing page.
///
/// Relative links resolve against `page_url`. Listings without a title or a
/// usable http(s) link are skipped, and each posting URL appears once.
pub fn parse_listing(html: &str, page_url: &Url, config: &SourceConfig) -> Result<ParsedListing> {
    let selectors = CompiledSelectors::compile(config)?;
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut postings = Vec::new();

    for listing in document.select(&selectors.listing) {
        let Some(title) = first_text(&listing, &selectors.title) else {
            continue;
        };

        let href = listing
            .value()
            .attr("href")
            .or_else(|| listing.select(&selectors.link).find_map(|a| a.value().attr("href")));
        let Some(url) = href.and_then(|h| resolve(page_url, h)) else {
            continue;
        };

        if !seen.insert(url.to_string()) {
            continue;
        }

        let company = selectors
            .company
            .as_ref()
            .and_then(|s| first_text(&listing, s));
        let location = selectors
            .location
            .as_ref()
            .and_then(|s| first_text(&listing, s));
        let description = selectors
            .description
            .as_ref()
            .and_then(|s| listing.select(s).next())
            .map(|el| html_to_markdown(&el.inner_html()))
            .filter(|md| !md.trim().is_empty());

        postings.push(
            JobPosting::builder()
                .title(title)
                .url(url.to_string())
                .company(company)
                .location(location)
                .description(description)
                .build(),
        );
    }

    let next_page = selectors
        .next_page
        .as_ref()
        .and_then(|s| document.select(s).find_map(|el| el.value().attr("href")))
        .and_then(|href| resolve(page_url, href))
        .filter(|next| next != page_url);

    Ok(ParsedListing {
        postings,
        next_page,
    })
}

/// Resolve `href` against `base`, keeping http(s) only and dropping fragments.
fn resolve(base: &Url, href: &str) -> Option<Url> {
    let mut url = base.join(href.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Whitespace-collapsed text of the first match, if non-empty.
fn first_text(scope: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
}

fn html_to_markdown(html: &str) -> String {
    htmd::convert(html)
        .unwrap_or_else(|_| {
            // Fallback: strip tags and return plain text
            let fragment = Html::parse_fragment(html);
            fragment.root_element().text().collect::<String>()
        })
        .trim()
        .to_string()
}
