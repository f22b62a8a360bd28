//! Per-entity extraction from the directory listing
//!
//! Pages are obtained through a [`PageSession`], which returns the settled
//! markup of a URL. The default [`HttpPageSession`] issues plain GET requests;
//! a headless-browser session can implement the same trait when the listing
//! needs script execution.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DirectoryError;
use super::{DirectoryLocale, Language, ServiceRecord, derive_acronym};

/// Source of rendered pages; one session serves several concurrent loads
pub trait PageSession: Send + Sync {
    /// Markup of `url` once the page has finished loading
    fn render(&self, url: &str) -> impl Future<Output = Result<String, DirectoryError>> + Send;
}

/// Page session backed by plain HTTP requests
#[derive(Debug, Clone)]
pub struct HttpPageSession {
    client: Client,
}

impl HttpPageSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PageSession for HttpPageSession {
    async fn render(&self, url: &str) -> Result<String, DirectoryError> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html)
    }
}

fn compile(selector: &str) -> Result<Selector, DirectoryError> {
    Selector::parse(selector).map_err(|e| DirectoryError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Compiled locators of one locale
#[derive(Debug)]
struct Locators {
    locale: &'static DirectoryLocale,
    listing_anchor: Selector,
    name: Selector,
    address: Selector,
    hours: Selector,
    phone: Selector,
    anchors: Selector,
}

impl Locators {
    fn compile(locale: &'static DirectoryLocale) -> Result<Self, DirectoryError> {
        Ok(Self {
            locale,
            listing_anchor: compile(locale.listing_anchor_selector)?,
            name: compile(locale.name_selector)?,
            address: compile(locale.address_selector)?,
            hours: compile(locale.hours_selector)?,
            phone: compile(locale.phone_selector)?,
            anchors: compile("a")?,
        })
    }
}

fn is_block(name: &str) -> bool {
    matches!(name, "p" | "div" | "li" | "ul" | "ol" | "section" | "h1" | "h2" | "h3" | "h4")
}

/// Rendered text of an element: `<br>` and block boundaries become line breaks,
/// other whitespace collapses, blank lines are dropped
fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => {
                let mut last_space = false;
                for c in text.chars() {
                    if c.is_whitespace() {
                        if !last_space {
                            raw.push(' ');
                        }
                        last_space = true;
                    } else {
                        raw.push(c);
                        last_space = false;
                    }
                }
            }
            Node::Element(el) if el.name() == "br" || is_block(el.name()) => raw.push('\n'),
            _ => {}
        }
    }
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

/// Extracts service ids and records for both languages
#[derive(Debug)]
pub struct DirectoryExtractor<S> {
    session: S,
    base_domain: String,
    fr: Locators,
    en: Locators,
}

impl<S: PageSession> DirectoryExtractor<S> {
    /// Compile the locale tables for `base_domain`
    pub fn new(session: S, base_domain: &str) -> Result<Self, DirectoryError> {
        Ok(Self {
            session,
            base_domain: base_domain.trim_end_matches('/').to_string(),
            fr: Locators::compile(Language::Fr.locale())?,
            en: Locators::compile(Language::En.locale())?,
        })
    }

    fn locators(&self, language: Language) -> &Locators {
        match language {
            Language::Fr => &self.fr,
            Language::En => &self.en,
        }
    }

    /// Listing page of a language
    pub fn listing_url(&self, language: Language) -> String {
        format!("{}{}", self.base_domain, language.locale().listing_path)
    }

    async fn render(&self, url: &str, timeout: Duration) -> Result<String, DirectoryError> {
        tokio::time::timeout(timeout, self.session.render(url))
            .await
            .map_err(|_| DirectoryError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            })?
    }

    /// Service ids from the `id` attribute of the listing anchors
    pub fn parse_listing(&self, html: &str, language: Language) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut ids = Vec::new();
        for anchor in document.select(&self.locators(language).listing_anchor) {
            match anchor.value().id() {
                Some(id) if !id.trim().is_empty() => ids.push(id.trim().to_string()),
                _ => warn!("Listing entry without an id: {}", inner_text(anchor)),
            }
        }
        ids
    }

    /// Load the listing page and collect its service ids
    #[instrument(skip(self))]
    pub async fn discover_service_ids(
        &self,
        language: Language,
        timeout: Duration,
    ) -> Result<Vec<String>, DirectoryError> {
        let url = self.listing_url(language);
        let html = self.render(&url, timeout).await?;
        let ids = self.parse_listing(&html, language);
        if ids.is_empty() {
            return Err(DirectoryError::EmptyListing(url));
        }
        info!("Found {} services on {}", ids.len(), url);
        Ok(ids)
    }

    /// Read the fields of an entity page.
    ///
    /// Absent fields hold the not-available sentinel; links are resolved
    /// against the entity URL.
    pub fn parse_entity(
        &self,
        html: &str,
        service_id: &str,
        entity_url: &str,
        language: Language,
    ) -> ServiceRecord {
        let locators = self.locators(language);
        let locale = locators.locale;
        let document = Html::parse_document(html);
        let field = |selector: &Selector| {
            first_text(&document, selector).unwrap_or_else(|| locale.not_available.to_string())
        };

        let name = field(&locators.name);
        let acronym = derive_acronym(&name);
        let base = Url::parse(entity_url).ok();

        let mut contact_link = locale.not_available.to_string();
        let mut organization_page_link = locale.not_available.to_string();
        for anchor in document.select(&locators.anchors) {
            let text = inner_text(anchor);
            let href = anchor
                .value()
                .attr("href")
                .filter(|h| !h.trim().is_empty())
                .map(|h| match &base {
                    Some(base) => base.join(h.trim()).map(|u| u.to_string()).unwrap_or_else(|_| h.to_string()),
                    None => h.to_string(),
                })
                .unwrap_or_else(|| locale.not_available.to_string());

            if text.contains(locale.contact_link_label) {
                contact_link = href;
            } else if text.contains(locale.organization_link_label) {
                organization_page_link = href;
            }
        }

        ServiceRecord {
            service_id: service_id.to_string(),
            acronym,
            address: field(&locators.address),
            opening_hours: field(&locators.hours),
            phone: field(&locators.phone),
            name,
            contact_link,
            organization_page_link,
            language,
        }
    }

    /// Navigate to the entity and extract it, surfacing failures
    pub async fn try_extract_entity(
        &self,
        service_id: &str,
        listing_url: &str,
        language: Language,
        timeout: Duration,
    ) -> Result<ServiceRecord, DirectoryError> {
        let url = format!("{}?entity={}", listing_url, service_id);
        let html = self.render(&url, timeout).await?;
        let record = self.parse_entity(&html, service_id, &url, language);
        debug!("Extracted {} ({}) [{}]", record.name, record.acronym, language);
        Ok(record)
    }

    /// Extract an entity; any failure degrades to a sentinel record
    pub async fn extract_entity(
        &self,
        service_id: &str,
        listing_url: &str,
        language: Language,
        timeout: Duration,
    ) -> ServiceRecord {
        match self
            .try_extract_entity(service_id, listing_url, language, timeout)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to extract service {} [{}]: {}", service_id, language, e);
                ServiceRecord::failed(service_id, language)
            }
        }
    }
}
