//! # Directory of Government Services
//!
//! Structured scraping of the site's service directory. The listing is a
//! dynamic page that selects one entity through `?entity={id}`; each entity is
//! extracted into a [`ServiceRecord`] in French (the reference language) and in
//! English, and the two passes are reconciled by service id.
//!
//! Everything that depends on the site's markup or wording lives in the
//! per-language [`DirectoryLocale`] tables below.

mod error;
pub mod extractor;
pub mod reconcile;
pub mod render;

pub use error::DirectoryError;
pub use extractor::{DirectoryExtractor, HttpPageSession, PageSession};
pub use reconcile::{ReconcileConfig, ReconcileReport, ReconciliationCache, Reconciler};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language of a directory pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Fr,
    En,
}

impl Language {
    /// Upper-case code used in file names
    pub fn code(self) -> &'static str {
        match self {
            Language::Fr => "FR",
            Language::En => "EN",
        }
    }

    /// Markup and wording for this language
    pub fn locale(self) -> &'static DirectoryLocale {
        match self {
            Language::Fr => &FR_LOCALE,
            Language::En => &EN_LOCALE,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Site markup and wording for one language.
///
/// Revision `version` of the table; bump it when the site changes its markup.
#[derive(Debug)]
pub struct DirectoryLocale {
    pub version: u32,
    pub language: Language,

    /// Path of the listing page, appended to the site base domain
    pub listing_path: &'static str,

    /// Anchors of the listing; their `id` attribute is the service id
    pub listing_anchor_selector: &'static str,
    pub name_selector: &'static str,
    pub address_selector: &'static str,
    pub hours_selector: &'static str,
    pub phone_selector: &'static str,

    /// Visible text of the "write to us" link on an entity page
    pub contact_link_label: &'static str,
    /// Visible text of the "organization page" link on an entity page
    pub organization_link_label: &'static str,

    pub acronym_label: &'static str,
    pub address_label: &'static str,
    pub hours_label: &'static str,
    pub phone_label: &'static str,
    pub contact_label: &'static str,
    pub organization_label: &'static str,
    /// Text of the rendered organization-page link
    pub organization_link_text: &'static str,

    /// Sentinel for a field the page does not provide
    pub not_available: &'static str,
    /// Sentinel for every text field when extraction failed
    pub extraction_error: &'static str,

    pub listing_title: &'static str,
    pub listing_intro: &'static str,
}

pub static FR_LOCALE: DirectoryLocale = DirectoryLocale {
    version: 1,
    language: Language::Fr,
    listing_path: "/annuaire-des-services-administratifs",
    listing_anchor_selector: "div.space-y-2 a",
    name_selector: "div.text-xl.font-bold",
    address_selector: "div.text-secondary > p",
    hours_selector: "p.font-normal.text-secondary.pr-16",
    phone_selector: "div.font-semibold.text-interaction > a[href^='tel:']",
    contact_link_label: "Nous écrire",
    organization_link_label: "Voir la page de l'entité",
    acronym_label: "Acronyme",
    address_label: "Adresse",
    hours_label: "Horaires d'ouverture",
    phone_label: "Téléphone",
    contact_label: "Nous écrire",
    organization_label: "Voir la page de l'entité",
    organization_link_text: "Page de l'entité",
    not_available: "Information non disponible",
    extraction_error: "Erreur lors de l'extraction des données",
    listing_title: "Annuaire des Services Administratifs",
    listing_intro: "Liste complète des services administratifs de Monaco.",
};

pub static EN_LOCALE: DirectoryLocale = DirectoryLocale {
    version: 1,
    language: Language::En,
    listing_path: "/en/directory-of-government-services",
    listing_anchor_selector: "div.space-y-2 a",
    name_selector: "div.text-xl.font-bold",
    address_selector: "div.text-secondary > p",
    hours_selector: "p.font-normal.text-secondary.pr-16",
    phone_selector: "div.font-semibold.text-interaction > a[href^='tel:']",
    contact_link_label: "Contact us",
    organization_link_label: "View organization page",
    acronym_label: "Acronym",
    address_label: "Address",
    hours_label: "Opening hours",
    phone_label: "Phone",
    contact_label: "Contact us",
    organization_label: "View organization page",
    organization_link_text: "Organization page",
    not_available: "Information not available",
    extraction_error: "Error extracting data",
    listing_title: "Directory of Government Services",
    listing_intro: "Complete list of Monaco's government services.",
};

/// Whether `value` is one of the sentinels of any language
pub fn is_sentinel(value: &str) -> bool {
    [&FR_LOCALE, &EN_LOCALE]
        .iter()
        .any(|l| value == l.not_available || value == l.extraction_error)
}

/// Upper-case letters of `name`, or its first three characters upper-cased
pub fn derive_acronym(name: &str) -> String {
    let acronym: String = name.chars().filter(|c| c.is_uppercase()).collect();
    if acronym.is_empty() {
        name.chars().take(3).collect::<String>().to_uppercase()
    } else {
        acronym
    }
}

/// One entity of the directory, in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service_id: String,
    pub name: String,
    pub acronym: String,
    pub address: String,
    pub opening_hours: String,
    pub phone: String,
    /// URL or the not-available sentinel
    pub contact_link: String,
    /// URL or the not-available sentinel
    pub organization_page_link: String,
    pub language: Language,
}

impl ServiceRecord {
    /// Placeholder for an entity whose page could not be extracted
    pub fn failed(service_id: &str, language: Language) -> Self {
        let locale = language.locale();
        let prefix: String = service_id.chars().take(2).collect();
        Self {
            service_id: service_id.to_string(),
            name: format!("Service {}", service_id),
            acronym: format!("S{}", prefix),
            address: locale.extraction_error.to_string(),
            opening_hours: locale.extraction_error.to_string(),
            phone: locale.extraction_error.to_string(),
            contact_link: locale.not_available.to_string(),
            organization_page_link: locale.not_available.to_string(),
            language,
        }
    }

    /// Required fields still holding a sentinel (or empty)
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("acronym", &self.acronym),
            ("address", &self.address),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty() || is_sentinel(value))
        .map(|(field, _)| field)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acronym_from_capitals() {
        assert_eq!(derive_acronym("Direction des Services Informatiques"), "DSI");
    }

    #[test]
    fn test_acronym_fallback() {
        assert_eq!(derive_acronym("service"), "SER");
        assert_eq!(derive_acronym("éb"), "ÉB");
    }

    #[test]
    fn test_failed_record_is_complete() {
        let record = ServiceRecord::failed("4217", Language::En);
        assert_eq!(record.name, "Service 4217");
        assert_eq!(record.acronym, "S42");
        for value in [
            &record.address,
            &record.opening_hours,
            &record.phone,
            &record.contact_link,
            &record.organization_page_link,
        ] {
            assert!(!value.is_empty());
            assert!(is_sentinel(value));
        }
        assert_eq!(record.address, "Error extracting data");
        assert_eq!(record.missing_fields(), vec!["address", "phone"]);
    }

    #[test]
    fn test_locale_tables() {
        assert_eq!(Language::Fr.locale().contact_link_label, "Nous écrire");
        assert_eq!(Language::En.locale().not_available, "Information not available");
        assert_eq!(Language::En.to_string(), "EN");
    }
}
