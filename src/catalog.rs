//! # Site Catalog Module
//!
//! Static routing tables for the crawled site: which URLs belong to which topic
//! category, which URLs are "fixed" pages filed under the general namespace, and
//! which URLs point at the directory of government services.
//!
//! The tables are data, not logic. `SiteCatalog::default()` carries the built-in
//! table for `monservicepublic.gouv.mc`; `SiteCatalog::from_json_file` replaces it
//! without recompiling when the site reorganises its sections.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Namespace used for pages listed in the fixed-URL table
pub const GENERAL_NAMESPACE: &str = "general";

/// Namespace (and output folder) used for directory records
pub const DIRECTORY_NAMESPACE: &str = "annuaire";

/// Coarse namespace every non-general folder collapses into at load time
pub const CHILD_NAMESPACE: &str = "child";

/// Topic label attached to directory documents at load time
pub const DIRECTORY_TOPIC: &str = "Annuaire administratif";

const BASE_DOMAIN: &str = "https://monservicepublic.gouv.mc";

const TOPICS: &[(&str, &[&str])] = &[
    (
        "Transport et Mobilité",
        &["/thematiques/transports-et-mobilite", "/en/themes/transport-and-mobility"],
    ),
    (
        "Nationalité et residence",
        &["/thematiques/nationalite-et-residence", "/en/themes/nationality-and-residency"],
    ),
    ("Logement", &["/thematiques/logement", "/en/themes/housing"]),
    ("Emploie", &["/thematiques/emploi", "/en/themes/employment"]),
    (
        "Securite et prevention",
        &["/thematiques/securite-et-prevention", "/en/themes/security-and-prevention"],
    ),
    ("Justice", &["/thematiques/justice", "/en/themes/justice"]),
    (
        "Social-sante-et-famille",
        &["/thematiques/social-sante-et-famille", "/en/themes/social-health-and-families"],
    ),
    ("Education", &["/thematiques/education", "/en/themes/education"]),
    ("Fiscalite", &["/thematiques/fiscalite", "/en/themes/tax"]),
    ("Temps libre", &["/thematiques/temps-libre", "/en/themes/free-time"]),
    (
        "Relations avec l'administration",
        &[
            "/thematiques/relations-avec-l-administration",
            "/en/themes/you-and-the-government-services",
        ],
    ),
    (
        "Associations et fondations",
        &["/thematiques/associations-et-fondations", "/en/themes/associations-and-foundations"],
    ),
    (
        "EdV je m installe a monaco",
        &["/evenements-de-vie/je-m-installe-a-monaco", "/en/events-in-your-life/settling-in-monaco"],
    ),
    (
        "EdV je demenage",
        &["/evenements-de-vie/je-demenage", "/en/events-in-your-life/moving-house"],
    ),
    (
        "EdV j attends un enfant",
        &["/evenements-de-vie/j-attends-un-enfant", "/en/events-in-your-life/expecting-a-baby"],
    ),
    (
        "EdV je deviens ecoresponsable",
        &[
            "/evenements-de-vie/je-deviens-ecoresponsable",
            "/en/events-in-your-life/becoming-environmentally-responsible",
        ],
    ),
];

const FIXED: &[(&str, &str)] = &[
    ("/thematiques/transports-et-mobilite", "Transport et Mobilité"),
    ("/en/themes/transport-and-mobility", "Transport et Mobilité"),
    ("/thematiques", "Toutes les Thematique"),
    ("/en/themes", "Toutes les Thematique"),
    ("/thematiques/nationalite-et-residence", "Nationalité et residence"),
    ("/en/themes/nationality-and-residency", "Nationalité et residence"),
    ("/thematiques/logement", "Logement"),
    ("/en/themes/housing", "Logement"),
    ("/thematiques/emploi", "Emploie"),
    ("/en/themes/employment", "Emploie"),
    ("/thematiques/securite-et-prevention", "Securite et prevention"),
    ("/en/themes/security-and-prevention", "Securite et prevention"),
    ("/thematiques/justice", "Justice"),
    ("/en/themes/justice", "Justice"),
    ("/thematiques/social-sante-et-famille", "Social-sante-et-famille"),
    ("/en/themes/social-health-and-families", "Social-sante-et-famille"),
    ("/thematiques/education", "Education"),
    ("/en/themes/education", "Education"),
    ("/thematiques/fiscalite", "Fiscalite"),
    ("/en/themes/tax", "Fiscalite"),
    ("/thematiques/temps-libre", "Temps libre"),
    ("/en/themes/free-time", "Temps libre"),
    ("/thematiques/relations-avec-l-administration", "Relations avec l'administration"),
    ("/en/themes/you-and-the-government-services", "Relations avec l'administration"),
    ("/thematiques/associations-et-fondations", "Associations et fondations"),
    ("/en/themes/associations-and-foundations", "Associations et fondations"),
    ("/evenements-de-vie", "All Evenement de vie"),
    ("/en/events-in-your-life", "All Evenement de vie"),
    ("/evenements-de-vie/je-m-installe-a-monaco", "EdV je m installe a monaco"),
    ("/en/events-in-your-life/settling-in-monaco", "EdV je m installe a monaco"),
    ("/evenements-de-vie/je-demenage", "EdV je demenage"),
    ("/en/events-in-your-life/moving-house", "EdV je demenage"),
    ("/evenements-de-vie/j-attends-un-enfant", "EdV j attends un enfant"),
    ("/en/events-in-your-life/expecting-a-baby", "EdV j attends un enfant"),
    ("/evenements-de-vie/je-deviens-ecoresponsable", "EdV je deviens ecoresponsable"),
    (
        "/en/events-in-your-life/becoming-environmentally-responsible",
        "EdV je deviens ecoresponsable",
    ),
    ("/annuaire-des-services-administratifs", "Annuaire administratif & site lie"),
    ("/sites-lies", "Annuaire administratif & site lie"),
    ("/actualites?query=&limit=60&sort_by=date_desc", "Actualités & Agenda"),
    ("/agenda?query=&limit=60&sort_by=date_asc", "Actualités & Agenda"),
    ("/", "Accueil & A propos"),
    ("/a-propos", "Accueil & A propos"),
    ("/en", "Accueil & A propos"),
    ("/en/about", "Accueil & A propos"),
    ("/dernieres-mises-a-jour", "Derniere mises à jour"),
    ("/en/latest-updates", "Derniere mises à jour"),
];

const DIRECTORY_PATTERNS: &[&str] = &[
    "annuaire-des-services-administratifs",
    "directory-of-government-services",
];

/// A topic category and the URL substrings that select it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCategory {
    /// Category name, also used as the output folder name
    pub name: String,

    /// Substrings; a URL containing any of them belongs to the category
    pub patterns: Vec<String>,
}

/// An exact URL filed under the general namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedUrl {
    /// Exact URL
    pub url: String,

    /// Topic label attached to the document at load time
    pub topic: String,
}

/// Routing tables for one site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCatalog {
    /// Site root, e.g. `https://monservicepublic.gouv.mc`
    pub base_domain: String,

    /// Topic categories in priority order
    pub topics: Vec<TopicCategory>,

    /// Exact-match pages filed under the general namespace
    pub fixed_urls: Vec<FixedUrl>,

    /// Substrings identifying the directory of government services
    pub directory_patterns: Vec<String>,
}

impl Default for SiteCatalog {
    fn default() -> Self {
        Self::for_base(BASE_DOMAIN)
    }
}

impl SiteCatalog {
    /// Build the built-in table rooted at another origin.
    ///
    /// Used to point the crawler at a mirror or a local test server.
    pub fn for_base(base_domain: &str) -> Self {
        let base = base_domain.trim_end_matches('/');
        let absolute = |path: &str| format!("{}{}", base, path);

        Self {
            base_domain: base.to_string(),
            topics: TOPICS
                .iter()
                .map(|(name, patterns)| TopicCategory {
                    name: name.to_string(),
                    patterns: patterns.iter().map(|p| absolute(p)).collect(),
                })
                .collect(),
            fixed_urls: FIXED
                .iter()
                .map(|(path, topic)| FixedUrl {
                    url: absolute(path),
                    topic: topic.to_string(),
                })
                .collect(),
            directory_patterns: DIRECTORY_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Load a catalog from a JSON file
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let catalog: SiteCatalog = serde_json::from_str(&raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        if self.directory_patterns.iter().any(|p| p.is_empty()) {
            return Err(Error::Catalog("empty directory pattern".to_string()));
        }
        for topic in &self.topics {
            if topic.name.is_empty() || topic.name.contains(['/', '\\']) {
                return Err(Error::Catalog(format!(
                    "topic name {:?} cannot be used as a folder name",
                    topic.name
                )));
            }
            if topic.patterns.iter().any(|p| p.is_empty()) {
                return Err(Error::Catalog(format!("empty pattern in topic {}", topic.name)));
            }
        }
        Ok(())
    }

    /// Whether the URL points at the directory of government services
    pub fn is_directory_url(&self, url: &str) -> bool {
        self.directory_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    /// Topic label of an exact fixed-URL entry
    pub fn fixed_topic(&self, url: &str) -> Option<&str> {
        self.fixed_urls
            .iter()
            .find(|fixed| fixed.url == url)
            .map(|fixed| fixed.topic.as_str())
    }
}
