//! URL classification into output namespaces
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. directory pattern (substring) -> [`DIRECTORY_NAMESPACE`]
//! 2. exact fixed-URL entry -> [`GENERAL_NAMESPACE`]
//! 3. topic category pattern (substring, declaration order) -> category name
//! 4. nothing -> `None`, the URL is not processed

use std::fmt;

use crate::catalog::{DIRECTORY_NAMESPACE, GENERAL_NAMESPACE, SiteCatalog};

/// Where a URL is filed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Directory of government services
    Directory,
    /// Fixed pages
    General,
    /// A named topic category
    Topic(String),
}

impl Namespace {
    /// Folder / partition name
    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Directory => DIRECTORY_NAMESPACE,
            Namespace::General => GENERAL_NAMESPACE,
            Namespace::Topic(name) => name,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL paired with its namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedUrl {
    pub url: String,
    pub namespace: Namespace,
}

/// Classify a URL against the catalog
pub fn classify(catalog: &SiteCatalog, url: &str) -> Option<Namespace> {
    if catalog.is_directory_url(url) {
        return Some(Namespace::Directory);
    }

    if catalog.fixed_urls.iter().any(|fixed| fixed.url == url) {
        return Some(Namespace::General);
    }

    catalog
        .topics
        .iter()
        .find(|topic| topic.patterns.iter().any(|p| url.contains(p.as_str())))
        .map(|topic| Namespace::Topic(topic.name.clone()))
}

/// Classify every URL, returning the kept pairs and the skipped URLs
pub fn classify_all<I>(catalog: &SiteCatalog, urls: I) -> (Vec<ClassifiedUrl>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut kept = Vec::new();
    let mut skipped = Vec::new();
    for url in urls {
        match classify(catalog, &url) {
            Some(namespace) => kept.push(ClassifiedUrl { url, namespace }),
            None => skipped.push(url),
        }
    }
    (kept, skipped)
}
