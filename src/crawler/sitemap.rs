//! Sitemap loading
//!
//! A source is either an `http(s)://` URL or a local file path. Every element
//! whose local name ends in `loc` contributes its trimmed text as one URL.
//! A source that cannot be read or parsed is logged and skipped; the others
//! still count.

use std::collections::BTreeSet;

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use tracing::{error, info, instrument};

use crate::crawler::error::CrawlError;

/// Collect every `<loc>` value of an XML document
pub fn parse_locs(xml: &str) -> Result<Vec<String>, CrawlError> {
    let mut reader = Reader::from_str(xml);
    let mut urls = Vec::new();
    let mut depth_in_loc = 0usize;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref().ends_with(b"loc") {
                    depth_in_loc += 1;
                    current.clear();
                }
            }
            Ok(Event::Text(e)) if depth_in_loc > 0 => {
                let text = e
                    .unescape()
                    .map_err(|e| CrawlError::Sitemap(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(e)) if depth_in_loc > 0 => {
                current.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(e)) => {
                if depth_in_loc > 0 && e.local_name().as_ref().ends_with(b"loc") {
                    depth_in_loc -= 1;
                    let url = current.trim();
                    if !url.is_empty() {
                        urls.push(url.to_string());
                    }
                    current.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CrawlError::Sitemap(format!(
                    "malformed XML at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(urls)
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Read one sitemap source and return its URLs
#[instrument(skip(client))]
pub async fn read_sitemap(client: &Client, source: &str) -> Result<Vec<String>, CrawlError> {
    let xml = if is_remote(source) {
        client
            .get(source)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?
    } else {
        tokio::fs::read_to_string(source).await?
    };
    parse_locs(&xml)
}

/// Load and deduplicate the URLs of every source.
///
/// The result is sorted; sitemap order carries no meaning.
pub async fn load_urls_from_sitemaps(client: &Client, sources: &[String]) -> Vec<String> {
    let mut urls = BTreeSet::new();
    for source in sources {
        match read_sitemap(client, source).await {
            Ok(found) => {
                info!("Loaded {} URLs from {}", found.len(), source);
                urls.extend(found);
            }
            Err(e) => error!("Failed to read sitemap {}: {}", source, e),
        }
    }
    info!("{} distinct URLs across {} sitemaps", urls.len(), sources.len());
    urls.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url><loc> https://monservicepublic.gouv.mc/thematiques/logement </loc></url>
  <url><loc>https://monservicepublic.gouv.mc/a-propos?x=1&amp;y=2</loc>
    <image:image><image:loc>https://monservicepublic.gouv.mc/img.png</image:loc></image:image>
  </url>
  <url><loc></loc><lastmod>2024-01-01</lastmod></url>
</urlset>"#;

    #[test]
    fn test_parse_locs_matches_suffix_and_trims() {
        let urls = parse_locs(SITEMAP).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://monservicepublic.gouv.mc/thematiques/logement",
                "https://monservicepublic.gouv.mc/a-propos?x=1&y=2",
                "https://monservicepublic.gouv.mc/img.png",
            ]
        );
    }

    #[test]
    fn test_parse_locs_rejects_broken_xml() {
        assert!(matches!(
            parse_locs("<urlset><url><loc>a</url>"),
            Err(CrawlError::Sitemap(_))
        ));
    }

    #[tokio::test]
    async fn test_sources_are_tolerant_and_deduplicated() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body("<urlset><url><loc>https://a.example/1</loc></url><url><loc>https://a.example/2</loc></url></urlset>")
            .create_async()
            .await;
        server
            .mock("GET", "/broken.xml")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("local.xml");
        tokio::fs::write(&local, "<urlset><url><loc>https://a.example/2</loc></url></urlset>")
            .await
            .unwrap();

        let sources = vec![
            format!("{}/sitemap.xml", server.url()),
            format!("{}/broken.xml", server.url()),
            local.to_string_lossy().to_string(),
            dir.path().join("absent.xml").to_string_lossy().to_string(),
        ];
        let client = Client::new();
        let urls = load_urls_from_sitemaps(&client, &sources).await;

        assert_eq!(urls, vec!["https://a.example/1", "https://a.example/2"]);
    }
}
