//! HTTP access for the crawl stage

use reqwest::Client;
use tracing::{debug, instrument};

use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;

/// A fetched page, consumed by the sanitizer and then dropped
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub html: String,
}

/// Build the shared HTTP client.
///
/// Certificate validation is disabled when configured; the target site is
/// reached through a chain the default trust store rejects.
pub fn build_client(config: &CrawlerConfig) -> Result<Client, CrawlError> {
    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()?;
    Ok(client)
}

/// GET a page; any non-2xx status is an error
#[instrument(skip(client))]
pub async fn fetch_page(client: &Client, url: &str) -> Result<RawPage, CrawlError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            CrawlError::Timeout(url.to_string())
        } else {
            CrawlError::Http(e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(CrawlError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let html = response.text().await?;
    debug!("Fetched {} bytes", html.len());
    Ok(RawPage {
        url: url.to_string(),
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_page_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>ok</body></html>")
            .create_async()
            .await;

        let client = build_client(&CrawlerConfig::default()).unwrap();
        let url = format!("{}/page", server.url());
        let page = fetch_page(&client, &url).await.unwrap();

        assert_eq!(page.url, url);
        assert!(page.html.contains("ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_page_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let client = build_client(&CrawlerConfig::default()).unwrap();
        let result = fetch_page(&client, &format!("{}/missing", server.url())).await;

        match result {
            Err(CrawlError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected status error, got {:?}", other),
        }
    }
}
