use std::time::Duration;

use gouvcrawl::catalog::SiteCatalog;
use gouvcrawl::crawler::TreeStats;
use gouvcrawl::events::{CrawlEvent, Phase};
use gouvcrawl::index::JsonExport;
use gouvcrawl::pipeline::{Pipeline, PipelineConfig};
use gouvcrawl::processor::ChunkedDocument;

fn page(title: &str) -> String {
    format!(
        "<html><head><style>p {{}}</style></head><body>\
         <header><a href=\"/\">Accueil</a></header>\
         <main><h1>{}</h1><p>Les informations <a href=\"/contact\">nous contacter</a></p>\
         <ul><li>premier</li><li>second</li></ul></main>\
         <footer>Pied de page</footer></body></html>",
        title
    )
}

#[tokio::test]
async fn test_sitemap_to_chunks() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    let housing = format!("{}/thematiques/logement/aides", base);
    let about = format!("{}/a-propos", base);
    let unmatched = format!("{}/actualites/fete", base);

    let locs: String = [&housing, &about, &unmatched]
        .iter()
        .map(|u| format!("<url><loc> {} </loc></url>", u))
        .collect();
    server
        .mock("GET", "/sitemap.xml")
        .with_body(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            locs
        ))
        .create_async()
        .await;
    server
        .mock("GET", "/thematiques/logement/aides")
        .with_body(page("Aides au logement"))
        .create_async()
        .await;
    server
        .mock("GET", "/a-propos")
        .with_body(page("A propos"))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .sitemaps([format!("{}/sitemap.xml", base)])
        .output_root(dir.path().join("output"))
        .workers(2)
        .build();
    let sink = JsonExport::new(dir.path().join("chunks.json"));

    let (pipeline, mut rx) = Pipeline::new(config, SiteCatalog::for_base(&base))
        .unwrap()
        .subscribe(64);
    let summary = pipeline.run(&sink).await.unwrap();
    drop(pipeline);

    let crawl = summary.crawl.unwrap();
    assert_eq!(crawl.total_urls, 3);
    assert_eq!(crawl.processed, 2);
    assert!(crawl.failed.is_empty());
    assert_eq!(crawl.skipped, vec![unmatched]);
    assert_eq!(crawl.stats, TreeStats { directories: 2, files: 2 });
    assert!(dir.path().join("output/general").is_dir());
    assert!(dir.path().join("output/Logement").is_dir());

    assert_eq!(summary.chunks, 2);
    let publish = summary.publish.unwrap();
    assert_eq!(publish.namespaces["general"], 1);
    assert_eq!(publish.namespaces["child"], 1);

    let raw = tokio::fs::read_to_string(sink.path()).await.unwrap();
    let chunks: Vec<ChunkedDocument> = serde_json::from_str(&raw).unwrap();
    let about_chunk = chunks.iter().find(|c| c.metadata.url == about).unwrap();
    assert_eq!(about_chunk.metadata.namespace, "general");
    assert_eq!(about_chunk.metadata.topic, "Accueil & A propos");
    assert!(about_chunk.text.contains("# A propos"));
    assert!(about_chunk.text.contains(&format!("nous contacter [{}/contact]", base)));
    assert!(!about_chunk.text.contains("Pied de page"));

    let housing_chunk = chunks.iter().find(|c| c.metadata.url == housing).unwrap();
    assert_eq!(housing_chunk.metadata.namespace, "child");
    assert_eq!(housing_chunk.metadata.topic, "monservicepublic");
    assert!(housing_chunk.text.contains("- premier"));

    let mut phases = Vec::new();
    while let Some(event) = rx.recv().await {
        if let CrawlEvent::PhaseStarted { phase } = event {
            phases.push(phase);
        }
    }
    assert_eq!(phases, vec![Phase::Crawl, Phase::Load, Phase::Index]);
}

#[tokio::test]
async fn test_unread_subscription_does_not_stall_run() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    let locs: String = (0..4)
        .map(|i| format!("<url><loc>{}/thematiques/logement/page-{}</loc></url>", base, i))
        .collect();
    server
        .mock("GET", "/sitemap.xml")
        .with_body(format!("<urlset>{}</urlset>", locs))
        .create_async()
        .await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/thematiques/logement/page-\d$".to_string()))
        .with_body(page("Logement"))
        .expect(4)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .sitemaps([format!("{}/sitemap.xml", base)])
        .output_root(dir.path().join("output"))
        .build();
    let sink = JsonExport::new(dir.path().join("chunks.json"));

    // the receiver is held but never read
    let (pipeline, _rx) = Pipeline::new(config, SiteCatalog::for_base(&base))
        .unwrap()
        .subscribe(1);
    let summary = tokio::time::timeout(Duration::from_secs(10), pipeline.run(&sink))
        .await
        .expect("pipeline stalled on a full progress channel")
        .unwrap();

    assert_eq!(summary.crawl.unwrap().processed, 4);
    assert_eq!(summary.chunks, 4);
}
