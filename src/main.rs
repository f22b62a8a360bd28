//! # gouvcrawl CLI
//!
//! Command-line front end of the crawler and corpus builder.
//!
//! - `run`: crawl, chunk and export in one go
//! - `crawl`: crawl only
//! - `urls`: count the URLs of the sitemaps
//! - `classify`: show where URLs would be filed
//! - `chunks`: chunk an existing output tree
//! - `directory`: scrape the directory of government services alone
//!
//! Progress is shown on stderr from the pipeline's events; logs follow
//! `RUST_LOG` (default `info`).

mod telemetry;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use gouvcrawl::catalog::{DIRECTORY_NAMESPACE, SiteCatalog};
use gouvcrawl::classifier::classify;
use gouvcrawl::crawler::fetch::build_client;
use gouvcrawl::crawler::{CrawlReport, CrawlerConfig, Storage, StorageConfig};
use gouvcrawl::directory::{DirectoryExtractor, HttpPageSession, ReconcileConfig, ReconcileReport, Reconciler};
use gouvcrawl::events::CrawlEvent;
use gouvcrawl::index::JsonExport;
use gouvcrawl::pipeline::{DEFAULT_TOPIC, Pipeline, PipelineConfig, RunSummary};
use gouvcrawl::processor::LoaderConfig;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

const DEFAULT_SITEMAP: &str = "https://monservicepublic.gouv.mc/sitemap.xml";

#[derive(Parser)]
#[command(author, version, about = "Crawl a government services website into a RAG corpus", long_about = None)]
struct Cli {
    /// Site catalog (JSON) replacing the built-in tables
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl, chunk and export the corpus
    Run(RunArgs),

    /// Crawl the sitemaps into the output tree
    Crawl(CrawlArgs),

    /// Load the sitemaps and count their URLs
    Urls(UrlsArgs),

    /// Print the namespace of each URL
    Classify(ClassifyArgs),

    /// Chunk an existing output tree to JSON
    Chunks(ChunksArgs),

    /// Scrape the directory of government services in both languages
    Directory(DirectoryArgs),
}

#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    /// Sitemap URLs or local files
    #[arg(default_value = DEFAULT_SITEMAP)]
    sitemaps: Vec<String>,

    /// Root of the output tree
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Pages processed concurrently
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Directory entities extracted per batch
    #[arg(long, default_value = "8")]
    batch_size: usize,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    crawl: CrawlArgs,

    /// Reuse the existing output tree
    #[arg(long)]
    skip_crawl: bool,

    /// Stop after the crawl
    #[arg(long)]
    skip_index: bool,

    /// Topic of documents no table assigns one to
    #[arg(short, long, default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Where the chunks are exported
    #[arg(long, default_value = "chunks.json")]
    chunks_out: PathBuf,

    /// Keep one namespace per topic folder
    #[arg(long)]
    preserve_namespaces: bool,
}

#[derive(Args, Debug)]
struct UrlsArgs {
    /// Sitemap URLs or local files
    #[arg(default_value = DEFAULT_SITEMAP)]
    sitemaps: Vec<String>,

    /// Also list the URLs
    #[arg(short, long)]
    list: bool,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    #[arg(required = true)]
    urls: Vec<String>,
}

#[derive(Args, Debug)]
struct ChunksArgs {
    /// Root of the output tree
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Topic of documents no table assigns one to
    #[arg(short, long, default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Where the chunks are exported
    #[arg(long, default_value = "chunks.json")]
    chunks_out: PathBuf,

    /// Chunk size in characters
    #[arg(short, long, default_value = "20000")]
    chunk_size: usize,

    /// Overlap between chunks in characters
    #[arg(long, default_value = "5000")]
    overlap: usize,

    /// Keep one namespace per topic folder
    #[arg(long)]
    preserve_namespaces: bool,
}

#[derive(Args, Debug)]
struct DirectoryArgs {
    /// Root of the output tree; records go to its directory namespace folder
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Entities extracted per batch
    #[arg(long, default_value = "8")]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _otel = telemetry::init_tracing_subscriber(cli.log_file.as_deref())?;

    let catalog = load_catalog(cli.catalog.as_deref()).await?;

    match cli.command {
        Some(Commands::Run(args)) => run_command(args, catalog).await?,
        Some(Commands::Crawl(args)) => crawl_command(args, catalog).await?,
        Some(Commands::Urls(args)) => urls_command(args, catalog).await?,
        Some(Commands::Classify(args)) => classify_command(args, &catalog),
        Some(Commands::Chunks(args)) => chunks_command(args, catalog).await?,
        Some(Commands::Directory(args)) => directory_command(args, catalog).await?,
        None => {
            let _ = Cli::parse_from(["gouvcrawl", "--help"]);
        }
    }

    Ok(())
}

async fn load_catalog(path: Option<&Path>) -> anyhow::Result<SiteCatalog> {
    match path {
        Some(path) => Ok(SiteCatalog::from_json_file(path).await?),
        None => Ok(SiteCatalog::default()),
    }
}

fn pipeline_config(args: &CrawlArgs) -> PipelineConfig {
    PipelineConfig::builder()
        .sitemaps(args.sitemaps.clone())
        .output_root(&args.output)
        .workers(args.workers)
        .reconcile(ReconcileConfig {
            batch_size: args.batch_size.max(1),
            ..ReconcileConfig::default()
        })
        .build()
}

/// Drive a progress bar from the events of a run until the channel closes
fn spawn_progress(mut rx: mpsc::Receiver<CrawlEvent>) -> anyhow::Result<JoinHandle<()>> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );

    Ok(tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                CrawlEvent::PhaseStarted { phase } => pb.set_message(format!("{phase}...")),
                CrawlEvent::UrlsLoaded { total } => pb.set_length(total as u64),
                CrawlEvent::UrlSkipped { .. } => pb.inc(1),
                CrawlEvent::UrlFinished { url, .. } => {
                    pb.inc(1);
                    pb.set_message(url);
                }
                CrawlEvent::DirectoryProgress { language, done, total } => {
                    pb.set_message(format!("directory {}: {}/{}", language.code(), done, total))
                }
                CrawlEvent::NamespacePublished { namespace, vectors } => {
                    pb.println(format!("{namespace}: {vectors} chunks"))
                }
            }
        }
        pb.finish_with_message("done");
    }))
}

#[instrument(skip(catalog))]
async fn run_command(args: RunArgs, catalog: SiteCatalog) -> anyhow::Result<()> {
    let config = PipelineConfig {
        skip_crawl: args.skip_crawl,
        skip_index: args.skip_index,
        default_topic: args.topic.clone(),
        loader: LoaderConfig::builder()
            .preserve_topic_namespaces(args.preserve_namespaces)
            .build(),
        ..pipeline_config(&args.crawl)
    };

    let (pipeline, rx) = Pipeline::new(config, catalog)?.subscribe(100);
    let progress = spawn_progress(rx)?;
    let sink = JsonExport::new(&args.chunks_out);
    let result = pipeline.run(&sink).await;
    drop(pipeline);
    progress.await?;

    let summary = result?;
    print_summary(&summary);
    if summary.publish.is_some() {
        println!("Chunks written to {}", args.chunks_out.display());
    }
    Ok(())
}

#[instrument(skip(catalog))]
async fn crawl_command(args: CrawlArgs, catalog: SiteCatalog) -> anyhow::Result<()> {
    let config = PipelineConfig {
        skip_index: true,
        ..pipeline_config(&args)
    };

    let (pipeline, rx) = Pipeline::new(config, catalog)?.subscribe(100);
    let progress = spawn_progress(rx)?;
    let sink = JsonExport::new(args.output.join("chunks.json"));
    let result = pipeline.run(&sink).await;
    drop(pipeline);
    progress.await?;

    print_summary(&result?);
    Ok(())
}

#[instrument(skip(catalog))]
async fn urls_command(args: UrlsArgs, catalog: SiteCatalog) -> anyhow::Result<()> {
    let config = PipelineConfig::builder().sitemaps(args.sitemaps).build();
    let pipeline = Pipeline::new(config, catalog)?;
    let urls = pipeline.load_urls().await;

    if args.list {
        for url in &urls {
            println!("{url}");
        }
    }
    println!("{} URLs", urls.len());
    Ok(())
}

fn classify_command(args: ClassifyArgs, catalog: &SiteCatalog) {
    for url in args.urls {
        match classify(catalog, &url) {
            Some(namespace) => println!("{namespace}\t{url}"),
            None => println!("-\t{url}"),
        }
    }
}

#[instrument(skip(catalog))]
async fn chunks_command(args: ChunksArgs, catalog: SiteCatalog) -> anyhow::Result<()> {
    if args.chunk_size == 0 || args.overlap >= args.chunk_size {
        anyhow::bail!("overlap must be smaller than a non-zero chunk size");
    }

    let config = PipelineConfig::builder()
        .output_root(&args.output)
        .default_topic(args.topic)
        .skip_crawl(true)
        .loader(
            LoaderConfig::builder()
                .target_chunk_size(args.chunk_size)
                .overlap_size(args.overlap)
                .preserve_topic_namespaces(args.preserve_namespaces)
                .build(),
        )
        .build();

    let pipeline = Pipeline::new(config, catalog)?;
    let summary = pipeline.run(&JsonExport::new(&args.chunks_out)).await?;

    if let Some(report) = summary.publish {
        for (namespace, count) in &report.namespaces {
            println!("{namespace}: {count} chunks");
        }
    }
    println!("{} chunks written to {}", summary.chunks, args.chunks_out.display());
    Ok(())
}

#[instrument(skip(catalog))]
async fn directory_command(args: DirectoryArgs, catalog: SiteCatalog) -> anyhow::Result<()> {
    let crawler = CrawlerConfig::default();
    let extractor = DirectoryExtractor::new(
        HttpPageSession::new(build_client(&crawler)?),
        &catalog.base_domain,
    )?;
    let reconciler = Reconciler::new(
        extractor,
        ReconcileConfig {
            batch_size: args.batch_size.max(1),
            extension: crawler.extension.clone(),
            ..ReconcileConfig::default()
        },
    );

    let storage = Storage::with_config(StorageConfig {
        base_path: args.output.clone(),
        extension: crawler.extension.clone(),
    });
    storage.ensure_namespace(DIRECTORY_NAMESPACE).await?;

    let (tx, rx) = mpsc::channel(100);
    let progress = spawn_progress(rx)?;
    let result = reconciler.run(&storage, DIRECTORY_NAMESPACE, Some(&tx)).await;
    drop(tx);
    progress.await?;

    print_directory(&result?);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if let Some(crawl) = &summary.crawl {
        print_crawl(crawl);
    }
    if let Some(publish) = &summary.publish {
        println!(
            "Chunks: {} loaded, {} published, {} failed",
            summary.chunks,
            publish.published(),
            publish.failed
        );
    }
    println!(
        "Started {}, total time: {:.2?}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.elapsed
    );
}

fn print_crawl(report: &CrawlReport) {
    println!(
        "URLs: {} total, {} processed, {} failed, {} skipped",
        report.total_urls,
        report.processed,
        report.failed.len(),
        report.skipped.len()
    );
    if let Some(directory) = &report.directory {
        print_directory(directory);
    }
    println!(
        "Output: {} directories, {} files in {:.2?}",
        report.stats.directories, report.stats.files, report.elapsed
    );
}

fn print_directory(report: &ReconcileReport) {
    println!(
        "Directory: {} FR and {} EN services, {} files",
        report.fr_services, report.en_services, report.files_written
    );
    if !report.missing_en.is_empty() {
        println!("  without English record: {}", report.missing_en.join(", "));
    }
    let failed = report.failed_fr.len() + report.failed_en.len();
    if failed > 0 {
        println!("  failed after retry: {failed}");
    }
}
