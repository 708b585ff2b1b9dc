use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tdcrawl::config::{CategoryScope, Config, FailurePolicy, NameSource};
use tdcrawl::crawler::Pipeline;
use tdcrawl::dom::{Depth, TreePrinter};
use tdcrawl::error::CrawlErrorTrait;
use tdcrawl::renderer::{ChromiumRenderer, RenderSession};
use tdcrawl::storage::{write_screenshot, JsonLinesWriter};

/// Exit code of a run stopped by Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "tdcrawl",
    version,
    about = "Headless-browser crawler that catalogs a laboratory test directory",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the directory and print one JSON record per line
    Crawl {
        /// Visit every category instead of only the first
        #[arg(long)]
        all_categories: bool,

        /// Maximum number of detail pages to visit
        #[arg(short, long)]
        max_items: Option<usize>,

        /// Title child supplying the name (first-text, first-element)
        #[arg(long)]
        name_source: Option<NameSource>,

        /// Detail page failure handling (isolate, abort)
        #[arg(long)]
        failure_policy: Option<FailurePolicy>,

        /// Do not capture detail pages
        #[arg(long)]
        no_screenshot: bool,

        /// Where to write the last detail-page capture
        #[arg(long)]
        screenshot_path: Option<PathBuf>,

        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// Print the rendered subtree of the nodes matching a selector
    Dump {
        /// Page to render
        url: String,

        /// CSS selector of the nodes to print
        selector: String,

        /// Levels below each match to expand (default: entire subtree)
        #[arg(short, long)]
        depth: Option<u32>,

        /// Only match below the nodes matching this selector
        #[arg(long)]
        within: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose);

    match cli.command {
        Commands::Crawl {
            all_categories,
            max_items,
            name_source,
            failure_policy,
            no_screenshot,
            screenshot_path,
            headful,
        } => {
            if all_categories {
                config.crawl.category_scope = CategoryScope::All;
            }
            if let Some(max_items) = max_items {
                config.crawl.max_items = Some(max_items);
            }
            if let Some(name_source) = name_source {
                config.crawl.name_source = name_source;
            }
            if let Some(failure_policy) = failure_policy {
                config.crawl.failure_policy = failure_policy;
            }
            if no_screenshot {
                config.crawl.screenshot = false;
            }
            if let Some(path) = screenshot_path {
                config.output.screenshot_path = path;
            }
            if headful {
                config.renderer.headless = false;
            }
            config.validate().context("Invalid configuration")?;

            tracing::info!(
                scope = ?config.crawl.category_scope,
                max_items = ?config.crawl.max_items,
                name_source = ?config.crawl.name_source,
                failure_policy = ?config.crawl.failure_policy,
                "Starting crawl command"
            );
            crawl(config).await
        }

        Commands::Dump {
            url,
            selector,
            depth,
            within,
        } => {
            config.validate().context("Invalid configuration")?;
            let depth = depth.map_or(Depth::Unbounded, Depth::Levels);
            dump(config, &url, &selector, within.as_deref(), depth).await
        }
    }
}

fn setup_tracing(format: &str, level: &str, verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("tdcrawl=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new(format!("tdcrawl={level},warn"))
        }
    });

    // stdout carries the records; logs go to stderr
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Shutdown channel flipped to `true` on the first Ctrl-C
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, stopping after the current call");
                let _ = shutdown_tx.send(true);
                // Keep the sender alive so receivers do not see a closed channel
                std::future::pending::<()>().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
    shutdown_rx
}

async fn crawl(config: Config) -> Result<ExitCode> {
    let shutdown = shutdown_on_ctrl_c();
    let renderer = ChromiumRenderer::launch(&config.renderer)
        .await
        .context("Failed to launch Chromium")?;

    let report = {
        let session = RenderSession::new(
            &renderer,
            config.retry.clone(),
            config.settle.clone(),
            shutdown,
        )
        .with_navigation_rate(config.renderer.navigations_per_second);

        let mut sink = JsonLinesWriter::new(std::io::stdout());
        Pipeline::new(&session, &config).run(&mut sink).await
    };
    renderer.close().await;

    if let Some(error) = &report.error {
        for e in error.iter() {
            tracing::error!(category = %e.category(), error = %e, "Crawl error");
        }
        tracing::error!(errors = error.len(), "Crawl finished with errors");
        return Ok(ExitCode::FAILURE);
    }

    if report.interrupted {
        tracing::warn!(records = report.stats.records, "Crawl interrupted");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    if let Some(image) = &report.screenshot {
        write_screenshot(&config.output.screenshot_path, image)?;
    }

    tracing::info!(records = report.stats.records, "Crawl completed successfully");
    Ok(ExitCode::SUCCESS)
}

async fn dump(
    config: Config,
    url: &str,
    selector: &str,
    within: Option<&str>,
    depth: Depth,
) -> Result<ExitCode> {
    let renderer = ChromiumRenderer::launch(&config.renderer)
        .await
        .context("Failed to launch Chromium")?;

    let result = async {
        let session = RenderSession::new(
            &renderer,
            config.retry.clone(),
            config.settle.clone(),
            shutdown_on_ctrl_c(),
        );

        session.navigate(url).await?;
        let matches = match within {
            Some(scope) => {
                session.settle(scope).await?;
                let mut matches = Vec::new();
                for root in session.query(scope).await? {
                    matches.extend(session.query_within(&root, selector).await?);
                }
                matches
            }
            None => {
                session.settle(selector).await?;
                session.query(selector).await?
            }
        };

        let mut expanded = Vec::new();
        for node in matches {
            expanded.push(session.expand_to(&node, depth).await?);
        }
        Ok::<_, tdcrawl::utils::error::RendererError>(expanded)
    }
    .await;
    renderer.close().await;

    let nodes = result.with_context(|| format!("Failed to dump '{selector}' at {url}"))?;
    tracing::info!(matches = nodes.len(), "Rendered subtree");
    print!("{}", TreePrinter::new(&nodes));
    Ok(ExitCode::SUCCESS)
}
