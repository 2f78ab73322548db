use anyhow::{anyhow, Context, Result};
use clap::Parser;
use product_gallery::logging::init_tracing;
use product_gallery::search::filter_products;
use product_gallery::util::env as env_util;
use product_gallery::{mount, GalleryConfig, GalleryServices, SessionReport};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "search", version, about = "Load the product grid once and print matches")]
struct Cli {
    /// Case-insensitive title filter (empty prints everything)
    #[arg(default_value = "")]
    query: String,
    /// Override the backend origin (otherwise resolved from env)
    #[arg(long)]
    backend_url: Option<String>,
    /// Cap concurrent preview lookups (default: unbounded)
    #[arg(long)]
    max_concurrency: Option<usize>,
    /// Give up waiting for previews after this many seconds
    #[arg(long, default_value_t = 60)]
    wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("warn,product_gallery=info")?;
    let cli = Cli::parse();

    let mut config = GalleryConfig::from_env().context("gallery configuration")?;
    if let Some(url) = cli.backend_url.as_deref() {
        config = config.with_base_origin(url)?;
    }
    if cli.max_concurrency.is_some() {
        config.max_concurrency = cli.max_concurrency.filter(|n| *n > 0);
    }

    let services = GalleryServices::from_config(&config)?;
    let mut handle = mount(&config, services);

    let report = tokio::time::timeout(Duration::from_secs(cli.wait_secs), handle.settled())
        .await
        .map_err(|_| anyhow!("previews did not settle within {}s", cli.wait_secs))?;
    match report {
        Some(SessionReport::LoadFailed(e)) => return Err(anyhow!("catalog load failed: {e}")),
        Some(SessionReport::Settled { products, resolution }) => {
            eprintln!(
                "{products} products, {} previews resolved of {} attempted",
                resolution.resolved, resolution.attempted
            );
        }
        Some(SessionReport::Stale) | None => return Err(anyhow!("session ended before settling")),
    }

    let snapshot = handle.store().snapshot();
    let hits = filter_products(&snapshot, &cli.query);
    println!("Products ({}):", hits.len());
    for p in hits {
        let photo = if p.photo.starts_with("data:") {
            "<cropped preview>"
        } else {
            p.photo.as_str()
        };
        println!("  [{}] {} -> {}", p.id, p.title, photo);
    }

    handle.unmount();
    Ok(())
}
