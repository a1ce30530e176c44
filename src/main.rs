use std::io::{self, BufRead, Write};
use std::ops::RangeInclusive;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eo_indexer::catalog::{region_polygon, EarthCatalog, ImageFilter};
use eo_indexer::config::{ProductRegistry, Settings};
use eo_indexer::credentials::{CredentialManager, RefreshGrant, StaticTokenFile};
use eo_indexer::index::InMemoryIndex;
use eo_indexer::indexer::Indexer;

#[derive(Parser, Debug)]
#[command(name = "eo-indexer")]
#[command(about = "Indexes imagery-catalog scenes into a dataset index")]
struct Args {
    /// Registered product to index into
    #[arg(short, long)]
    product: String,

    /// Catalog asset path, e.g. LANDSAT/LC08/C01/T1_SR
    #[arg(short, long)]
    asset: String,

    /// Product definitions (TOML)
    #[arg(long, default_value = "products.toml")]
    products: PathBuf,

    /// Settings file (TOML); built-in defaults apply when it does not exist
    #[arg(long, default_value = "eo-indexer.toml")]
    settings: PathBuf,

    /// Latitude range of the region of interest
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true, requires = "longitude")]
    latitude: Option<Vec<f64>>,

    /// Longitude range of the region of interest
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true, requires = "latitude")]
    longitude: Option<Vec<f64>>,

    /// Earliest acquisition time, RFC 3339
    #[arg(long)]
    start_time: Option<DateTime<Utc>>,

    /// Latest acquisition time, RFC 3339
    #[arg(long)]
    end_time: Option<DateTime<Utc>>,

    /// Walk calendar-month windows across these years instead, e.g. 2018-2020
    #[arg(long, value_parser = parse_years, conflicts_with_all = ["start_time", "end_time"])]
    years: Option<RangeInclusive<i32>>,

    /// Request at most this many records (a single page)
    #[arg(long)]
    page_size: Option<u32>,

    /// Update datasets that already exist
    #[arg(short, long)]
    update: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

fn parse_years(value: &str) -> std::result::Result<RangeInclusive<i32>, String> {
    let (start, end) = match value.split_once('-') {
        Some((start, end)) => (start, end),
        None => (value, value),
    };
    let start: i32 = start.trim().parse().map_err(|_| format!("bad year {start:?}"))?;
    let end: i32 = end.trim().parse().map_err(|_| format!("bad year {end:?}"))?;
    if start > end {
        return Err(format!("year range {value:?} is reversed"));
    }
    Ok(start..=end)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("EO_INDEXER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn confirmed(product: &str, asset: &str) -> Result<bool> {
    print!("Index {asset} into {product}? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

async fn credential_manager(settings: &Settings) -> Result<CredentialManager> {
    match settings.service_account_file() {
        Some(path) => {
            info!(path = %path.display(), "using service-account credentials");
            Ok(CredentialManager::service(StaticTokenFile::new(path)).await?)
        }
        None => {
            let home = std::env::var_os("HOME")
                .map(PathBuf::from)
                .context("no credentials configured and HOME is unset")?;
            let path = home.join(".config/gcloud/application_default_credentials.json");
            info!(path = %path.display(), "using refreshable user credentials");
            let grant = RefreshGrant::from_file(&path, &settings.token_uri)?;
            Ok(CredentialManager::refreshing(grant).await?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    let args = Args::parse();

    let settings = if args.settings.exists() {
        Settings::read(&args.settings)?
    } else {
        Settings::default()
    };

    let registry = ProductRegistry::read(&args.products)
        .with_context(|| format!("could not read products from {}", args.products.display()))?;
    let mut index = InMemoryIndex::new();
    for product in registry.products {
        index.register_product(product);
    }

    let mut filter = ImageFilter {
        start_time: args.start_time,
        end_time: args.end_time,
        page_size: args.page_size,
        ..Default::default()
    };
    if let (Some(latitude), Some(longitude)) = (&args.latitude, &args.longitude) {
        filter.region = Some(region_polygon(
            (latitude[0], latitude[1]),
            (longitude[0], longitude[1]),
        ));
    }

    if !args.yes && !confirmed(&args.product, &args.asset)? {
        println!("aborted");
        return Ok(());
    }

    let manager = credential_manager(&settings).await?;
    let catalog = EarthCatalog::new(&settings.endpoint, &settings.project, manager.handle());
    let indexer = Indexer::new(&catalog, &index);

    let count = match args.years.clone() {
        Some(years) => {
            indexer
                .index_windows(&args.asset, &args.product, &filter, years, args.update)
                .await?
        }
        None => {
            indexer
                .index(&args.asset, &args.product, &filter, args.update)
                .await?
        }
    };

    info!(count, product = %args.product, asset = %args.asset, "indexing finished");
    println!("{count} eligible scenes indexed into {}", args.product);

    manager.shutdown().await;
    Ok(())
}
