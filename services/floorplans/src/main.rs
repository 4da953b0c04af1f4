mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use artifacts::{flatten, ArtifactCache, HttpFetcher};
use clap::{Parser, Subcommand};
use corpus::{geometry_sampler, load_geometry_corpus, svg_corpus, DatasetItem, Split};
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "floorplans", about = "Floor plan dataset cache and sampler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Materialize the SVG corpus
    Svgs {
        /// Rebuild from the raw corpus even if cached
        #[arg(long)]
        regenerate: bool,
    },
    /// Materialize the geometry corpus from cache or remote
    Geometry,
    /// Print a JSON summary of sampled items
    Sample {
        #[arg(long)]
        count: usize,
        #[arg(long, default_value = "all")]
        split: String,
    },
}

#[derive(Serialize)]
struct FieldSummary {
    dtype: String,
    shape: Vec<usize>,
}

#[derive(Serialize)]
struct ItemSummary {
    id: String,
    fields: BTreeMap<String, FieldSummary>,
}

impl From<&DatasetItem> for ItemSummary {
    fn from(item: &DatasetItem) -> Self {
        let fields = flatten(item.fields())
            .into_iter()
            .map(|(path, array)| {
                let summary = FieldSummary {
                    dtype: array.dtype().descr().to_string(),
                    shape: array.shape().to_vec(),
                };
                (path, summary)
            })
            .collect();
        Self {
            id: item.id().to_string(),
            fields,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;
    info!(
        cache_dir = %cfg.cache_dir.display(),
        workers = cfg.workers,
        "floorplans starting"
    );

    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let cache = ArtifactCache::new(cfg.cache_dir.clone(), fetcher);
    let sources = cfg.sources();

    match cli.command {
        Command::Svgs { regenerate } => {
            let records = svg_corpus(&cache, &sources, regenerate).context("SVG corpus unavailable")?;
            println!("{} svg records", records.len());
        }
        Command::Geometry => {
            let corpus = load_geometry_corpus(&cache, &sources).context("geometry corpus unavailable")?;
            println!("{} geometry items", corpus.len());
        }
        Command::Sample { count, split } => {
            let split: Split = split.parse()?;
            let sampler = geometry_sampler(Arc::new(cache), sources);
            let items = sampler.sample_split(count, split)?;
            let summary: Vec<ItemSummary> = items.iter().map(|i| ItemSummary::from(i.as_ref())).collect();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
