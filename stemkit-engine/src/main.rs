//! stemkit - command-line entry point
//!
//! Thin wrapper over the engine for inspecting and maintaining the stem
//! store. Synthesis-backed operations (batch generation, repair) need a
//! provider and are only available through the library.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use stemkit_common::config::{resolve_root_folder, EngineConfig};
use stemkit_common::{StemCategory, StemLabel, TimingMap};
use stemkit_engine::audio::{ensure_silence, CrossfadeAssembler};
use stemkit_engine::cache::StemCache;
use stemkit_engine::consistency::ConsistencyEngine;
use stemkit_engine::rotation::{RotationCategory, RotationSelector};
use stemkit_engine::storage;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for stemkit
#[derive(Parser, Debug)]
#[command(name = "stemkit")]
#[command(about = "Stem lifecycle engine for personalized voice messages")]
#[command(version)]
struct Args {
    /// Root folder holding stems, index and rotation state
    #[arg(short, long, env = "STEMKIT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "STEMKIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print cache statistics
    Summary,

    /// Delete cache entries older than the TTL (or --max-age-days)
    Cleanup {
        #[arg(long)]
        max_age_days: Option<i64>,
    },

    /// Remove one label from the cache index
    Invalidate { label: String },

    /// Select the next item of a rotation category
    Next {
        #[arg(long)]
        category: String,
        items: Vec<String>,
    },

    /// Reset rotation state for one category, or all categories
    Reset {
        #[arg(long)]
        category: Option<String>,
    },

    /// Merge stems into one file
    Assemble {
        #[arg(long)]
        out: PathBuf,

        /// JSON timing map: [{"from": .., "to": .., "gap_ms": .., "crossfade_ms": ..}]
        #[arg(long)]
        timing: Option<PathBuf>,

        stems: Vec<PathBuf>,
    },

    /// Compare local and remote stems of a category
    Compare { category: String },

    /// Create a silence stem of the given length
    Silence { duration_ms: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stemkit_engine=info,stemkit_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref());
    config.validate().context("Invalid configuration")?;
    let root = resolve_root_folder(args.root_folder.as_deref(), &config);
    let paths = config.paths(&root);
    info!("Root folder: {}", root.display());

    let cache = Arc::new(StemCache::from_config(&config, &paths));

    match args.command {
        Command::Summary => {
            print_json(&cache.summarize().await)?;
        }
        Command::Cleanup { max_age_days } => {
            let max_age = max_age_days.unwrap_or(config.cache_ttl_days);
            let removed = cache
                .cleanup_expired(max_age)
                .await
                .context("Cache cleanup failed")?;
            println!("removed {} expired stem(s)", removed);
        }
        Command::Invalidate { label } => {
            let label = StemLabel::parse(&label).context("Invalid label")?;
            if cache.invalidate(&label).await.context("Invalidate failed")? {
                println!("invalidated {}", label);
            } else {
                println!("{} not found", label);
            }
        }
        Command::Next { category, items } => {
            let category: RotationCategory = category.parse()?;
            let selector = RotationSelector::new(&paths.rotation_file);
            match selector.select_next(category, &items).await? {
                Some(item) => println!("{}", item),
                None => bail!("no enabled candidates in {}", category),
            }
        }
        Command::Reset { category } => {
            let category = category
                .map(|c| c.parse::<RotationCategory>())
                .transpose()?;
            RotationSelector::new(&paths.rotation_file).reset(category).await?;
            println!("rotation state reset");
        }
        Command::Assemble { out, timing, stems } => {
            let timing = match timing {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str::<TimingMap>(&content).context("Invalid timing map")?
                }
                None => TimingMap::new(),
            };
            let assembler = CrossfadeAssembler::new().with_tail_fade_ms(config.tail_fade_ms);
            let report = tokio::task::spawn_blocking(move || assembler.assemble(&stems, &timing, &out))
                .await
                .context("Assembly task failed")??;
            println!(
                "{} ({} frames, {:.1} ms)",
                report.output.display(),
                report.frames,
                report.duration_ms
            );
        }
        Command::Compare { category } => {
            let category: StemCategory = category.parse()?;
            let engine = ConsistencyEngine::new(cache.clone(), storage::from_config(&config))
                .with_prefix(config.remote_prefix.clone())
                .with_timeout(Duration::from_secs(config.storage_timeout_secs))
                .with_workers(config.workers);
            print_json(&engine.compare_category(category, &[]).await)?;
        }
        Command::Silence { duration_ms } => {
            let path = ensure_silence(&paths.stems_dir, duration_ms, config.contract.sample_rate)
                .context("Failed to write silence stem")?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
