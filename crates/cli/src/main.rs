//! Product Porter CLI - Shopify catalog export, assembly and publishing.
//!
//! # Usage
//!
//! ```bash
//! # Run every bulk export (products, variants, collections, metafields, translations)
//! porter export all
//!
//! # Export one locale's product translations
//! porter export translations --locale ja
//!
//! # Fetch zh-TW metafield translations
//! porter translate-metafields
//!
//! # Build output/products_full_with_i18n.json
//! porter assemble
//!
//! # Publish notion_products.json, then retry the newest reject list
//! porter publish
//! porter resume
//! ```
//!
//! # Commands
//!
//! - `export` - Run bulk exports into the output directory
//! - `narrow` - Write the products-only subset of an export
//! - `translate-metafields` - Fetch metafield translations
//! - `assemble` - Consolidate exports into one document per product
//! - `publish` - Create Notion pages from rows
//! - `resume` - Retry a reject list
//!
//! # Logging
//!
//! `RUST_LOG` overrides the default filter; set `PORTER_LOG_JSON` for JSON lines.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use product_porter_pipeline::PorterConfig;
use product_porter_pipeline::exports::{EXPORT_LOCALES, ExportJob};

mod commands;

#[derive(Parser)]
#[command(name = "porter")]
#[command(author, version, about = "Product Porter CLI tools")]
struct Cli {
    /// Artifact directory (overrides `PORTER_OUTPUT_DIR`)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Bulk status poll interval in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run bulk exports
    Export {
        #[command(subcommand)]
        target: ExportTarget,

        /// Skip undecodable lines instead of failing the export
        #[arg(long)]
        skip_malformed: bool,

        /// Give up on a bulk job after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Write `<stem>.products_only.json` next to an export
    Narrow {
        /// Export file (default: <output>/bulk_products_main.json)
        file: Option<PathBuf>,
    },
    /// Fetch translations for `content.*` and `theme.shipping_time` metafields
    TranslateMetafields {
        /// Target locale
        #[arg(short, long, default_value = "zh-TW")]
        locale: String,

        /// Pause after each batch in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Retry failed batches with backoff
        #[arg(long)]
        retry: bool,
    },
    /// Consolidate exports into `products_full_with_i18n.json`
    Assemble,
    /// Create Notion pages from rows
    Publish {
        /// Rows file (default: <output>/notion_products.json)
        #[arg(long)]
        rows: Option<PathBuf>,

        /// Pause between rows in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Retry the rows of a reject list
    Resume {
        /// Reject list (default: newest notion_upload_fail_*.json)
        #[arg(long)]
        fail: Option<PathBuf>,

        /// Rows file (default: <output>/notion_products.json)
        #[arg(long)]
        rows: Option<PathBuf>,

        /// Pause between rows in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Attempts per row
        #[arg(long)]
        retries: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Products with images (also writes the products-only subset)
    Main,
    /// Product variants
    Variants,
    /// Product collections
    Collections,
    /// Product metafields
    Metafields,
    /// Product translations for one locale
    Translations {
        #[arg(short, long, default_value = "zh-TW")]
        locale: String,
    },
    /// Every export, one after another
    All,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "product_porter_pipeline=info,porter=info".into());

    let json = std::env::var("PORTER_LOG_JSON").is_ok();
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = PorterConfig::from_env()?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval = std::time::Duration::from_millis(ms);
    }

    match cli.command {
        Commands::Export {
            target,
            skip_malformed,
            timeout_secs,
        } => {
            let jobs = match target {
                ExportTarget::Main => vec![ExportJob::main()],
                ExportTarget::Variants => vec![ExportJob::variants()],
                ExportTarget::Collections => vec![ExportJob::collections()],
                ExportTarget::Metafields => vec![ExportJob::metafields()],
                ExportTarget::Translations { locale } => vec![ExportJob::translations(&locale)],
                ExportTarget::All => ExportJob::all(EXPORT_LOCALES),
            };
            commands::export::run(&config, &jobs, skip_malformed, timeout_secs).await?;
        }
        Commands::Narrow { file } => commands::narrow::run(&config, file)?,
        Commands::TranslateMetafields {
            locale,
            delay_ms,
            retry,
        } => commands::translate::run(&config, &locale, delay_ms, retry).await?,
        Commands::Assemble => commands::assemble::run(&config)?,
        Commands::Publish { rows, delay_ms } => {
            commands::publish::publish(&config, rows, delay_ms).await?;
        }
        Commands::Resume {
            fail,
            rows,
            delay_ms,
            retries,
        } => commands::publish::resume(&config, fail, rows, delay_ms, retries).await?,
    }
    Ok(())
}
