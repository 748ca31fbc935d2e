//! Boutique seeder - replaces the catalog with the demonstration data
//!
//! Run with: cargo run --bin seed-boutique
//!
//! This creates:
//! - 5 categories with fixed ids
//! - 15 stock items with prices, quantities and image paths
//!
//! Existing sale_items, returns, stock_items and categories rows are deleted.

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use sileen_admin::config::{init_tracing, load_config};
use sileen_admin::db::{close_pool, connect_from_app_config};
use sileen_admin::report::print_report;
use sileen_admin::seed::{catalog_counts, seed_catalog};

#[derive(Parser)]
#[command(
    name = "seed-boutique",
    about = "Seed the SileenSystem catalog with boutique items",
    version
)]
struct Cli {
    #[arg(long, help = "Print table row counts after seeding")]
    verify: bool,

    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config().context("failed to load configuration")?;
    init_tracing(cfg.log_level(), cfg.log_json);
    cfg.log_summary();

    let db = connect_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    let result = async {
        let report = seed_catalog(&db).await?;
        let counts = if cli.verify {
            Some(catalog_counts(&db).await?)
        } else {
            None
        };
        Ok::<_, sileen_admin::AdminError>((report, counts))
    }
    .await;
    close_pool(db).await;

    let (report, counts) = result.context("catalog seeding failed")?;
    print_report(&report, cli.json)?;

    if let Some(counts) = counts {
        if counts.matches_catalog() {
            info!("Row counts match the boutique catalog");
        } else {
            warn!("Row counts differ from the boutique catalog");
        }
        print_report(&counts, cli.json)?;
    }
    Ok(())
}
