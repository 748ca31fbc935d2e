//! Foreign-key repair - points stock_movements at stock_items
//!
//! Run with: cargo run --bin fix-fk
//!
//! Deletes every row of stock_movements before touching the constraint.

use anyhow::Context;
use clap::Parser;

use sileen_admin::config::{init_tracing, load_config};
use sileen_admin::db::{close_pool, connect_from_app_config};
use sileen_admin::repair::{ensure_repaired, repair_stock_movements_fk};
use sileen_admin::report::print_report;

#[derive(Parser)]
#[command(
    name = "fix-fk",
    about = "Re-point stock_movements.item_id at stock_items",
    version
)]
struct Cli {
    #[arg(long, help = "Read the constraint back from information_schema afterwards")]
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
        let mut report = repair_stock_movements_fk(&db).await?;
        if cli.verify {
            report.verified = Some(ensure_repaired(&db).await?);
        }
        Ok::<_, sileen_admin::AdminError>(report)
    }
    .await;
    close_pool(db).await;

    let report = result.context("foreign key repair failed")?;
    print_report(&report, cli.json)?;
    Ok(())
}
