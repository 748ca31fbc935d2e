//! Schema bootstrap - runs the schema script as root
//!
//! Run with: cargo run --bin setup-db -- --sql-file Tables.sql
//!
//! Candidate root passwords are tried in order. The first one the server
//! accepts is used for the whole script and written to the credential file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use sileen_admin::bootstrap::{
    bootstrap, BootstrapOptions, BootstrapOverrides, Credentials, MySqlConnector,
};
use sileen_admin::config::{init_tracing, load_config};
use sileen_admin::report::print_report;
use sileen_admin::sql_script::SqlScript;
use sileen_admin::AdminError;

#[derive(Parser)]
#[command(
    name = "setup-db",
    about = "Create the SileenSystem schema from a SQL file",
    version
)]
struct Cli {
    #[arg(long, help = "SQL file to execute (defaults to bootstrap.sql_file)")]
    sql_file: Option<PathBuf>,

    #[arg(
        long = "candidate",
        value_name = "PASSWORD",
        help = "Root password to try; repeat to try several in order"
    )]
    candidates: Vec<String>,

    #[arg(long, help = "File that receives the working password")]
    credential_file: Option<PathBuf>,

    #[arg(
        long,
        conflicts_with = "credential_file",
        help = "Do not write the working password anywhere"
    )]
    no_credential_file: bool,

    #[arg(long, help = "Abort on the first failing statement")]
    strict: bool,

    #[arg(long, help = "Print the report as JSON")]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> BootstrapOverrides {
        BootstrapOverrides {
            candidates: self.candidates.clone(),
            strict: self.strict,
            credential_file: self.credential_file.clone(),
            no_credential_file: self.no_credential_file,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config().context("failed to load configuration")?;
    init_tracing(cfg.log_level(), cfg.log_json);
    cfg.log_summary();

    let options = BootstrapOptions::resolve(&cfg, &cli.overrides());
    if options.candidates.is_empty() {
        warn!(
            "No password candidates configured; set APP__BOOTSTRAP__PASSWORD_CANDIDATES or pass --candidate"
        );
    }

    let sql_file = cli
        .sql_file
        .clone()
        .unwrap_or_else(|| cfg.bootstrap.sql_file.clone());
    let script = SqlScript::load(&sql_file)
        .with_context(|| format!("failed to read {}", sql_file.display()))?;
    info!(
        "Loaded {} statements from {}",
        script.len(),
        sql_file.display()
    );

    let connector = MySqlConnector::from_config(&cfg);
    let account = Credentials::from_config(&cfg);
    let report = match bootstrap(&connector, &account, &script, &options).await {
        Ok(report) => report,
        Err(e @ AdminError::NoWorkingCredential { .. }) => {
            warn!("Could not connect to database with common passwords.");
            return Err(e.into());
        }
        Err(e) => return Err(e).context("schema bootstrap failed"),
    };

    print_report(&report, cli.json)?;
    Ok(())
}
