//! Command-line entry point for the sync engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use wholesale_sync_lib::application::{AdminService, BrowserFactory, SyncOrchestrator};
use wholesale_sync_lib::domain::sync_log::{SyncLogEntry, SyncStatus};
use wholesale_sync_lib::infrastructure::browser::{BrowserSession, HttpBrowserSession};
use wholesale_sync_lib::infrastructure::config::AppConfig;
use wholesale_sync_lib::infrastructure::database_connection::DatabaseConnection;
use wholesale_sync_lib::infrastructure::extractor::SupplierExtractor;
use wholesale_sync_lib::infrastructure::logging::init_logging;

const USAGE: &str = "\
Usage: wholesale-sync [--config <path>] <command>

Commands:
  full          Run a full catalog sync
  incremental   Refresh records not synced in the last 24 hours
  stock-check   Re-check stock for every non-excluded record
  status        Show recent sync runs
  settings      Show the current sync settings
";

#[derive(Debug)]
struct CliArgs {
    config_path: Option<PathBuf>,
    command: String,
}

fn parse_args() -> Result<CliArgs> {
    let mut config_path = None;
    let mut command = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => command = Some("help".to_string()),
            other if command.is_none() && !other.starts_with('-') => {
                command = Some(other.to_string());
            }
            other => bail!("unexpected argument '{other}'\n\n{USAGE}"),
        }
    }

    Ok(CliArgs {
        config_path,
        command: command.context(USAGE)?,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args = parse_args()?;
    if args.command == "help" {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load_from(args.config_path.as_deref())?;
    init_logging(&config.logging)?;

    let db = DatabaseConnection::new(&config.database.url)
        .await
        .context("failed to open database")?;
    db.migrate().await.context("failed to run migrations")?;
    let pool = Arc::new(db.pool().clone());

    let supplier = config.supplier.clone();
    let extractor = SupplierExtractor::new(&supplier.base_url);
    let browser_config = config.browser.clone();
    let factory: BrowserFactory = Box::new(move || {
        Ok(Box::new(HttpBrowserSession::new(&browser_config)?) as Box<dyn BrowserSession>)
    });

    let orchestrator = Arc::new(SyncOrchestrator::new(supplier, extractor, pool.clone(), factory));
    let admin = AdminService::new(orchestrator, pool);

    match args.command.as_str() {
        "full" => report_run(admin.trigger_full_sync().await?),
        "incremental" => report_run(admin.trigger_incremental_sync().await?),
        "stock-check" => report_run(admin.trigger_stock_check().await?),
        "status" => {
            for entry in admin.recent_sync_status(10).await? {
                print_entry(&entry);
            }
            Ok(ExitCode::SUCCESS)
        }
        "settings" => {
            let settings = admin.settings().await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(ExitCode::SUCCESS)
        }
        other => bail!("unknown command '{other}'\n\n{USAGE}"),
    }
}

fn report_run(entry: SyncLogEntry) -> Result<ExitCode> {
    info!(
        run = entry.id.as_str(),
        status = entry.status.as_str(),
        "run finished"
    );
    print_entry(&entry);
    Ok(match entry.status {
        SyncStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

fn print_entry(entry: &SyncLogEntry) {
    println!(
        "{}  {:<12} {:<10} processed={} created={} updated={} skipped={} errors={} duration={}s",
        entry.started_at.format("%Y-%m-%d %H:%M:%S"),
        entry.sync_type.as_str(),
        entry.status.as_str(),
        entry.products_processed,
        entry.products_created,
        entry.products_updated,
        entry.products_skipped,
        entry.errors.len(),
        entry.duration_seconds.unwrap_or(0),
    );
}
