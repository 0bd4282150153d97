//! # GoldTea CLI
//!
//! Builds the data service the same way the app does and prints a few
//! views from it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  init_tracing ─► load config ─► open store ─► DataServiceBuilder        │
//! │                                                   │                     │
//! │        ┌──────────────┬──────────────┬────────────┼───────────┐         │
//! │        ▼              ▼              ▼            ▼           ▼         │
//! │     summary        report         villages     notes       outbox      │
//! │  (month to date)  (period)     pricing/customers         (pending,     │
//! │                                                            replay)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use goldtea_core::report::ReportPeriod;
use goldtea_db::{Database, DbConfig};
use goldtea_sync::{
    DataService, DataServiceBuilder, GoldteaConfig, MemoryOutbox, MemoryStore, OutboxProcessor,
    OutboxStore, RemoteStore, SqliteOutbox, SqliteStore,
};

#[derive(Parser)]
#[command(name = "goldtea")]
#[command(version)]
#[command(about = "GoldTea sales data from the command line", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true, conflicts_with = "memory")]
    db: Option<PathBuf>,

    /// Use an empty in-memory store
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Month-to-date dashboard figures
    Summary,

    /// Sales report for a period (today, week, month, year)
    Report { period: String },

    /// Villages on the route
    Villages,

    /// Rates, optionally for one tea type
    Pricing {
        #[arg(long)]
        tea_type: Option<String>,
    },

    /// Known customers, optionally for one village
    Customers {
        #[arg(long)]
        village: Option<String>,
    },

    /// Most recently edited notes
    Notes,

    /// Writes waiting for retry
    Outbox {
        /// Replay one batch now
        #[arg(long)]
        replay: bool,

        /// Remove synced history older than this many days
        #[arg(long)]
        cleanup_days: Option<u32>,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=goldtea_sync=trace` - Trace the cache layer only
/// - Default: info, debug for goldtea crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,goldtea=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// The store and outbox the service runs on.
struct Backend {
    store: Arc<dyn RemoteStore>,
    outbox: Arc<dyn OutboxStore>,
    sqlite_outbox: Option<SqliteOutbox>,
}

async fn open_backend(cli: &Cli, config: &GoldteaConfig) -> CliResult<Backend> {
    if cli.memory {
        info!("Using in-memory store");
        return Ok(Backend {
            store: Arc::new(MemoryStore::new()),
            outbox: Arc::new(MemoryOutbox::new()),
            sqlite_outbox: None,
        });
    }

    let path = cli.db.clone().unwrap_or_else(|| config.database_path());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %path.display(), "Opening database");

    let db = Database::new(DbConfig::new(path)).await?;
    let outbox = SqliteOutbox::new(&db);
    Ok(Backend {
        store: Arc::new(SqliteStore::new(&db)),
        outbox: Arc::new(outbox.clone()),
        sqlite_outbox: Some(outbox),
    })
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match GoldteaConfig::load(cli.config.clone()) {
        Ok(config) => config,
        Err(e) if cli.config.is_none() => {
            warn!(error = %e, "Using default configuration");
            GoldteaConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    let backend = open_backend(&cli, &config).await?;
    let service = DataServiceBuilder::new(config.clone())
        .with_store(Arc::clone(&backend.store))
        .with_outbox(Arc::clone(&backend.outbox))
        .build()?;

    match cli.command {
        Commands::Summary => print_summary(&service).await,
        Commands::Report { period } => {
            let period = ReportPeriod::parse(&period)
                .ok_or_else(|| format!("unknown period '{}' (today, week, month, year)", period))?;
            print_report(&service, period).await
        }
        Commands::Villages => {
            for village in service.get_all_villages(false).await? {
                println!("{:<24} {}", village.name, village.day);
            }
            Ok(())
        }
        Commands::Pricing { tea_type } => {
            let rows = match tea_type {
                Some(tea_type) => service.get_pricing_by_tea_type(&tea_type).await?,
                None => service.get_all_pricing(false).await?,
            };
            for row in rows {
                println!("{:<12} {:<10} {}", row.tea_type, row.package, row.rate);
            }
            Ok(())
        }
        Commands::Customers { village } => {
            let customers = match village {
                Some(village) => service.get_customers_by_village(&village).await?,
                None => service.get_all_customers(false).await?,
            };
            for customer in customers {
                println!("{:<24} {}", customer.customer_name, customer.village);
            }
            Ok(())
        }
        Commands::Notes => {
            let page = service
                .get_notes_page(config.cache.notes_page_size, None, false)
                .await?;
            for note in page.items {
                println!("{}  {}", note.updated_at.with_timezone(&Local).format("%d %b %H:%M"), note.title);
            }
            Ok(())
        }
        Commands::Outbox {
            replay,
            cleanup_days,
        } => {
            if replay {
                let (processor, _handle) = OutboxProcessor::new(
                    Arc::clone(&backend.store),
                    Arc::clone(&backend.outbox),
                    config.outbox.clone(),
                );
                let report = processor.process_batch().await?;
                println!(
                    "Replayed {}, failed {}, given up {}",
                    report.replayed, report.failed, report.given_up
                );
            }
            if let (Some(days), Some(outbox)) = (cleanup_days, &backend.sqlite_outbox) {
                println!("Removed {} synced entries", outbox.cleanup(days).await?);
            }
            println!("Pending writes: {}", service.pending_write_count().await?);
            Ok(())
        }
    }
}

async fn print_summary(service: &DataService) -> CliResult<()> {
    let summary = service.load_dashboard(&Local::now()).await?;

    println!("Month to date:   {}", summary.total_sales);
    println!("Today:           {}", summary.today_sales);
    println!("Pending:         {}", summary.pending_payments);
    println!("Sales:           {}", summary.count);

    if !summary.recent.is_empty() {
        println!();
        println!("Recent:");
        for sale in &summary.recent {
            println!(
                "  {}  {:<20} {:<14} {:>10}  {}",
                sale.date.with_timezone(&Local).format("%d %b"),
                sale.customer_name,
                sale.village,
                sale.total_amount.to_string(),
                sale.payment_status.as_str()
            );
        }
    }
    Ok(())
}

async fn print_report(service: &DataService, period: ReportPeriod) -> CliResult<()> {
    let report = service.load_period_report(period, &Local::now()).await?;

    println!(
        "{} to {}",
        report.start.with_timezone(&Local).format("%d %b %Y"),
        report.end.with_timezone(&Local).format("%d %b %Y")
    );
    println!("Sales:      {} ({} paid, {} pending)", report.count, report.paid_count, report.pending_count);
    println!("Revenue:    {}", report.revenue);
    println!("Collected:  {}", report.collected);
    println!("Pending:    {}", report.pending);

    if !report.tea_type_counts.is_empty() {
        println!();
        println!("By tea type:");
        for (tea_type, count) in &report.tea_type_counts {
            println!("  {:<16} {}", tea_type, count);
        }
    }

    if !report.top_customers.is_empty() {
        println!();
        println!("Top customers:");
        for stats in &report.top_customers {
            println!(
                "  {:<20} {:<14} {:>10}  ({} sales)",
                stats.customer_name,
                stats.village,
                stats.total_amount.to_string(),
                stats.sales_count
            );
        }
    }
    Ok(())
}
