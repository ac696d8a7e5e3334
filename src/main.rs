use clap::Parser;
use miette::{IntoDiagnostic, Result};
use order_reconciler::application::{Disposition, Reconciler};
use order_reconciler::config::{DEFAULT_DEADLINE_MS, DEFAULT_MAX_ATTEMPTS, ReconcilerConfig};
use order_reconciler::domain::ports::{DisputeStoreBox, OrderStoreBox};
use order_reconciler::error::Error;
use order_reconciler::infrastructure::in_memory::{InMemoryDisputeStore, InMemoryOrderStore};
use order_reconciler::infrastructure::log_alerts::LogAlertSink;
use order_reconciler::interfaces::csv::order_reader::OrderReader;
use order_reconciler::interfaces::csv::order_writer::OrderWriter;
use order_reconciler::interfaces::provider::EventReader;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Orders CSV file used to seed the store
    orders: PathBuf,

    /// Provider events, one JSON envelope per line
    events: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Read-decide-write attempts per event before giving up
    #[arg(long, env = "RECONCILER_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Upper bound on the processing time of one event, in milliseconds
    #[arg(long, env = "RECONCILER_DEADLINE_MS", default_value_t = DEFAULT_DEADLINE_MS)]
    deadline_ms: u64,
}

fn in_memory_stores() -> (OrderStoreBox, DisputeStoreBox) {
    let orders: OrderStoreBox = Box::new(InMemoryOrderStore::new());
    let disputes: DisputeStoreBox = Box::new(InMemoryDisputeStore::new());
    (orders, disputes)
}

#[cfg(feature = "storage-rocksdb")]
fn build_stores(db_path: Option<PathBuf>) -> Result<(OrderStoreBox, DisputeStoreBox)> {
    use order_reconciler::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(db_path) => {
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            let orders: OrderStoreBox = Box::new(store.clone());
            let disputes: DisputeStoreBox = Box::new(store);
            Ok((orders, disputes))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_stores(db_path: Option<PathBuf>) -> Result<(OrderStoreBox, DisputeStoreBox)> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ReconcilerConfig::new(
        cli.max_attempts,
        ReconcilerConfig::default().retry_backoff,
        Duration::from_millis(cli.deadline_ms),
    )
    .into_diagnostic()?;

    let (orders, disputes) = build_stores(cli.db_path)?;
    let reconciler =
        Reconciler::new(orders, disputes, Box::new(LogAlertSink)).with_config(config);

    // Seed orders. Rows already present in a persistent store are kept as they are.
    let file = File::open(cli.orders).into_diagnostic()?;
    for order_result in OrderReader::new(file).orders() {
        match order_result {
            Ok(order) => match reconciler.orders().insert(order).await {
                Ok(()) => {}
                Err(Error::DuplicateOrder(id)) => info!(order_id = %id, "Order already stored"),
                Err(e) => error!(error = %e, "Error seeding order"),
            },
            Err(e) => error!(error = %e, "Error reading order"),
        }
    }

    // Replay events.
    let file = File::open(cli.events).into_diagnostic()?;
    let mut redeliveries = 0usize;
    for event_result in EventReader::new(BufReader::new(file)).events() {
        let event = match event_result {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Error reading event");
                continue;
            }
        };
        let result = reconciler.process_event(&event).await;
        if let Err(e) = &result {
            warn!(event_id = %event.event_id, error = %e, "Event not applied");
        }
        if Disposition::of(&result).wants_redelivery() {
            redeliveries += 1;
        }
    }
    if redeliveries > 0 {
        warn!(count = redeliveries, "Events would be redelivered by the provider");
    }

    let orders = reconciler.orders().all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OrderWriter::new(stdout.lock());
    writer.write_orders(orders).into_diagnostic()?;

    Ok(())
}
