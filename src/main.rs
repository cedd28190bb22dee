//! fintrack — Operator CLI for the Finance Store
//!
//! Wires configuration, logging, the remote document store, and the
//! local fallback into a `FinanceStore`, then runs one subcommand.
//!
//! Wiring sequence:
//! 1. Parse CLI arguments
//! 2. Load config.toml + validate
//! 3. Init tracing (JSON structured logging unless `log_format = "pretty"`)
//! 4. Load the session from env vars (FINTRACK_USER_ID, FINTRACK_ID_TOKEN)
//! 5. Open the local fallback (one JSON file per kind under `data_dir`)
//! 6. Create the remote store for the configured backend
//! 7. Run the subcommand; `watch` and `serve` run until SIGINT

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use fintrack_store::adapters::auth::{id_token_from_env, session_from_env};
use fintrack_store::adapters::local::JsonFileStore;
use fintrack_store::adapters::metrics::{HealthServer, HealthState, StoreMetrics};
use fintrack_store::adapters::remote::{FirestoreRestStore, MemoryDocumentStore};
use fintrack_store::config::{self, AppConfig, LogFormat, RemoteBackend};
use fintrack_store::domain::icons;
use fintrack_store::domain::records::{
  Account, Category, CategoryType, Entity, EntityKind, Frequency, Subscription, Transaction,
  TransactionKind, TransactionStatus,
};
use fintrack_store::domain::looks_offline;
use fintrack_store::ports::document_store::DocumentStore;
use fintrack_store::ports::session::Session;
use fintrack_store::usecases::seed::seed_transactions;
use fintrack_store::usecases::{ConnectionStatus, FinanceStore};

/// Environment variable holding the remote store's web API key.
const API_KEY_VAR: &str = "FINTRACK_API_KEY";

/// Interval between health probes while serving.
const PROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "fintrack", version, about = "Personal finance records with offline fallback")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Record an income or expense.
  AddTransaction {
    /// Receita or Despesa.
    #[arg(long)]
    kind: TransactionKind,
    #[arg(long)]
    amount: Decimal,
    #[arg(long)]
    description: String,
    /// Calendar date, YYYY-MM-DD.
    #[arg(long)]
    date: NaiveDate,
    #[arg(long)]
    category: String,
    #[arg(long)]
    account: String,
    /// pago or pendente.
    #[arg(long, default_value = "pendente")]
    status: TransactionStatus,
  },
  /// Register an account.
  AddAccount {
    #[arg(long)]
    name: String,
    #[arg(long = "type")]
    account_type: String,
    #[arg(long)]
    balance: Option<Decimal>,
  },
  /// Register a recurring subscription.
  AddSubscription {
    #[arg(long)]
    name: String,
    #[arg(long)]
    amount: Decimal,
    /// Mensal, Anual, or Semanal.
    #[arg(long, default_value = "Mensal")]
    frequency: Frequency,
    #[arg(long)]
    due_day: u8,
    #[arg(long)]
    category: String,
  },
  /// Create a category.
  AddCategory {
    #[command(flatten)]
    fields: CategoryArgs,
  },
  /// Replace the fields of a category.
  UpdateCategory {
    id: String,
    #[command(flatten)]
    fields: CategoryArgs,
  },
  /// Delete a category.
  DeleteCategory { id: String },
  /// Print every record of one kind.
  List { kind: EntityKind },
  /// Print the records of one kind on every change until Ctrl-C.
  Watch { kind: EntityKind },
  /// Add the sample transactions.
  Seed,
  /// Report session and remote namespace status.
  Status,
  /// Search the category icon catalog.
  Icons { query: Option<String> },
  /// Serve /live, /ready, and /metrics until Ctrl-C.
  Serve,
}

#[derive(Debug, clap::Args)]
struct CategoryArgs {
  #[arg(long)]
  name: String,
  /// receita or despesa.
  #[arg(long = "type")]
  category_type: CategoryType,
  #[arg(long, default_value = "Folder")]
  icon: String,
  /// `#RRGGBB`; defaults to the swatch for the category type.
  #[arg(long)]
  color: Option<String>,
}

impl CategoryArgs {
  fn into_category(self) -> Category {
    let color = self
      .color
      .unwrap_or_else(|| self.category_type.default_color().to_string());
    Category {
      name: self.name,
      category_type: self.category_type,
      icon: self.icon,
      color,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  // ── 1. Parse arguments ──────────────────────────────────
  let cli = Cli::parse();

  // ── 2. Load configuration from config.toml ──────────────
  let config = config::loader::load_config(&cli.config).context("Failed to load configuration")?;

  // ── 3. Initialize structured logging ────────────────────
  init_tracing(&config);

  info!(
    name = %config.app.name,
    version = env!("CARGO_PKG_VERSION"),
    backend = ?config.remote.backend,
    "Starting fintrack"
  );

  // ── 4. Session from env vars ────────────────────────────
  let session = session_from_env();
  if !session.is_authenticated() {
    warn!("FINTRACK_USER_ID not set, namespaced commands will fail");
  }

  // ── 5. Local fallback store ─────────────────────────────
  let local = Arc::new(
    JsonFileStore::new(&config.local.data_dir)
      .await
      .context("Failed to open local data directory")?,
  );

  let metrics = if config.metrics.enabled {
    Some(Arc::new(StoreMetrics::new().context("Failed to register metrics")?))
  } else {
    None
  };

  // ── 6. Remote store for the configured backend ──────────
  match config.remote.backend {
    RemoteBackend::Memory => {
      warn!("Memory backend: remote records last only for this process");
      let remote = Arc::new(MemoryDocumentStore::new());
      run(cli.command, &config, &session, remote, local, metrics).await
    }
    RemoteBackend::Firestore => {
      let api_key = std::env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty());
      let firestore = config.remote.firestore(api_key, id_token_from_env());
      let remote = Arc::new(
        FirestoreRestStore::new(firestore).context("Failed to create Firestore client")?,
      );
      run(cli.command, &config, &session, remote, local, metrics).await
    }
  }
}

fn init_tracing(config: &AppConfig) {
  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr);
  match config.app.log_format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.pretty().init(),
  }
}

// ── 7. Subcommands ──────────────────────────────────────────

async fn run<R: DocumentStore>(
  command: Command,
  config: &AppConfig,
  session: &Session,
  remote: Arc<R>,
  local: Arc<JsonFileStore>,
  metrics: Option<Arc<StoreMetrics>>,
) -> Result<()> {
  let mut store = FinanceStore::new(remote, Arc::clone(&local));
  if let Some(metrics) = &metrics {
    store = store.with_metrics(Arc::clone(metrics));
  }

  match command {
    Command::AddTransaction {
      kind,
      amount,
      description,
      date,
      category,
      account,
      status,
    } => {
      let draft = Transaction {
        kind,
        amount,
        description,
        date,
        category,
        account,
        status,
      };
      print_json(&store.add_transaction(session, draft).await?)
    }
    Command::AddAccount {
      name,
      account_type,
      balance,
    } => {
      let draft = Account {
        name,
        account_type,
        balance,
      };
      print_json(&store.add_account(session, draft).await?)
    }
    Command::AddSubscription {
      name,
      amount,
      frequency,
      due_day,
      category,
    } => {
      let draft = Subscription {
        name,
        amount,
        frequency,
        due_day,
        category,
      };
      print_json(&store.add_subscription(session, draft).await?)
    }
    Command::AddCategory { fields } => {
      print_json(&store.add_category(session, fields.into_category()).await?)
    }
    Command::UpdateCategory { id, fields } => {
      print_json(&store.update_category(session, &id, fields.into_category()).await?)
    }
    Command::DeleteCategory { id } => print_json(&store.delete_category(session, &id).await?),
    Command::List { kind } => {
      let listing = match kind {
        EntityKind::Transactions => list_json::<Transaction, R>(&store, session).await?,
        EntityKind::Accounts => list_json::<Account, R>(&store, session).await?,
        EntityKind::Subscriptions => list_json::<Subscription, R>(&store, session).await?,
        EntityKind::Categories => list_json::<Category, R>(&store, session).await?,
      };
      print_json(&listing)
    }
    Command::Watch { kind } => match kind {
      EntityKind::Transactions => watch_until_interrupt::<Transaction, R>(&store, session).await,
      EntityKind::Accounts => watch_until_interrupt::<Account, R>(&store, session).await,
      EntityKind::Subscriptions => watch_until_interrupt::<Subscription, R>(&store, session).await,
      EntityKind::Categories => watch_until_interrupt::<Category, R>(&store, session).await,
    },
    Command::Seed => print_json(&seed_transactions(&store, session).await?),
    Command::Status => {
      let status = store.probe(session).await;
      print_json(&json!({
        "user_id": session.user_id(),
        "email": session.email(),
        "remote": status,
        "local": {
          "data_dir": local.dir().display().to_string(),
          "healthy": local.is_healthy().await,
        },
      }))
    }
    Command::Icons { query } => print_json(&icons::search(query.as_deref().unwrap_or_default())),
    Command::Serve => serve(config, session, &store, &local, metrics).await,
  }
}

async fn list_json<T: Entity, R: DocumentStore>(
  store: &FinanceStore<R, JsonFileStore>,
  session: &Session,
) -> Result<Value> {
  let records = store.list::<T>(session).await?;
  Ok(json!({
    "kind": T::KIND,
    "offline": looks_offline(&records),
    "count": records.len(),
    "records": records,
  }))
}

async fn watch_until_interrupt<T: Entity, R: DocumentStore>(
  store: &FinanceStore<R, JsonFileStore>,
  session: &Session,
) -> Result<()> {
  let handle = store
    .watch::<T, _>(session, |records| match serde_json::to_string_pretty(&records) {
      Ok(text) => println!("{text}"),
      Err(e) => error!(error = %e, "Failed to print snapshot"),
    })
    .await?;

  if !handle.is_live() {
    info!("Watch served from the local fallback, no further updates");
    return Ok(());
  }

  signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
  handle.unsubscribe().await;
  info!("Watch released");
  Ok(())
}

/// Serve health and metrics, re-probing the remote namespace and the
/// local data directory every `PROBE_INTERVAL`.
async fn serve<R: DocumentStore>(
  config: &AppConfig,
  session: &Session,
  store: &FinanceStore<R, JsonFileStore>,
  local: &JsonFileStore,
  metrics: Option<Arc<StoreMetrics>>,
) -> Result<()> {
  let (shutdown_tx, _) = broadcast::channel::<()>(1);
  let health = Arc::new(HealthState::new());

  let server = HealthServer::new(Arc::clone(&health), metrics, config.metrics.bind_address.clone());
  let server_shutdown = shutdown_tx.subscribe();
  let server_handle = tokio::spawn(async move {
    if let Err(e) = server.run(server_shutdown).await {
      error!(error = %e, "Health server failed");
    }
  });

  let mut ticker = tokio::time::interval(PROBE_INTERVAL);
  loop {
    tokio::select! {
      biased;
      _ = signal::ctrl_c() => {
        info!("SIGINT received, shutting down");
        break;
      }
      _ = ticker.tick() => {
        let status = store.probe(session).await;
        let local_ok = local.is_healthy().await;
        health
          .remote_connected
          .store(status == ConnectionStatus::Connected, Ordering::Relaxed);
        health.local_healthy.store(local_ok, Ordering::Relaxed);
        info!(remote = ?status, local_ok, "Health probe");
      }
    }
  }

  let _ = shutdown_tx.send(());
  let _ = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
  info!("Shutdown complete");
  Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
