//! Figures worker binary.
//!
//! One process handles one invocation: it reads a JSON event, runs the
//! requested operation and prints the resulting record as a single JSON line.

use std::io::{IsTerminal, Read};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use figures_generator::{GeminiConfig, GeminiSayingGenerator};
use figures_models::InvocationId;
use figures_store::{
    FirestoreClient, FirestoreSayingStore, FirestoreSubjectStore, InMemoryStore, SayingStore,
    SubjectStore,
};
use figures_worker::invocation::{self, parse_event};
use figures_worker::{
    default_catalog, InvocationLogger, Operation, SayingAccumulator, StoreBackend,
    SubjectCatalog, SubjectLockManager, WorkerConfig,
};

#[derive(Parser)]
#[command(name = "figures-worker")]
#[command(about = "Claim subjects, accumulate sayings and release expired leases", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON event; read from stdin when omitted
    #[arg(short, long, global = true)]
    event: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lease one available subject
    Claim,
    /// Generate sayings for a claimed subject ({"subjectId", "displayName"})
    Accumulate,
    /// Return subjects with elapsed leases to the pool ({"now"?})
    Release,
    /// Register subjects; the built-in catalog when no event is given
    Seed,
    /// Print every subject
    List,
    /// Move a ready subject to available ({"subjectId"})
    Activate,
}

impl Commands {
    fn operation(&self) -> Operation {
        match self {
            Commands::Claim => Operation::Claim,
            Commands::Accumulate => Operation::Accumulate,
            Commands::Release => Operation::Release,
            Commands::Seed => Operation::Seed,
            Commands::List => Operation::List,
            Commands::Activate => Operation::Activate,
        }
    }

    fn takes_event(&self) -> bool {
        !matches!(self, Commands::Claim | Commands::List)
    }
}

struct Stores {
    subjects: Arc<dyn SubjectStore>,
    sayings: Arc<dyn SayingStore>,
}

async fn build_stores(config: &WorkerConfig) -> anyhow::Result<Stores> {
    match config.store_backend {
        StoreBackend::Firestore => {
            let client = FirestoreClient::from_env()
                .await
                .context("Failed to create Firestore client")?;
            Ok(Stores {
                subjects: Arc::new(FirestoreSubjectStore::new(
                    client.clone(),
                    config.subjects_collection.clone(),
                )),
                sayings: Arc::new(FirestoreSayingStore::new(
                    client,
                    config.subjects_collection.clone(),
                    config.sayings_collection.clone(),
                )),
            })
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; state does not outlive this process");
            let store = Arc::new(InMemoryStore::new());
            let locks = SubjectLockManager::new(store.clone(), config.lease_duration);
            SubjectCatalog::new(store.clone(), locks)
                .seed(default_catalog())
                .await?;
            Ok(Stores {
                subjects: store.clone(),
                sayings: store,
            })
        }
    }
}

fn read_event(cli: &Cli) -> anyhow::Result<Value> {
    if let Some(raw) = &cli.event {
        return Ok(parse_event(raw)?);
    }
    if !cli.command.takes_event() || std::io::stdin().is_terminal() {
        return Ok(Value::Null);
    }
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read event from stdin")?;
    Ok(parse_event(&raw)?)
}

fn emit<T: Serialize>(logger: &InvocationLogger, record: &T) -> anyhow::Result<()> {
    logger.log_result(record);
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}

async fn run(cli: Cli, config: WorkerConfig, logger: &InvocationLogger) -> anyhow::Result<()> {
    let event = read_event(&cli)?;
    let stores = build_stores(&config).await?;
    let locks = SubjectLockManager::new(stores.subjects.clone(), config.lease_duration);

    match cli.command {
        Commands::Claim => emit(logger, &invocation::handle_claim(&locks).await?),
        Commands::Accumulate => {
            let generator = GeminiSayingGenerator::new(GeminiConfig::from_env()?, config.mode)?;
            let accumulator = SayingAccumulator::new(
                stores.sayings,
                Arc::new(generator),
                locks,
                config.accumulator_settings(),
            );
            emit(logger, &invocation::handle_accumulate(&accumulator, event).await?)
        }
        Commands::Release => emit(logger, &invocation::handle_release(&locks, event).await?),
        Commands::Seed => {
            let catalog = SubjectCatalog::new(stores.subjects, locks);
            emit(logger, &invocation::handle_seed(&catalog, event).await?)
        }
        Commands::List => {
            let catalog = SubjectCatalog::new(stores.subjects, locks);
            emit(logger, &invocation::handle_list(&catalog).await?)
        }
        Commands::Activate => {
            let catalog = SubjectCatalog::new(stores.subjects, locks);
            emit(logger, &invocation::handle_activate(&catalog, event).await?)
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("figures=info".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    // Logs go to stderr; stdout carries only the result record.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = WorkerConfig::from_env()?;

    let invocation_id = InvocationId::new();
    let logger = InvocationLogger::new(&invocation_id, cli.command.operation());
    let span = logger.create_span();

    logger.log_start(&config);
    debug!("Worker config: {:?}", config);

    let result = run(cli, config, &logger).instrument(span).await;
    if let Err(e) = &result {
        logger.log_failure(e);
    }
    result
}
