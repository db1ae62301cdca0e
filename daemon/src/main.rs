//! Concord daemon: replays recorded consensus scenarios through the
//! confirmation engine.

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use concord_node::{
    init_logging, BalanceBook, ConfirmationEngine, ConfirmationHooks, ConfirmationService,
    EngineConfig, EngineMetrics, LogFormat,
};
use concord_nullables::{NullIndexStore, NullTransactionStore};
use serde_json::json;

use crate::scenario::{Resolved, Scenario};

#[derive(Parser)]
#[command(name = "concord-daemon", about = "Concord confirmation engine daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "CONCORD_CONFIG")]
    config: Option<PathBuf>,

    /// Number of worker tasks.
    #[arg(long, env = "CONCORD_WORKERS")]
    workers: Option<usize>,

    /// Capacity of each worker's event queue.
    #[arg(long, env = "CONCORD_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CONCORD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CONCORD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Print Prometheus metrics after the run.
    #[arg(long, env = "CONCORD_ENABLE_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a JSON scenario and print the resulting engine state.
    Replay {
        #[arg(long)]
        scenario: PathBuf,
    },
    /// Print the default configuration as TOML.
    DefaultConfig,
}

impl Cli {
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.event_queue_capacity = capacity;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        config.enable_metrics |= self.metrics;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.engine_config()?;

    match &cli.command {
        Command::DefaultConfig => {
            print!("{}", EngineConfig::default().to_toml_string()?);
            Ok(())
        }
        Command::Replay { scenario } => {
            let format: LogFormat = config.log_format()?;
            init_logging(format, &config.log_level)?;

            let raw = std::fs::read_to_string(scenario)
                .with_context(|| format!("reading scenario {}", scenario.display()))?;
            let resolved = Scenario::from_json(&raw)?.resolve()?;
            let report = replay(config, resolved).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn replay(config: EngineConfig, scenario: Resolved) -> anyhow::Result<serde_json::Value> {
    let book = Arc::new(BalanceBook::new().with_freed_listener(|address| {
        tracing::debug!(%address, "balance freed");
    }));
    for (address, amount) in &scenario.balances {
        book.seed(*address, *amount);
    }

    let hooks = ConfirmationHooks::new()
        .on_dsp_confirmed(|tx| tracing::info!(hash = %tx.hash, "dsp confirmed"))
        .on_dsp_rejected(|tx| tracing::info!(hash = %tx.hash, "dsp rejected"))
        .on_address_history_change(|tx, status| {
            tracing::debug!(hash = %tx.hash, ?status, "address history changed")
        });

    let metrics = Arc::new(EngineMetrics::new());
    let engine = Arc::new(ConfirmationEngine::with_metrics(
        Arc::new(NullTransactionStore::new()),
        Arc::new(NullIndexStore::new()),
        book.clone(),
        hooks,
        Arc::clone(&metrics),
    ));
    engine.validate_chain_from_genesis(None)?;

    for (label, tx) in &scenario.transactions {
        let observed = engine
            .insert_new_transaction(tx.clone())
            .with_context(|| format!("inserting transaction '{label}'"))?;
        tracing::info!(label = %label, hash = %tx.hash, ?observed, "transaction observed");
    }

    let enable_metrics = config.enable_metrics;
    let service = ConfirmationService::new(Arc::clone(&engine), config);
    service.start()?;

    let events = scenario.events;
    let feed = async {
        for event in events {
            let hash = *event.hash();
            if let Err(e) = service.submit(event).await {
                tracing::warn!(%hash, error = %e, "event not submitted");
                break;
            }
        }
    };
    tokio::select! {
        _ = feed => {}
        result = service.shutdown_controller().wait_for_signal() => {
            result.context("waiting for shutdown signal")?;
            tracing::info!("shutdown signal received, stopping replay");
        }
    }
    service.stop().await?;

    let transactions: Vec<_> = scenario
        .transactions
        .iter()
        .map(|(label, tx)| -> anyhow::Result<serde_json::Value> {
            let current = engine.transaction(&tx.hash)?;
            Ok(json!({
                "label": label,
                "hash": tx.hash.to_string(),
                "stage": current.stage(),
                "balance_state": format!("{:?}", current.balance),
                "index": current.dsp_result.as_ref().map(|r| r.index),
            }))
        })
        .collect::<anyhow::Result<_>>()?;

    let balances: Vec<_> = scenario
        .balances
        .iter()
        .map(|(address, _)| {
            json!({
                "address": address.to_string(),
                "balance": book.balance(address).to_string(),
                "pre_balance": book.pre_balance(address).to_string(),
            })
        })
        .collect();

    let mut report = json!({
        "counters": engine.counters(),
        "last_index": engine.last_index(),
        "buffered": engine.buffered_indices(),
        "unindexed": engine.unindexed_count(),
        "balances": balances,
        "transactions": transactions,
    });
    if enable_metrics {
        report["metrics"] = json!(metrics.encode());
    }
    Ok(report)
}
