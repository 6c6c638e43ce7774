//! Prediction Core CLI
//!
//! Manual smoke-test harness over the stateless engine plus an in-process
//! `SqliteStore`. Not a production entry point — there is no daemon mode,
//! no socket, no auth; it exists so a human can drive `observe`/`learn`/
//! `predict` from a shell without writing a test.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use prediction_core::engine::{self, EngineState};
use prediction_core::storage::sqlite::SqliteStore;
use prediction_core::vector_index::HashVectorIndexer;
use prediction_core::{EngineConfig, Observation, TenantId};

#[derive(Parser)]
#[command(name = "predict-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manual smoke-test CLI for the prediction core")]
struct Cli {
    /// Path to the SQLite database file (defaults to a platform-specific location).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Node identifier to derive the tenant from.
    #[arg(long, default_value = "predict-cli")]
    node_id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Observe one event's worth of string symbols, then learn immediately.
    Teach {
        /// Comma-separated events, each a comma-separated list of symbols
        /// separated by `;` (e.g. "alarm;wake_up,shower,coffee").
        #[arg(value_delimiter = ';')]
        events: Vec<String>,
    },
    /// Observe symbols and print predictions without learning.
    Predict {
        #[arg(value_delimiter = ';')]
        events: Vec<String>,
    },
}

fn parse_event(raw: &str) -> Observation {
    Observation {
        strings: raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        ..Default::default()
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = SqliteStore::new(cli.db)?;
    let indexer = HashVectorIndexer::default();
    let tenant = TenantId::derive_default(&cli.node_id);
    let config = EngineConfig::default();

    match cli.command {
        Commands::Teach { events } => {
            let mut state = EngineState::default();
            for raw in &events {
                let obs = parse_event(raw);
                state = engine::observe(state, &obs, &indexer, &tenant, &config, &store, &store, &store)?;
            }
            let (identifier, _) = engine::learn(state, &tenant, &config, &store, &store, &store)?;
            println!("learned pattern {identifier}");
        }
        Commands::Predict { events } => {
            let mut state = EngineState::default();
            for raw in &events {
                let obs = parse_event(raw);
                state = engine::observe(state, &obs, &indexer, &tenant, &config, &store, &store, &store)?;
            }
            let predictions = engine::predict(&state, &tenant, &config, &store, &store, &store)?;
            if predictions.is_empty() {
                println!("no predictions");
            }
            for p in &predictions {
                println!(
                    "{} potential={:.3} similarity={:.3} evidence={:.3}",
                    p.pattern_name, p.potential, p.similarity, p.evidence
                );
            }
        }
    }

    Ok(())
}
