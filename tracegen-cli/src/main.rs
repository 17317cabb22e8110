//! Tracegen CLI - drive injection-aware trace generation from the terminal

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use tracegen_core::prelude::*;

#[derive(Parser)]
#[command(name = "tracegen")]
#[command(about = "Injection-aware trace generation for LLM agent evaluation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered scenarios
    Scenarios {
        /// Only scenarios carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only scenarios in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// List registered (mode, variant) injection pairs
    Modes,
    /// Generate traces for a scenario
    Run {
        /// Scenario id
        #[arg(short, long)]
        scenario: String,
        /// Failure mode to inject
        #[arg(short, long, default_value = "none")]
        mode: String,
        /// Transform variant within the mode
        #[arg(long)]
        variant: Option<String>,
        /// Runs per (scenario, mode) pair
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        /// Run every registered failure mode instead of --mode
        #[arg(long)]
        all_modes: bool,
        /// Append completed traces to this JSONL file
        #[arg(long)]
        out: Option<std::path::PathBuf>,
        /// Print full trace JSON instead of summaries
        #[arg(long)]
        json: bool,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("tracegen {}", env!("CARGO_PKG_VERSION"));
            println!("tracegen-core {}", tracegen_core::VERSION);
        }
        Commands::Scenarios { tag, category } => {
            let registry = ScenarioRegistry::builtin();
            let mut filter = ScenarioFilter::default();
            if let Some(tag) = tag {
                filter = filter.with_tag(tag);
            }
            if let Some(category) = category {
                filter = filter.with_category(category);
            }
            for scenario in registry.filter(&filter) {
                println!(
                    "{:<24} [{} / difficulty {}] {}",
                    scenario.id, scenario.category, scenario.difficulty, scenario.name
                );
            }
        }
        Commands::Modes => {
            let engine = InjectionEngine::new();
            for (mode, variant) in engine.registered() {
                println!("{:<20} {}", mode.as_str(), variant);
            }
        }
        Commands::Run {
            scenario,
            mode,
            variant,
            repeat,
            all_modes,
            out,
            json,
        } => {
            run_command(scenario, mode, variant, repeat, all_modes, out, json).await?;
        }
    }

    Ok(())
}

async fn run_command(
    scenario_id: String,
    mode: String,
    variant: Option<String>,
    repeat: usize,
    all_modes: bool,
    out: Option<std::path::PathBuf>,
    json: bool,
) -> Result<()> {
    let config = TracegenConfig::load()?;
    config.validate()?;

    let registry = ScenarioRegistry::builtin();
    registry.get(&scenario_id)?;

    let model: Arc<dyn ModelClient> = Arc::new(OpenAiClient::with_base_url(
        &config.model.api_key,
        &config.model.model,
        &config.model.base_url,
    ));

    let mut harness = TracegenHarness::new();
    if let Some(path) = out.as_ref().or(config.export.jsonl_path.as_ref()) {
        harness = harness.with_exporter(Arc::new(JsonLinesExporter::new(path)));
    } else if let Some(endpoint) = &config.export.endpoint {
        harness = harness.with_exporter(Arc::new(HttpExporter::new(endpoint)));
    }
    harness = harness.with_export_timeout(config.export.timeout);

    let pairs: Vec<(String, Injection)> = if all_modes {
        FailureMode::all()
            .iter()
            .map(|m| (scenario_id.clone(), Injection::new(*m)))
            .collect()
    } else {
        let mode: FailureMode = mode.parse()?;
        let injection = match variant {
            Some(v) => Injection::new(mode).with_variant(v),
            None => Injection::new(mode),
        };
        vec![(scenario_id, injection)]
    };

    info!(
        pairs = pairs.len(),
        repeat,
        model = %config.model.model,
        "starting batch"
    );

    let graph = compile_graph();
    let outcome = harness
        .run_batch(&graph, model, &registry, &pairs, repeat, &config.user_id)
        .await?;

    info!(
        completed = outcome.completed.len(),
        failed = outcome.failed.len(),
        "batch finished"
    );

    for trace in &outcome.completed {
        let format = if json {
            TraceFormat::JsonPretty
        } else {
            TraceFormat::Summary
        };
        println!("{}\n", render(trace, format)?);
    }
    for failure in &outcome.failed {
        eprintln!("run {} failed: {}", failure.run_id, failure.message);
    }

    println!(
        "{} completed, {} failed ({} total)",
        outcome.completed.len(),
        outcome.failed.len(),
        outcome.total()
    );

    if !outcome.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
