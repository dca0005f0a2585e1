//! grulia CLI: approximate solution-reuse cache for constraint solving.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use grulia::engine::{Engine, EngineConfig};
use grulia::expr::Expr;
use grulia::metric::SatDelta;
use grulia::oracle::BoundedOracle;

#[derive(Parser)]
#[command(name = "grulia", version, about = "Approximate solution-reuse cache for constraint solving")]
struct Cli {
    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a JSON array of expressions through the cache.
    Resolve {
        /// Path to JSON file with expressions.
        #[arg(long)]
        file: PathBuf,

        /// Resolve the queries in parallel instead of in file order.
        #[arg(long)]
        parallel: bool,

        /// Print resolutions and statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the sat-delta of each expression in a JSON array.
    Delta {
        /// Path to JSON file with expressions.
        #[arg(long)]
        file: PathBuf,
    },

    /// Show engine info (after warm load).
    Info,

    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }

    match cli.command {
        Commands::Resolve { file, parallel, json } => {
            let exprs = read_exprs(&file)?;
            let engine = open_engine(config)?;

            let results = if parallel {
                engine.resolve_batch(&exprs)
            } else {
                exprs.iter().map(|e| engine.resolve(e)).collect()
            };

            let mut resolutions = Vec::with_capacity(results.len());
            for (expr, result) in exprs.iter().zip(results) {
                let resolution = result?;
                if !json {
                    println!(
                        "{expr}\n  {} via {} (sat-delta {})",
                        resolution.verdict,
                        resolution.source,
                        format_delta(&resolution.sat_delta)
                    );
                }
                resolutions.push(resolution);
            }

            let stats = engine.stats();
            let report = engine.shutdown();
            if json {
                let out = serde_json::json!({
                    "resolutions": resolutions,
                    "stats": stats,
                    "flush": { "written": report.written, "dropped": report.dropped },
                });
                println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
            } else {
                println!();
                print!("{stats}");
                println!("Persisted {} entries ({} dropped)", report.written, report.dropped);
            }
        }

        Commands::Delta { file } => {
            let exprs = read_exprs(&file)?;
            let engine = open_engine(config)?;
            for expr in &exprs {
                let delta = engine.sat_delta(expr)?;
                println!("{}\t{expr}", format_delta(&delta));
            }
        }

        Commands::Info => {
            let engine = open_engine(config)?;
            print!("{}", engine.info());
        }

        Commands::Config => {
            let text = config
                .to_toml()
                .map_err(|message| miette::miette!("failed to render config: {message}"))?;
            print!("{text}");
        }
    }

    Ok(())
}

fn open_engine(config: EngineConfig) -> Result<Engine> {
    let oracle = Arc::new(BoundedOracle::new(config.oracle.max_assignments));
    Ok(Engine::new(config, oracle)?)
}

/// Simple JSON format: an array of serialized expressions.
fn read_exprs(path: &Path) -> Result<Vec<Expr>> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&content).into_diagnostic()
}

fn format_delta(delta: &SatDelta) -> String {
    match delta.satisfied_by() {
        Some(reference) => format!("0, satisfied at {reference}"),
        None => format!("{:.3}", delta.value()),
    }
}
