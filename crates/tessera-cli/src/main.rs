use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tessera_cli::{format_stats, load_config, run_emit, run_rerun};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Incrementally emit target code from linked class IR", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit a module set once
    Emit {
        /// Module set (JSON format)
        #[arg(short, long)]
        input: PathBuf,

        /// Emitter configuration (TOML format)
        #[arg(short, long, env = "TESSERA_CONFIG")]
        config: Option<PathBuf>,

        /// Print the full result as JSON instead of an outline
        #[arg(long)]
        dump: bool,
    },

    /// Emit successive module sets with one emitter and report cache reuse
    Rerun {
        /// Module sets in run order
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Emitter configuration (TOML format)
        #[arg(short, long, env = "TESSERA_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Parse and validate an emitter configuration
    CheckConfig {
        /// Emitter configuration (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug) // Show target module in debug mode
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Emit {
            input,
            config,
            dump,
        } => {
            let report = run_emit(&input, config.as_deref(), dump)?;
            print!("{}", report);
        }
        Commands::Rerun { input, config } => {
            let stats = run_rerun(&input, config.as_deref())?;
            for (run, stats) in stats.iter().enumerate() {
                println!("run {}: {}", run + 1, format_stats(stats));
            }
        }
        Commands::CheckConfig { config } => {
            let config = load_config(Some(&config))?;
            info!("Configuration is valid");
            println!("{:#?}", config);
        }
    }
    Ok(())
}
