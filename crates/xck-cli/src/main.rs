use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "xck")]
#[command(about = "Multi-channel event reconciliation tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> deployment -> local overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Validate a layered config and report unused keys
    ConfigCheck {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true, num_args = 1..)]
        config_paths: Vec<String>,

        /// Treat unused keys as an error
        #[arg(long, default_value_t = false)]
        fail_unused: bool,
    },

    /// Run a recorded JSONL stream of ticks and sightings through the engine
    Replay {
        /// Layered config paths in merge order (defaults apply when omitted)
        #[arg(long = "config", num_args = 1..)]
        config_paths: Vec<String>,

        /// JSONL file: one {"tick": {...}} or {"sighting": {...}} per line
        #[arg(long)]
        input: String,

        /// Exit with status 2 if any verdict was emitted
        #[arg(long, default_value_t = false)]
        fail_on_verdict: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = xck_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::ConfigCheck {
            config_paths,
            fail_unused,
        } => commands::config::check(&config_paths, fail_unused)?,

        Commands::Replay {
            config_paths,
            input,
            fail_on_verdict,
        } => {
            let summary = commands::replay::run(&config_paths, &input)?;
            if fail_on_verdict && summary.verdicts > 0 {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries machine-readable output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
