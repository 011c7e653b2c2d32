mod config_commands;
mod engine_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    graft_config::GraftConfig,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "graft", about = "graft: compose modules into an injected client script")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides discovery of ./graft.toml and ~/.config/graft/).
    #[arg(long, global = true, env = "GRAFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every module and print the injected script.
    Script,
    /// Load every module and list the required snippets.
    Snippets {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Load every module and show where each one resolved.
    Modules {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays clean for the script.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GraftConfig> {
    match path {
        Some(path) => graft_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            let (path, config) = graft_config::discover_and_load()?;
            debug!(path = %path.display(), "config loaded");
            Ok(config)
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "graft starting");

    match cli.command {
        Commands::Check { verbose } => config_commands::check(cli.config.as_deref(), verbose),
        Commands::Script => engine_commands::script(load_config(cli.config.as_ref())?).await,
        Commands::Snippets { json } => {
            engine_commands::snippets(load_config(cli.config.as_ref())?, json).await
        },
        Commands::Modules { json } => {
            engine_commands::modules(load_config(cli.config.as_ref())?, json).await
        },
    }
}
