mod config_commands;
mod job_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    tunepress_config::TunepressConfig,
};

#[derive(Parser)]
#[command(name = "tunepress", about = "tunepress: audio acquisition and packaging service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./tunepress.toml and the user config dir).
    #[arg(long, global = true, env = "TUNEPRESS_CONFIG")]
    config: Option<PathBuf>,
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and queue worker (default when no subcommand is provided).
    Serve,
    /// Acquire, package and publish one song.
    Download {
        /// Free-text search query.
        query: Option<String>,
        /// Direct source URL instead of a query.
        #[arg(long, conflicts_with = "query")]
        url: Option<String>,
        /// Subfolder of the downloads directory to write the container to.
        #[arg(long)]
        destination: Option<String>,
    },
    /// Add a song to the backlog.
    Enqueue { song_name: String },
    /// Process every pending backlog job once.
    Sweep {
        #[arg(long)]
        destination: Option<String>,
    },
    /// Print the metadata of a container file.
    Inspect { file: PathBuf },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

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
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load the explicit `--config` file, or discover one. Returns the config
/// and the file it came from.
fn load(cli: &Cli) -> anyhow::Result<(TunepressConfig, Option<PathBuf>)> {
    let (mut config, source) = match cli.config {
        Some(ref path) => {
            let mut config = tunepress_config::load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tunepress_config::apply_env_overrides(&mut config);
            (config, Some(path.clone()))
        },
        None => (
            tunepress_config::discover_and_load(),
            tunepress_config::find_config_file(),
        ),
    };
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok((config, source))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tunepress starting");

    let (config, source) = load(&cli)?;

    match cli.command {
        None | Some(Commands::Serve) => {
            for diagnostic in tunepress_config::validate(&config) {
                warn!(%diagnostic, "config");
            }
            tunepress_gateway::start_gateway(&config).await?;
            Ok(())
        },
        Some(Commands::Download {
            query,
            url,
            destination,
        }) => job_commands::download(&config, query, url, destination.as_deref()).await,
        Some(Commands::Enqueue { song_name }) => job_commands::enqueue(&config, &song_name).await,
        Some(Commands::Sweep { destination }) => {
            job_commands::sweep(&config, destination.as_deref()).await
        },
        Some(Commands::Inspect { file }) => job_commands::inspect(&file),
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, &config, source.as_deref())
        },
    }
}
