mod bot;
mod commands;
mod console;
mod output;

use carebridge_core::config::{self, CarebridgeConfig, LoggingConfig};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(name = "carebridge-cli")]
#[command(about = "Carebridge triage and conversation routing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the console transport on stdin/stdout
    Run,
    /// Check the question graph and string catalogs
    Validate,
    /// Configuration management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Save current configuration to file
    Save {
        /// Path to save configuration
        #[arg(default_value = "carebridge.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    let source = cli.config.clone().or_else(config::find_config_file);
    let mut config = match &source {
        Some(path) => config::load_config(path).await?,
        None => CarebridgeConfig::default(),
    };
    config.apply_env_overrides();

    let _guard = init_logging(cli.debug, &config.logging)?;
    match &source {
        Some(path) => info!("Loaded config from: {:?}", path),
        None => info!("No config file found, using defaults"),
    }
    tracing::debug!("Using routing config: {:?}", config.routing);

    match &cli.command {
        Commands::Run => commands::run::run(&config).await?,
        Commands::Validate => commands::validate::validate(&config).await?,
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&config, source.as_deref()).await?,
            ConfigCommands::Save { path } => commands::config::save(&config, path).await?,
        },
    }

    Ok(())
}

/// Console logs on stderr, plus a log file when `logging.directory` is set.
/// The returned guard flushes the file writer on drop.
fn init_logging(debug: bool, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if debug {
        // Only show debug output from carebridge crates
        EnvFilter::new("carebridge_core=debug,carebridge_cli=debug")
    } else {
        // Show info level for carebridge crates, warn for everything else
        EnvFilter::new("carebridge_core=info,carebridge_cli=info,warn")
    };

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_timer(fmt::time::LocalTime::rfc_3339())
        .compact();

    let (file, guard) = match &logging.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).into_diagnostic()?;
            let appender = tracing_appender::rolling::never(directory, &logging.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(guard)
}
