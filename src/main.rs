use clap::{Parser, Subcommand};
use std::sync::Arc;

use streamstat::config::{Config, DEFAULT_CONFIG_PATH};
use streamstat::poll::{self, ConsoleSink, ShutdownCoordinator};

#[derive(Parser)]
#[command(name = "streamstat")]
#[command(about = "Running mean and moving average over a streamed JSON feed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the feed and report statistics until interrupted
    Run {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Override the feed URL
        #[arg(short, long)]
        url: Option<String>,
        /// Override the report period (seconds)
        #[arg(short, long)]
        period: Option<u64>,
        /// Override the moving-average window size
        #[arg(short, long)]
        window: Option<usize>,
    },
    /// Validate the configuration and print the effective values
    Check {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
}

const EXIT_FATAL: i32 = 1;
const EXIT_CONFIG: i32 = 2;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, url, period, window } => {
            let config = match load_config(&config, url, period, window) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Config error: {}", e);
                    std::process::exit(EXIT_CONFIG);
                }
            };
            match run_poll(config).await {
                Ok(true) => {}
                Ok(false) => std::process::exit(EXIT_FATAL),
                Err(e) => {
                    eprintln!("Run error: {:#}", e);
                    std::process::exit(EXIT_FATAL);
                }
            }
        }
        Commands::Check { config } => match load_config(&config, None, None, None) {
            Ok(config) => {
                println!("url: {}", config.url);
                println!("period: {}s", config.period);
                println!("window: {}", config.window);
                println!("grace_period: {}s", config.grace_period);
            }
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(EXIT_CONFIG);
            }
        },
    }
}

fn load_config(
    path: &str,
    url: Option<String>,
    period: Option<u64>,
    window: Option<usize>,
) -> Result<Config, streamstat::ConfigError> {
    let mut config = Config::load(path)?;
    if let Some(url) = url {
        config.url = url;
    }
    if let Some(period) = period {
        config.period = period;
    }
    if let Some(window) = window {
        config.window = window;
    }
    config.validate()?;
    Ok(config)
}

/// Returns whether the shutdown was clean (signal-initiated).
async fn run_poll(config: Config) -> anyhow::Result<bool> {
    let shutdown = ShutdownCoordinator::new();
    poll::install_signal_handlers(&shutdown)?;

    let sink = Arc::new(ConsoleSink::new(config.report_period()));
    let outcome = poll::run(&config, sink, shutdown).await?;

    println!("Finish graceful ({})", outcome.reason);
    Ok(!outcome.reason.is_fatal())
}
