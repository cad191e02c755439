//! Sidewalk end-device simulator entry point

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sidewalk_cli::{
    app::SimulatedDevice,
    cli::{Cli, Commands},
    config::AppConfig,
    error::CliError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration is loaded before logging so its filter can apply.
    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            setup_logging(cli.verbose, None);
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    setup_logging(cli.verbose, config.cli.log_level.as_deref());
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    match execute(cli.command, config).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_configuration() => {
            error!("{}", e);
            std::process::exit(1);
        }
        // Runtime failures are reported but do not fail the process.
        Err(e) => {
            error!("Command failed: {}", e);
            Ok(())
        }
    }
}

async fn execute(command: Commands, mut config: AppConfig) -> Result<(), CliError> {
    match command {
        Commands::Run {
            messages,
            switches,
            link,
        } => {
            if let Some(mask) = link {
                config.device.link_mask = mask;
            }
            let device = SimulatedDevice::start(config).await?;
            let report = device.run(messages, switches).await?;
            println!("{}", report);
        }
        Commands::NextLink { mask } => {
            let next = mask.next();
            println!(
                "{} ({:#x}) -> {} ({:#x})",
                mask,
                mask.bits(),
                next,
                next.bits()
            );
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}

/// Setup logging: `--verbose` forces debug, otherwise the configured filter or info
fn setup_logging(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info")))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}
